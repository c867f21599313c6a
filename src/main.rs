use anyhow::Result;
use clap::Parser;
use passbook::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    cli.init_tracing();
    cli.run().await
}
