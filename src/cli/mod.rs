use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::application::{AccountService, AppError};
use crate::config::LedgerConfig;
use crate::domain::{
    Account, AccountId, AccountKind, AccountRef, Cents, format_cents, parse_cents,
};

/// Passbook - natural and legal person account balances
#[derive(Parser)]
#[command(name = "passbook")]
#[command(about = "Account balances with atomic deposits, withdrawals and transfers")]
#[command(version)]
pub struct Cli {
    /// Database file path or sqlite: URL (overrides DATABASE_URL)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Account management commands
    #[command(subcommand)]
    Account(AccountCommands),

    /// Show the balance of an account
    Balance {
        /// Account kind: natural, legal
        kind: String,
        /// Account id
        id: AccountId,
    },

    /// Add money to an account
    Deposit {
        /// Account kind: natural, legal
        kind: String,
        /// Account id
        id: AccountId,
        /// Amount (e.g., "50.00" or "50")
        amount: String,
    },

    /// Take money out of an account
    Withdraw {
        /// Account kind: natural, legal
        kind: String,
        /// Account id
        id: AccountId,
        /// Amount (e.g., "50.00" or "50")
        amount: String,
    },

    /// Move money between two accounts atomically
    Transfer {
        /// Amount to transfer (e.g., "100.00")
        amount: String,

        /// Source account kind
        #[arg(long)]
        from_kind: String,

        /// Source account id
        #[arg(long)]
        from: AccountId,

        /// Destination account kind
        #[arg(long)]
        to_kind: String,

        /// Destination account id
        #[arg(long)]
        to: AccountId,
    },
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Open a new account from a JSON payload
    Open {
        /// Account kind: natural, legal
        kind: String,

        /// JSON payload
        #[arg(long, conflicts_with = "file")]
        data: Option<String>,

        /// Read the JSON payload from a file
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Show an account record
    Show {
        /// Account kind: natural, legal
        kind: String,
        /// Account id
        id: AccountId,
    },

    /// Close (delete) an account
    Close {
        /// Account kind: natural, legal
        kind: String,
        /// Account id
        id: AccountId,
    },
}

impl Cli {
    /// Install the global tracing subscriber. `RUST_LOG` wins over `--verbose`.
    pub fn init_tracing(&self) {
        let default_directive = if self.verbose {
            "passbook=debug"
        } else {
            "passbook=info"
        };
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directive.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    fn config(&self) -> Result<LedgerConfig> {
        let config = LedgerConfig::from_env().context("Invalid configuration")?;
        Ok(match &self.database {
            Some(target) => config.with_database(target),
            None => config,
        })
    }

    pub async fn run(self) -> Result<()> {
        let config = self.config()?;

        let service = match self.command {
            Commands::Init => AccountService::init(&config).await?,
            _ => AccountService::connect(&config).await?,
        };
        let result = run_command(&service, &config, self.command).await;
        service.close().await;
        result
    }
}

async fn run_command(
    service: &AccountService,
    config: &LedgerConfig,
    command: Commands,
) -> Result<()> {
    match command {
        Commands::Init => {
            println!("Database initialized: {}", config.database_url);
        }

        Commands::Account(account_cmd) => run_account_command(service, account_cmd).await?,

        Commands::Balance { kind, id } => {
            let account = account_ref(&kind, id)?;
            let balance = service.get_balance(account).await?;
            println!("{}: {}", account, format_cents(balance));
        }

        Commands::Deposit { kind, id, amount } => {
            let account = account_ref(&kind, id)?;
            let amount_cents = parse_amount(&amount)?;
            let balance = service.deposit(account, amount_cents).await?;
            println!(
                "Deposited {} into {} (balance {})",
                format_cents(amount_cents),
                account,
                format_cents(balance)
            );
        }

        Commands::Withdraw { kind, id, amount } => {
            let account = account_ref(&kind, id)?;
            let amount_cents = parse_amount(&amount)?;
            let balance = service.withdraw(account, amount_cents).await?;
            println!(
                "Withdrew {} from {} (balance {})",
                format_cents(amount_cents),
                account,
                format_cents(balance)
            );
        }

        Commands::Transfer {
            amount,
            from_kind,
            from,
            to_kind,
            to,
        } => {
            let from = account_ref(&from_kind, from)?;
            let to = account_ref(&to_kind, to)?;
            let amount_cents = parse_amount(&amount)?;
            let receipt = service.transfer(from, to, amount_cents).await?;
            println!(
                "Transferred {} {} -> {}",
                format_cents(receipt.amount_cents),
                receipt.from,
                receipt.to
            );
            println!(
                "  {}: {}\n  {}: {}",
                receipt.from,
                format_cents(receipt.from_balance),
                receipt.to,
                format_cents(receipt.to_balance)
            );
        }
    }
    Ok(())
}

async fn run_account_command(service: &AccountService, cmd: AccountCommands) -> Result<()> {
    match cmd {
        AccountCommands::Open { kind, data, file } => {
            let payload = match (data, file) {
                (Some(data), _) => data.into_bytes(),
                (None, Some(path)) => std::fs::read(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, None) => bail!("Provide the account payload with --data or --file"),
            };
            let account = service.create_account(&kind, &payload).await?;
            println!(
                "Opened account {} for {} (balance {})",
                account.account_ref(),
                account.holder(),
                format_cents(account.balance())
            );
        }

        AccountCommands::Show { kind, id } => {
            let account = service.get_account(account_ref(&kind, id)?).await?;
            print_account(&account)?;
        }

        AccountCommands::Close { kind, id } => {
            let account = account_ref(&kind, id)?;
            service.close_account(account).await?;
            println!("Closed account {}", account);
        }
    }
    Ok(())
}

fn print_account(account: &Account) -> Result<()> {
    let json = serde_json::to_string_pretty(account).context("Failed to render account")?;
    println!("{}", json);
    Ok(())
}

fn account_ref(kind: &str, id: AccountId) -> Result<AccountRef, AppError> {
    let kind: AccountKind = kind.parse()?;
    Ok(AccountRef::new(kind, id))
}

fn parse_amount(amount: &str) -> Result<Cents> {
    parse_cents(amount).with_context(|| format!("Invalid amount '{}'. Use '50.00' or '50'", amount))
}
