mod account;
mod money;
mod transfer;

pub use account::*;
pub use money::*;
pub use transfer::*;
