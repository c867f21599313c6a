use std::time::Duration;

use thiserror::Error;

use crate::domain::{AccountRef, Cents, UnknownAccountKind, format_cents};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid account kind: {0}")]
    InvalidKind(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Account not found: {0}")]
    AccountNotFound(AccountRef),

    #[error(
        "Insufficient funds in account {account}: balance {}, required {}",
        money(.balance),
        money(.required)
    )]
    InsufficientFunds {
        account: AccountRef,
        balance: Cents,
        required: Cents,
    },

    #[error("Cannot transfer from account {0} to itself")]
    SameAccount(AccountRef),

    #[error("Malformed account payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Balance transaction timed out after {0:?}")]
    LockTimeout(Duration),

    #[error("Database error: {0:#}")]
    Store(#[from] anyhow::Error),
}

fn money(cents: &Cents) -> String {
    format_cents(*cents)
}

impl AppError {
    /// Whether re-running the same operation may succeed.
    ///
    /// A failed balance operation has written nothing, so retrying one of these never
    /// applies it twice.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Store(_) | AppError::LockTimeout(_))
    }
}

impl From<UnknownAccountKind> for AppError {
    fn from(err: UnknownAccountKind) -> Self {
        AppError::InvalidKind(err.0)
    }
}
