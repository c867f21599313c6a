use serde::Serialize;

use super::{AccountRef, Cents, decimal};

/// A request to move money between two accounts. Never persisted; it lives for one
/// transfer call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferIntent {
    /// Source account (balance decreases)
    pub from: AccountRef,
    /// Destination account (balance increases)
    pub to: AccountRef,
    pub amount_cents: Cents,
}

impl TransferIntent {
    pub fn new(from: AccountRef, to: AccountRef, amount_cents: Cents) -> Self {
        Self {
            from,
            to,
            amount_cents,
        }
    }

    pub fn is_same_account(&self) -> bool {
        self.from == self.to
    }

    /// The two accounts in the order their locks must be taken.
    ///
    /// The order depends only on the pair, never on the direction, so A->B and B->A
    /// running concurrently cannot each hold the lock the other one wants.
    pub fn lock_order(&self) -> (AccountRef, AccountRef) {
        if self.from <= self.to {
            (self.from, self.to)
        } else {
            (self.to, self.from)
        }
    }
}

/// Balances of both sides right after a committed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    pub from: AccountRef,
    pub to: AccountRef,
    #[serde(with = "decimal")]
    pub amount_cents: Cents,
    #[serde(with = "decimal")]
    pub from_balance: Cents,
    #[serde(with = "decimal")]
    pub to_balance: Cents,
}
