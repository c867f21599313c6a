//! Balance mutation algorithms.
//!
//! Every mutation runs inside one [`LedgerTx`]: lock-read, validate, write, commit.
//! Validation happens before any write, so a rejected operation has nothing to undo.
//!
//! Database calls are never cancelled halfway. Each transaction runs on its own task,
//! and the deadline is checked once, after the reads and before the first write; an
//! expired transaction is rolled back explicitly. Once the commit is issued its real
//! outcome is reported.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::domain::{AccountRef, Cents, TransferIntent, TransferReceipt, format_cents};
use crate::storage::{LedgerStore, LedgerTx, is_lock_contention};

use super::AppError;

/// Deposit, withdraw and transfer over a [`LedgerStore`].
///
/// Holds no state of its own beyond the store handle and deadline, so it can be cloned
/// into as many concurrent tasks as needed.
#[derive(Clone)]
pub struct BalanceEngine {
    store: LedgerStore,
    lock_timeout: Duration,
}

impl BalanceEngine {
    pub fn new(store: LedgerStore, lock_timeout: Duration) -> Self {
        Self {
            store,
            lock_timeout,
        }
    }

    /// Current committed balance. Does not lock.
    pub async fn balance(&self, account: AccountRef) -> Result<Cents, AppError> {
        self.store
            .read_balance(account)
            .await?
            .ok_or(AppError::AccountNotFound(account))
    }

    /// Add `amount_cents` to the account and return the new balance.
    pub async fn deposit(
        &self,
        account: AccountRef,
        amount_cents: Cents,
    ) -> Result<Cents, AppError> {
        ensure_positive(amount_cents)?;
        tracing::debug!(%account, amount = %format_cents(amount_cents), "deposit");

        let engine = self.clone();
        let balance =
            run_to_completion(async move { engine.deposit_locked(account, amount_cents).await })
                .await?;

        tracing::info!(
            %account,
            amount = %format_cents(amount_cents),
            balance = %format_cents(balance),
            "deposit committed"
        );
        Ok(balance)
    }

    /// Remove `amount_cents` from the account and return the new balance.
    /// Fails with [`AppError::InsufficientFunds`] rather than going below zero.
    pub async fn withdraw(
        &self,
        account: AccountRef,
        amount_cents: Cents,
    ) -> Result<Cents, AppError> {
        ensure_positive(amount_cents)?;
        tracing::debug!(%account, amount = %format_cents(amount_cents), "withdraw");

        let engine = self.clone();
        let balance =
            run_to_completion(async move { engine.withdraw_locked(account, amount_cents).await })
                .await?;

        tracing::info!(
            %account,
            amount = %format_cents(amount_cents),
            balance = %format_cents(balance),
            "withdrawal committed"
        );
        Ok(balance)
    }

    /// Move money between two accounts as a single unit: both balances change or neither does.
    pub async fn transfer(&self, intent: TransferIntent) -> Result<TransferReceipt, AppError> {
        ensure_positive(intent.amount_cents)?;
        if intent.is_same_account() {
            return Err(AppError::SameAccount(intent.from));
        }
        tracing::debug!(
            from = %intent.from,
            to = %intent.to,
            amount = %format_cents(intent.amount_cents),
            "transfer"
        );

        let engine = self.clone();
        let receipt =
            run_to_completion(async move { engine.transfer_locked(intent).await }).await?;

        tracing::info!(
            from = %receipt.from,
            to = %receipt.to,
            amount = %format_cents(receipt.amount_cents),
            "transfer committed"
        );
        Ok(receipt)
    }

    /// Open a write transaction. Giving up on the write lock is a [`AppError::LockTimeout`].
    async fn begin(&self, deadline: Deadline) -> Result<LedgerTx, AppError> {
        match self.store.begin().await {
            Ok(tx) => Ok(tx),
            Err(err) if is_lock_contention(&err) => {
                tracing::warn!(error = %format!("{err:#}"), "write lock not acquired");
                Err(AppError::LockTimeout(deadline.elapsed()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn deposit_locked(
        &self,
        account: AccountRef,
        amount_cents: Cents,
    ) -> Result<Cents, AppError> {
        let deadline = Deadline::start(self.lock_timeout);
        let mut tx = self.begin(deadline).await?;

        let Some(current) = tx.lock_balance(account).await? else {
            abort(tx, "account not found").await;
            return Err(AppError::AccountNotFound(account));
        };
        let Some(updated) = current.checked_add(amount_cents) else {
            abort(tx, "balance overflow").await;
            return Err(AppError::InvalidAmount(format!(
                "depositing {} would overflow the balance of {}",
                format_cents(amount_cents),
                account
            )));
        };

        let mut tx = deadline.check(tx).await?;
        tx.write_balance(account, updated).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn withdraw_locked(
        &self,
        account: AccountRef,
        amount_cents: Cents,
    ) -> Result<Cents, AppError> {
        let deadline = Deadline::start(self.lock_timeout);
        let mut tx = self.begin(deadline).await?;

        let Some(current) = tx.lock_balance(account).await? else {
            abort(tx, "account not found").await;
            return Err(AppError::AccountNotFound(account));
        };
        if current < amount_cents {
            abort(tx, "insufficient funds").await;
            return Err(AppError::InsufficientFunds {
                account,
                balance: current,
                required: amount_cents,
            });
        }

        let updated = current - amount_cents;
        let mut tx = deadline.check(tx).await?;
        tx.write_balance(account, updated).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn transfer_locked(&self, intent: TransferIntent) -> Result<TransferReceipt, AppError> {
        let TransferIntent {
            from,
            to,
            amount_cents,
        } = intent;

        let deadline = Deadline::start(self.lock_timeout);
        let mut tx = self.begin(deadline).await?;

        // Locks in canonical order; the checks below still run source-first.
        let (first, second) = intent.lock_order();
        let first_balance = tx.lock_balance(first).await?;
        let second_balance = tx.lock_balance(second).await?;
        let (from_balance, to_balance) = if first == from {
            (first_balance, second_balance)
        } else {
            (second_balance, first_balance)
        };

        let Some(from_balance) = from_balance else {
            abort(tx, "source not found").await;
            return Err(AppError::AccountNotFound(from));
        };
        if from_balance < amount_cents {
            abort(tx, "insufficient funds").await;
            return Err(AppError::InsufficientFunds {
                account: from,
                balance: from_balance,
                required: amount_cents,
            });
        }
        let Some(to_balance) = to_balance else {
            abort(tx, "destination not found").await;
            return Err(AppError::AccountNotFound(to));
        };
        let Some(to_after) = to_balance.checked_add(amount_cents) else {
            abort(tx, "balance overflow").await;
            return Err(AppError::InvalidAmount(format!(
                "transferring {} would overflow the balance of {}",
                format_cents(amount_cents),
                to
            )));
        };
        let from_after = from_balance - amount_cents;

        let mut tx = deadline.check(tx).await?;
        tx.write_balance(from, from_after).await?;
        tx.write_balance(to, to_after).await?;
        tx.commit().await?;

        Ok(TransferReceipt {
            from,
            to,
            amount_cents,
            from_balance: from_after,
            to_balance: to_after,
        })
    }
}

/// Time budget of one balance transaction, measured from before the write lock is requested.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    fn start(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    fn expired(&self) -> bool {
        self.elapsed() > self.budget
    }

    /// Hand the transaction back if there is still time to write, otherwise roll it back.
    async fn check(self, tx: LedgerTx) -> Result<LedgerTx, AppError> {
        if !self.expired() {
            return Ok(tx);
        }
        abort(tx, "deadline passed before writing").await;
        tracing::warn!(
            timeout = ?self.budget,
            elapsed = ?self.elapsed(),
            "balance transaction timed out, rolled back"
        );
        Err(AppError::LockTimeout(self.elapsed()))
    }
}

/// Drive a transaction on its own task, so dropping the caller's future never
/// interrupts a database call halfway.
async fn run_to_completion<T, F>(operation: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, AppError>> + Send + 'static,
{
    tokio::spawn(operation)
        .await
        .map_err(|err| AppError::Store(anyhow::Error::new(err).context("Balance task failed")))?
}

fn ensure_positive(amount_cents: Cents) -> Result<(), AppError> {
    if amount_cents <= 0 {
        return Err(AppError::InvalidAmount(format!(
            "amount must be positive, got {}",
            format_cents(amount_cents)
        )));
    }
    Ok(())
}

/// Roll back a rejected transaction. A failed rollback is only logged: the caller gets
/// the business error, and the dropped transaction is discarded by its connection.
async fn abort(tx: LedgerTx, reason: &'static str) {
    tracing::debug!(reason, "rolling back balance transaction");
    if let Err(err) = tx.rollback().await {
        tracing::warn!(error = %format!("{err:#}"), reason, "rollback failed");
    }
}
