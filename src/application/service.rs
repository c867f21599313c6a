use crate::config::LedgerConfig;
use crate::domain::{
    Account, AccountKind, AccountRef, Cents, LegalAccount, NaturalAccount, NewLegalAccount,
    NewNaturalAccount, TransferIntent, TransferReceipt,
};
use crate::storage::LedgerStore;

use super::{AppError, BalanceEngine};

/// Application service providing every account operation behind one interface,
/// whatever the account kind. This is the entry point for any client (CLI, API, etc.).
///
/// Opening and closing accounts go straight to the store; every balance change is
/// delegated to the [`BalanceEngine`].
#[derive(Clone)]
pub struct AccountService {
    store: LedgerStore,
    engine: BalanceEngine,
}

impl AccountService {
    /// Create a service over an already-connected store.
    pub fn new(store: LedgerStore, config: &LedgerConfig) -> Self {
        let engine = BalanceEngine::new(store.clone(), config.lock_timeout);
        Self { store, engine }
    }

    /// Connect and create the schema if it doesn't exist yet.
    pub async fn init(config: &LedgerConfig) -> Result<Self, AppError> {
        let store = LedgerStore::init(config).await?;
        Ok(Self::new(store, config))
    }

    /// Connect to an existing database.
    pub async fn connect(config: &LedgerConfig) -> Result<Self, AppError> {
        let store = LedgerStore::connect(config).await?;
        Ok(Self::new(store, config))
    }

    /// Release the connection pool. Other clones of this service stop working too.
    pub async fn close(&self) {
        self.store.close().await;
    }

    // ========================
    // Account lifecycle
    // ========================

    /// Open an account from a raw kind tag and a JSON payload.
    pub async fn create_account(&self, kind: &str, payload: &[u8]) -> Result<Account, AppError> {
        let kind: AccountKind = kind.parse()?;
        match kind {
            AccountKind::Natural => {
                let new: NewNaturalAccount = serde_json::from_slice(payload)?;
                Ok(Account::Natural(self.open_natural(new).await?))
            }
            AccountKind::Legal => {
                let new: NewLegalAccount = serde_json::from_slice(payload)?;
                Ok(Account::Legal(self.open_legal(new).await?))
            }
        }
    }

    /// Open a natural person account.
    pub async fn open_natural(&self, new: NewNaturalAccount) -> Result<NaturalAccount, AppError> {
        if let Some(problem) = new.negative_amount() {
            return Err(AppError::InvalidAmount(problem));
        }
        let account = self.store.insert_natural(&new).await?;
        tracing::info!(account = %AccountRef::natural(account.id), "account opened");
        Ok(account)
    }

    /// Open a legal person account.
    pub async fn open_legal(&self, new: NewLegalAccount) -> Result<LegalAccount, AppError> {
        if let Some(problem) = new.negative_amount() {
            return Err(AppError::InvalidAmount(problem));
        }
        let account = self.store.insert_legal(&new).await?;
        tracing::info!(account = %AccountRef::legal(account.id), "account opened");
        Ok(account)
    }

    /// Get the full account record.
    pub async fn get_account(&self, account: AccountRef) -> Result<Account, AppError> {
        self.store
            .fetch_account(account)
            .await?
            .ok_or(AppError::AccountNotFound(account))
    }

    /// Delete an account permanently.
    pub async fn close_account(&self, account: AccountRef) -> Result<(), AppError> {
        if !self.store.delete_account(account).await? {
            return Err(AppError::AccountNotFound(account));
        }
        tracing::info!(%account, "account closed");
        Ok(())
    }

    // ========================
    // Balances
    // ========================

    pub async fn get_balance(&self, account: AccountRef) -> Result<Cents, AppError> {
        self.engine.balance(account).await
    }

    pub async fn deposit(
        &self,
        account: AccountRef,
        amount_cents: Cents,
    ) -> Result<Cents, AppError> {
        self.engine.deposit(account, amount_cents).await
    }

    pub async fn withdraw(
        &self,
        account: AccountRef,
        amount_cents: Cents,
    ) -> Result<Cents, AppError> {
        self.engine.withdraw(account, amount_cents).await
    }

    pub async fn transfer(
        &self,
        from: AccountRef,
        to: AccountRef,
        amount_cents: Cents,
    ) -> Result<TransferReceipt, AppError> {
        self.engine
            .transfer(TransferIntent::new(from, to, amount_cents))
            .await
    }
}
