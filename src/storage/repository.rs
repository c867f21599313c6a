use std::str::FromStr;

use anyhow::{Context, Result, bail};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Executor, Row, Sqlite, SqlitePool, Transaction};

use crate::config::LedgerConfig;
use crate::domain::{
    Account, AccountKind, AccountRef, Cents, LegalAccount, NaturalAccount, NewLegalAccount,
    NewNaturalAccount,
};

use super::MIGRATION_001_ACCOUNTS;

// Every entry point dispatches on the kind through one of these. The match is
// exhaustive, so a new kind cannot silently fall through to a default table.

fn select_balance_sql(kind: AccountKind) -> &'static str {
    match kind {
        AccountKind::Natural => "SELECT balance FROM natural_person WHERE id = ?",
        AccountKind::Legal => "SELECT balance FROM legal_person WHERE id = ?",
    }
}

fn update_balance_sql(kind: AccountKind) -> &'static str {
    match kind {
        AccountKind::Natural => "UPDATE natural_person SET balance = ? WHERE id = ?",
        AccountKind::Legal => "UPDATE legal_person SET balance = ? WHERE id = ?",
    }
}

fn delete_sql(kind: AccountKind) -> &'static str {
    match kind {
        AccountKind::Natural => "DELETE FROM natural_person WHERE id = ?",
        AccountKind::Legal => "DELETE FROM legal_person WHERE id = ?",
    }
}

async fn write_balance_with<'e, E>(
    executor: E,
    account: AccountRef,
    balance: Cents,
) -> Result<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(update_balance_sql(account.kind))
        .bind(balance)
        .bind(account.id)
        .execute(executor)
        .await
        .with_context(|| format!("Failed to write balance for {}", account))?;
    Ok(result.rows_affected() == 1)
}

const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Whether `err` comes from waiting on another writer: SQLite reported the database
/// busy or locked, or no pooled connection became free in time.
pub fn is_lock_contention(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| match cause.downcast_ref::<sqlx::Error>() {
            Some(sqlx::Error::PoolTimedOut) => true,
            Some(sqlx::Error::Database(db)) => db
                .code()
                .and_then(|code| code.parse::<i32>().ok())
                // Extended result codes keep the primary code in the low byte
                .is_some_and(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED)),
            _ => false,
        })
}

/// Durable storage for natural and legal person accounts.
///
/// Cloning is cheap: clones share the same connection pool.
#[derive(Clone)]
pub struct LedgerStore {
    pool: SqlitePool,
}

impl LedgerStore {
    /// Create a store over an existing SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a connection pool as described by `config`.
    ///
    /// The database runs in WAL mode so plain balance reads never wait on a writer,
    /// and writers queue behind each other for up to `busy_timeout`.
    pub async fn connect(config: &LedgerConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)
            .with_context(|| format!("Invalid database URL: {}", config.database_url))?
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(config.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;

        tracing::debug!(
            url = %config.database_url,
            max_connections = config.max_connections,
            "connected to ledger database"
        );
        Ok(Self::new(pool))
    }

    /// Run database migrations. Safe to run more than once.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_ACCOUNTS)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a database (connect + migrate).
    pub async fn init(config: &LedgerConfig) -> Result<Self> {
        let store = Self::connect(config).await?;
        store.migrate().await?;
        Ok(store)
    }

    /// Close every pooled connection. Pending transactions finish first.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Start a write transaction.
    ///
    /// The transaction is opened with `BEGIN IMMEDIATE`, so the SQLite write lock is
    /// held from the start: every balance read through the returned [`LedgerTx`] is a
    /// lock-read, and no other writer can touch any account until it ends.
    pub async fn begin(&self) -> Result<LedgerTx> {
        let tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .context("Failed to begin balance transaction")?;
        Ok(LedgerTx { tx })
    }

    // ========================
    // Account records
    // ========================

    /// Insert a natural person account. Returns the stored record with its new id.
    pub async fn insert_natural(&self, new: &NewNaturalAccount) -> Result<NaturalAccount> {
        let row = sqlx::query(
            r#"
            INSERT INTO natural_person (monthly_income, age, full_name, phone_number, email, category, balance)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(new.monthly_income)
        .bind(i64::from(new.age))
        .bind(&new.full_name)
        .bind(&new.phone_number)
        .bind(&new.email)
        .bind(&new.category)
        .bind(new.balance)
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert natural person account")?;

        Ok(NaturalAccount {
            id: row.get("id"),
            monthly_income: new.monthly_income,
            age: new.age,
            full_name: new.full_name.clone(),
            phone_number: new.phone_number.clone(),
            email: new.email.clone(),
            category: new.category.clone(),
            balance: new.balance,
        })
    }

    /// Insert a legal person account. Returns the stored record with its new id.
    pub async fn insert_legal(&self, new: &NewLegalAccount) -> Result<LegalAccount> {
        let row = sqlx::query(
            r#"
            INSERT INTO legal_person (annual_revenue, age, trade_name, phone_number, corporate_email, category, balance)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(new.annual_revenue)
        .bind(i64::from(new.age))
        .bind(&new.trade_name)
        .bind(&new.phone_number)
        .bind(&new.corporate_email)
        .bind(&new.category)
        .bind(new.balance)
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert legal person account")?;

        Ok(LegalAccount {
            id: row.get("id"),
            annual_revenue: new.annual_revenue,
            age: new.age,
            trade_name: new.trade_name.clone(),
            phone_number: new.phone_number.clone(),
            corporate_email: new.corporate_email.clone(),
            category: new.category.clone(),
            balance: new.balance,
        })
    }

    /// Get an account record by kind and id.
    pub async fn fetch_account(&self, account: AccountRef) -> Result<Option<Account>> {
        match account.kind {
            AccountKind::Natural => {
                let row = sqlx::query(
                    r#"
                    SELECT id, monthly_income, age, full_name, phone_number, email, category, balance
                    FROM natural_person
                    WHERE id = ?
                    "#,
                )
                .bind(account.id)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to fetch natural person account")?;

                row.map(|r| Self::row_to_natural(&r).map(Account::Natural))
                    .transpose()
            }
            AccountKind::Legal => {
                let row = sqlx::query(
                    r#"
                    SELECT id, annual_revenue, age, trade_name, phone_number, corporate_email, category, balance
                    FROM legal_person
                    WHERE id = ?
                    "#,
                )
                .bind(account.id)
                .fetch_optional(&self.pool)
                .await
                .context("Failed to fetch legal person account")?;

                row.map(|r| Self::row_to_legal(&r).map(Account::Legal))
                    .transpose()
            }
        }
    }

    /// Delete an account. Returns false if no record matched.
    pub async fn delete_account(&self, account: AccountRef) -> Result<bool> {
        let result = sqlx::query(delete_sql(account.kind))
            .bind(account.id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete account {}", account))?;
        Ok(result.rows_affected() == 1)
    }

    // ========================
    // Balances
    // ========================

    /// Read a balance without taking any lock.
    pub async fn read_balance(&self, account: AccountRef) -> Result<Option<Cents>> {
        let row = sqlx::query(select_balance_sql(account.kind))
            .bind(account.id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to read balance for {}", account))?;
        Ok(row.map(|r| r.get("balance")))
    }

    /// Overwrite a balance in its own autocommit statement.
    /// Returns false if no record matched.
    pub async fn write_balance(&self, account: AccountRef, balance: Cents) -> Result<bool> {
        write_balance_with(&self.pool, account, balance).await
    }

    fn row_to_natural(row: &SqliteRow) -> Result<NaturalAccount> {
        let age: i64 = row.get("age");
        Ok(NaturalAccount {
            id: row.get("id"),
            monthly_income: row.get("monthly_income"),
            age: u32::try_from(age).context("Invalid age")?,
            full_name: row.get("full_name"),
            phone_number: row.get("phone_number"),
            email: row.get("email"),
            category: row.get("category"),
            balance: row.get("balance"),
        })
    }

    fn row_to_legal(row: &SqliteRow) -> Result<LegalAccount> {
        let age: i64 = row.get("age");
        Ok(LegalAccount {
            id: row.get("id"),
            annual_revenue: row.get("annual_revenue"),
            age: u32::try_from(age).context("Invalid age")?,
            trade_name: row.get("trade_name"),
            phone_number: row.get("phone_number"),
            corporate_email: row.get("corporate_email"),
            category: row.get("category"),
            balance: row.get("balance"),
        })
    }
}

/// An open write transaction on the ledger.
///
/// Writes made through it are invisible to other connections until [`commit`](Self::commit).
/// Dropping it without committing rolls everything back and releases the write lock,
/// so early returns and cancelled futures never leave partial balance changes behind.
pub struct LedgerTx {
    tx: Transaction<'static, Sqlite>,
}

impl LedgerTx {
    /// Read a balance while holding the write lock.
    pub async fn lock_balance(&mut self, account: AccountRef) -> Result<Option<Cents>> {
        let row = sqlx::query(select_balance_sql(account.kind))
            .bind(account.id)
            .fetch_optional(&mut *self.tx)
            .await
            .with_context(|| format!("Failed to lock balance for {}", account))?;
        Ok(row.map(|r| r.get("balance")))
    }

    /// Overwrite a balance inside this transaction.
    pub async fn write_balance(&mut self, account: AccountRef, balance: Cents) -> Result<()> {
        if !write_balance_with(&mut *self.tx, account, balance).await? {
            bail!("Account {} disappeared inside a locked transaction", account);
        }
        Ok(())
    }

    pub async fn commit(self) -> Result<()> {
        self.tx
            .commit()
            .await
            .context("Failed to commit balance transaction")
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx
            .rollback()
            .await
            .context("Failed to roll back balance transaction")
    }
}
