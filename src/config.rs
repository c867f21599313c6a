//! Runtime configuration for the ledger store and balance engine.
//!
//! Values come from the environment (after `.env` is loaded by the binary):
//!
//! | Variable                    | Default                       |
//! |-----------------------------|-------------------------------|
//! | `DATABASE_URL`              | `sqlite:passbook.db?mode=rwc` |
//! | `PASSBOOK_MAX_CONNECTIONS`  | `5`                           |
//! | `PASSBOOK_BUSY_TIMEOUT_MS`  | `5000`                        |
//! | `PASSBOOK_LOCK_TIMEOUT_MS`  | `5000`                        |

use std::env;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:passbook.db?mode=rwc";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{0} is set but empty")]
    Empty(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// sqlx SQLite connection URL
    pub database_url: String,
    /// Upper bound on pooled connections
    pub max_connections: u32,
    /// How long SQLite waits for another writer before reporting the database busy
    pub busy_timeout: Duration,
    /// Deadline for a whole balance transaction, from begin to commit
    pub lock_timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

impl LedgerConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let database_url = match lookup("DATABASE_URL") {
            Some(value) if value.trim().is_empty() => {
                return Err(ConfigError::Empty("DATABASE_URL"));
            }
            Some(value) => value.trim().to_string(),
            None => defaults.database_url,
        };

        let max_connections = parse_positive(&lookup, "PASSBOOK_MAX_CONNECTIONS")?
            .map(|n| n as u32)
            .unwrap_or(defaults.max_connections);
        let busy_timeout = parse_positive(&lookup, "PASSBOOK_BUSY_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.busy_timeout);
        let lock_timeout = parse_positive(&lookup, "PASSBOOK_LOCK_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.lock_timeout);

        Ok(Self {
            database_url,
            max_connections,
            busy_timeout,
            lock_timeout,
        })
    }

    /// Configuration pointing at a SQLite file, created on first use.
    pub fn for_path(path: &str) -> Self {
        Self {
            database_url: format!("sqlite:{}?mode=rwc", path),
            ..Self::default()
        }
    }

    /// Point at `target`: a full `sqlite:` URL is used as is, anything else is a file path.
    pub fn with_database(self, target: &str) -> Self {
        if target.starts_with("sqlite:") {
            self.with_database_url(target)
        } else {
            let url = Self::for_path(target).database_url;
            self.with_database_url(url)
        }
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }
}

fn parse_positive<F>(lookup: &F, name: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 && n <= u64::from(u32::MAX) => Ok(Some(n)),
        _ => Err(ConfigError::InvalidNumber { name, value: raw }),
    }
}
