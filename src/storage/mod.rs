mod repository;

pub use repository::*;

/// SQL migration for the natural and legal person account tables
pub const MIGRATION_001_ACCOUNTS: &str = include_str!("migrations/001_accounts.sql");
