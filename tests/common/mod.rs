// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::time::Duration;

use anyhow::Result;
use passbook::application::AccountService;
use passbook::config::LedgerConfig;
use passbook::domain::{AccountRef, Cents, NewLegalAccount, NewNaturalAccount};
use tempfile::TempDir;

/// Configuration for a fresh database inside `dir`
pub fn test_config(dir: &TempDir) -> LedgerConfig {
    let db_path = dir.path().join("test.db");
    LedgerConfig::for_path(db_path.to_str().unwrap())
        .with_busy_timeout(Duration::from_secs(30))
        .with_lock_timeout(Duration::from_secs(30))
}

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(AccountService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let service = AccountService::init(&test_config(&temp_dir)).await?;
    Ok((service, temp_dir))
}

pub fn natural_person(name: &str, balance: Cents) -> NewNaturalAccount {
    NewNaturalAccount {
        monthly_income: 450_000,
        age: 34,
        full_name: name.to_string(),
        phone_number: "+55 11 5555-0100".to_string(),
        email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
        category: "standard".to_string(),
        balance,
    }
}

pub fn legal_person(name: &str, balance: Cents) -> NewLegalAccount {
    NewLegalAccount {
        annual_revenue: 250_000_000,
        age: 8,
        trade_name: name.to_string(),
        phone_number: "+55 11 5555-0200".to_string(),
        corporate_email: "finance@example.com".to_string(),
        category: "business".to_string(),
        balance,
    }
}

/// Test fixture: one natural person holding 500.00 and one legal person holding 1000.00
pub struct StandardAccounts {
    pub person: AccountRef,
    pub company: AccountRef,
}

impl StandardAccounts {
    pub async fn create(service: &AccountService) -> Result<Self> {
        let person = service.open_natural(natural_person("Ana Souza", 50_000)).await?;
        let company = service.open_legal(legal_person("Acme Ltda", 100_000)).await?;
        Ok(Self {
            person: AccountRef::natural(person.id),
            company: AccountRef::legal(company.id),
        })
    }
}
