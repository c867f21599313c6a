use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Cents, decimal};

/// Store-assigned identifier. Unique only within an [`AccountKind`].
pub type AccountId = i64;

/// Discriminates the two account record shapes and the table each lives in.
///
/// Variant order is significant: it is the first component of the canonical
/// lock order used by transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    /// An individual
    Natural,
    /// A company or other legal entity
    Legal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown account kind: {0} (expected 'natural' or 'legal')")]
pub struct UnknownAccountKind(pub String);

impl AccountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountKind::Natural => "natural",
            AccountKind::Legal => "legal",
        }
    }
}

impl FromStr for AccountKind {
    type Err = UnknownAccountKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "natural" => Ok(AccountKind::Natural),
            "legal" => Ok(AccountKind::Legal),
            _ => Err(UnknownAccountKind(s.to_string())),
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Addresses exactly one account: identifiers are only unique per kind.
///
/// The derived `Ord` compares kind first, then id. Transfers acquire locks in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountRef {
    pub kind: AccountKind,
    pub id: AccountId,
}

impl AccountRef {
    pub fn new(kind: AccountKind, id: AccountId) -> Self {
        Self { kind, id }
    }

    pub fn natural(id: AccountId) -> Self {
        Self::new(AccountKind::Natural, id)
    }

    pub fn legal(id: AccountId) -> Self {
        Self::new(AccountKind::Legal, id)
    }
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NaturalAccount {
    pub id: AccountId,
    #[serde(with = "decimal")]
    pub monthly_income: Cents,
    pub age: u32,
    pub full_name: String,
    pub phone_number: String,
    pub email: String,
    pub category: String,
    #[serde(with = "decimal")]
    pub balance: Cents,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalAccount {
    pub id: AccountId,
    #[serde(with = "decimal")]
    pub annual_revenue: Cents,
    pub age: u32,
    pub trade_name: String,
    pub phone_number: String,
    pub corporate_email: String,
    pub category: String,
    #[serde(with = "decimal")]
    pub balance: Cents,
}

/// Payload for opening a natural person account. Any `id` in the payload is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewNaturalAccount {
    #[serde(with = "decimal")]
    pub monthly_income: Cents,
    pub age: u32,
    pub full_name: String,
    pub phone_number: String,
    pub email: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, with = "decimal")]
    pub balance: Cents,
}

/// Payload for opening a legal person account. Any `id` in the payload is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewLegalAccount {
    #[serde(with = "decimal")]
    pub annual_revenue: Cents,
    pub age: u32,
    pub trade_name: String,
    pub phone_number: String,
    pub corporate_email: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, with = "decimal")]
    pub balance: Cents,
}

impl NewNaturalAccount {
    /// Returns a description of the first amount that is negative, if any.
    pub fn negative_amount(&self) -> Option<String> {
        negative_field(&[
            ("balance", self.balance),
            ("monthly_income", self.monthly_income),
        ])
    }
}

impl NewLegalAccount {
    /// Returns a description of the first amount that is negative, if any.
    pub fn negative_amount(&self) -> Option<String> {
        negative_field(&[
            ("balance", self.balance),
            ("annual_revenue", self.annual_revenue),
        ])
    }
}

fn negative_field(fields: &[(&str, Cents)]) -> Option<String> {
    fields
        .iter()
        .find(|(_, value)| *value < 0)
        .map(|(name, _)| format!("{name} must not be negative"))
}

/// A stored account of either kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Account {
    Natural(NaturalAccount),
    Legal(LegalAccount),
}

impl Account {
    pub fn kind(&self) -> AccountKind {
        match self {
            Account::Natural(_) => AccountKind::Natural,
            Account::Legal(_) => AccountKind::Legal,
        }
    }

    pub fn id(&self) -> AccountId {
        match self {
            Account::Natural(a) => a.id,
            Account::Legal(a) => a.id,
        }
    }

    pub fn account_ref(&self) -> AccountRef {
        AccountRef::new(self.kind(), self.id())
    }

    pub fn balance(&self) -> Cents {
        match self {
            Account::Natural(a) => a.balance,
            Account::Legal(a) => a.balance,
        }
    }

    /// Holder name: full name for individuals, trade name for companies.
    pub fn holder(&self) -> &str {
        match self {
            Account::Natural(a) => &a.full_name,
            Account::Legal(a) => &a.trade_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_kind_parse() {
        assert_eq!("natural".parse::<AccountKind>(), Ok(AccountKind::Natural));
        assert_eq!(" Legal ".parse::<AccountKind>(), Ok(AccountKind::Legal));
        assert_eq!(
            "corporate".parse::<AccountKind>(),
            Err(UnknownAccountKind("corporate".to_string()))
        );
        for kind in [AccountKind::Natural, AccountKind::Legal] {
            assert_eq!(kind.as_str().parse::<AccountKind>(), Ok(kind));
        }
    }

    #[test]
    fn test_account_ref_order_is_kind_then_id() {
        let mut refs = vec![
            AccountRef::legal(1),
            AccountRef::natural(7),
            AccountRef::natural(2),
            AccountRef::legal(0),
        ];
        refs.sort();
        assert_eq!(
            refs,
            vec![
                AccountRef::natural(2),
                AccountRef::natural(7),
                AccountRef::legal(0),
                AccountRef::legal(1),
            ]
        );
    }

    #[test]
    fn test_account_ref_display() {
        assert_eq!(AccountRef::natural(1).to_string(), "natural:1");
        assert_eq!(AccountRef::legal(42).to_string(), "legal:42");
    }

    #[test]
    fn test_new_natural_account_from_json() {
        let payload = r#"{
            "id": 99,
            "monthly_income": 3500.5,
            "age": 31,
            "full_name": "Ana Souza",
            "phone_number": "+55 11 5555-0101",
            "email": "ana@example.com",
            "category": "premium",
            "balance": 500
        }"#;
        let new: NewNaturalAccount = serde_json::from_str(payload).unwrap();
        assert_eq!(new.monthly_income, 350050);
        assert_eq!(new.balance, 50000);
        assert_eq!(new.category, "premium");
        assert_eq!(new.negative_amount(), None);
    }

    #[test]
    fn test_new_legal_account_defaults_balance_and_category() {
        let payload = r#"{
            "annual_revenue": "1200000.00",
            "age": 12,
            "trade_name": "Acme Ltda",
            "phone_number": "+55 11 5555-0202",
            "corporate_email": "finance@acme.example"
        }"#;
        let new: NewLegalAccount = serde_json::from_str(payload).unwrap();
        assert_eq!(new.balance, 0);
        assert_eq!(new.category, "");
        assert_eq!(new.annual_revenue, 120_000_000);
    }

    #[test]
    fn test_negative_amounts_are_reported() {
        let new = NewLegalAccount {
            annual_revenue: 100,
            age: 1,
            trade_name: "Shell Co".into(),
            phone_number: String::new(),
            corporate_email: String::new(),
            category: String::new(),
            balance: -1,
        };
        assert_eq!(
            new.negative_amount().as_deref(),
            Some("balance must not be negative")
        );
    }

    #[test]
    fn test_negative_age_is_not_decodable() {
        let payload = r#"{
            "monthly_income": 1,
            "age": -3,
            "full_name": "x",
            "phone_number": "x",
            "email": "x"
        }"#;
        assert!(serde_json::from_str::<NewNaturalAccount>(payload).is_err());
    }

    #[test]
    fn test_account_accessors() {
        let account = Account::Legal(LegalAccount {
            id: 2,
            annual_revenue: 0,
            age: 5,
            trade_name: "Acme".into(),
            phone_number: String::new(),
            corporate_email: String::new(),
            category: "sme".into(),
            balance: 100_000,
        });
        assert_eq!(account.account_ref(), AccountRef::legal(2));
        assert_eq!(account.balance(), 100_000);
        assert_eq!(account.holder(), "Acme");
    }
}
