use core::str::FromStr;

use serde::{Deserialize, Serialize};

use ledgerly_core::{DomainError, DomainResult, Entity, Money};

use crate::balance::Side;

const MAX_ACCOUNT_NUMBER_LEN: usize = 12;

/// High-level account kind (determines normal balance side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl AccountKind {
    /// Side on which the account normally carries its balance.
    pub fn normal_side(self) -> Side {
        match self {
            AccountKind::Asset | AccountKind::Expense => Side::Debit,
            AccountKind::Liability | AccountKind::Equity | AccountKind::Revenue => Side::Credit,
        }
    }
}

/// Account number, e.g. `"512000"`. Digits only, unique within a company.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountNumber(String);

impl AccountNumber {
    pub fn new(raw: impl Into<String>) -> DomainResult<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(DomainError::validation("account number must not be empty"));
        }
        if trimmed.len() > MAX_ACCOUNT_NUMBER_LEN {
            return Err(DomainError::validation(format!(
                "account number '{trimmed}' exceeds {MAX_ACCOUNT_NUMBER_LEN} characters"
            )));
        }
        if !trimmed.chars().all(|c| c.is_ascii_digit()) {
            return Err(DomainError::validation(format!(
                "account number '{trimmed}' must contain digits only"
            )));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Class implied by the leading digit (`4xxxx` is class 4).
    pub fn implied_class(&self) -> Option<AccountClass> {
        let first = self.0.chars().next()?.to_digit(10)?;
        AccountClass::new(first as u8).ok()
    }
}

impl core::fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AccountNumber {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for AccountNumber {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AccountNumber> for String {
    fn from(value: AccountNumber) -> Self {
        value.0
    }
}

/// Chart-of-accounts class, 1 through 9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct AccountClass(u8);

impl AccountClass {
    pub fn new(class: u8) -> DomainResult<Self> {
        if (1..=9).contains(&class) {
            Ok(Self(class))
        } else {
            Err(DomainError::validation(format!(
                "account class must be between 1 and 9 (got {class})"
            )))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for AccountClass {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AccountClass> for u8 {
    fn from(value: AccountClass) -> Self {
        value.0
    }
}

/// Chart-of-accounts entry.
///
/// `opening_balance` is signed debit-positive: a credit opening balance of
/// 500 is stored as `-500`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub number: AccountNumber,
    pub name: String,
    pub kind: AccountKind,
    pub class: AccountClass,
    pub opening_balance: Money,
}

impl Account {
    /// Build an account whose class is implied by its number.
    pub fn new(number: AccountNumber, name: impl Into<String>, kind: AccountKind) -> DomainResult<Self> {
        let class = number.implied_class().ok_or_else(|| {
            DomainError::validation(format!(
                "account number '{number}' does not imply a class (leading digit 0)"
            ))
        })?;
        Self::with_class(number, name, kind, class)
    }

    pub fn with_class(
        number: AccountNumber,
        name: impl Into<String>,
        kind: AccountKind,
        class: AccountClass,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("account name must not be empty"));
        }

        Ok(Self {
            number,
            name,
            kind,
            class,
            opening_balance: Money::ZERO,
        })
    }

    pub fn with_opening_balance(mut self, opening_balance: Money) -> Self {
        self.opening_balance = opening_balance;
        self
    }

    /// Opening balance expressed on the account's normal side (positive when
    /// the account carries its usual balance).
    pub fn opening_on_normal_side(&self) -> Money {
        match self.kind.normal_side() {
            Side::Debit => self.opening_balance,
            Side::Credit => -self.opening_balance,
        }
    }
}

impl Entity for Account {
    type Id = AccountNumber;

    fn id(&self) -> &Self::Id {
        &self.number
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn number(raw: &str) -> AccountNumber {
        AccountNumber::new(raw).unwrap()
    }

    #[test]
    fn account_number_rejects_non_digits_and_empty() {
        assert!(AccountNumber::new("").is_err());
        assert!(AccountNumber::new("   ").is_err());
        assert!(AccountNumber::new("41A").is_err());
        assert!(AccountNumber::new("1234567890123").is_err());
        assert_eq!(number(" 512000 ").as_str(), "512000");
    }

    #[test]
    fn class_is_implied_by_leading_digit() {
        let acct = Account::new(number("411000"), "Clients", AccountKind::Asset).unwrap();
        assert_eq!(acct.class.get(), 4);
        assert!(Account::new(number("0100"), "Bad", AccountKind::Asset).is_err());
    }

    #[test]
    fn normal_side_follows_kind() {
        assert_eq!(AccountKind::Asset.normal_side(), Side::Debit);
        assert_eq!(AccountKind::Expense.normal_side(), Side::Debit);
        assert_eq!(AccountKind::Revenue.normal_side(), Side::Credit);
        assert_eq!(AccountKind::Liability.normal_side(), Side::Credit);
    }

    #[test]
    fn credit_opening_balance_is_positive_on_normal_side() {
        let acct = Account::new(number("401000"), "Fournisseurs", AccountKind::Liability)
            .unwrap()
            .with_opening_balance(Money::new(dec!(-500)));
        assert_eq!(acct.opening_on_normal_side(), Money::new(dec!(500)));
    }

    #[test]
    fn deserializing_invalid_number_fails() {
        let res: Result<AccountNumber, _> = serde_json::from_str("\"12x\"");
        assert!(res.is_err());
        let class: Result<AccountClass, _> = serde_json::from_str("0");
        assert!(class.is_err());
    }
}
