//! Chart of accounts (`plan comptable`) for one company.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use ledgerly_core::{DomainError, DomainResult, Money, TenantId};

use crate::account::{Account, AccountNumber};
use crate::balance::BalanceCheck;

/// Ordered set of accounts keyed by number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartOfAccounts {
    tenant_id: TenantId,
    accounts: BTreeMap<AccountNumber, Account>,
}

impl ChartOfAccounts {
    pub fn new(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            accounts: BTreeMap::new(),
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Add an account. A number already present is a conflict.
    pub fn open_account(&mut self, account: Account) -> DomainResult<()> {
        if self.accounts.contains_key(&account.number) {
            return Err(DomainError::conflict(format!(
                "account {} already exists",
                account.number
            )));
        }
        self.accounts.insert(account.number.clone(), account);
        Ok(())
    }

    pub fn get(&self, number: &AccountNumber) -> Option<&Account> {
        self.accounts.get(number)
    }

    pub fn contains(&self, number: &AccountNumber) -> bool {
        self.accounts.contains_key(number)
    }

    pub fn rename(&mut self, number: &AccountNumber, name: impl Into<String>) -> DomainResult<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("account name must not be empty"));
        }
        let account = self.accounts.get_mut(number).ok_or(DomainError::NotFound)?;
        account.name = name;
        Ok(())
    }

    pub fn set_opening_balance(&mut self, number: &AccountNumber, opening: Money) -> DomainResult<()> {
        let account = self.accounts.get_mut(number).ok_or(DomainError::NotFound)?;
        account.opening_balance = opening;
        Ok(())
    }

    /// Accounts in number order.
    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Opening balances must net to zero across the chart.
    pub fn opening_balance_check(&self) -> BalanceCheck {
        let mut debit = Money::ZERO;
        let mut credit = Money::ZERO;
        for account in self.accounts.values() {
            if account.opening_balance.is_negative() {
                credit += -account.opening_balance;
            } else {
                debit += account.opening_balance;
            }
        }
        BalanceCheck::from_totals(debit, credit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountKind;
    use rust_decimal_macros::dec;

    fn account(n: &str, kind: AccountKind) -> Account {
        Account::new(AccountNumber::new(n).unwrap(), format!("Account {n}"), kind).unwrap()
    }

    #[test]
    fn duplicate_account_number_is_a_conflict() {
        let mut chart = ChartOfAccounts::new(TenantId::new());
        chart.open_account(account("512000", AccountKind::Asset)).unwrap();

        let err = chart
            .open_account(account("512000", AccountKind::Asset))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(chart.len(), 1);
    }

    #[test]
    fn accounts_iterate_in_number_order() {
        let mut chart = ChartOfAccounts::new(TenantId::new());
        chart.open_account(account("706000", AccountKind::Revenue)).unwrap();
        chart.open_account(account("101000", AccountKind::Equity)).unwrap();
        chart.open_account(account("512000", AccountKind::Asset)).unwrap();

        let numbers: Vec<&str> = chart.accounts().map(|a| a.number.as_str()).collect();
        assert_eq!(numbers, vec!["101000", "512000", "706000"]);
    }

    #[test]
    fn rename_and_opening_balance_require_existing_account() {
        let mut chart = ChartOfAccounts::new(TenantId::new());
        let missing = AccountNumber::new("999").unwrap();
        assert_eq!(chart.rename(&missing, "x"), Err(DomainError::NotFound));
        assert_eq!(
            chart.set_opening_balance(&missing, Money::ZERO),
            Err(DomainError::NotFound)
        );
    }

    #[test]
    fn opening_balances_check_nets_debit_against_credit() {
        let mut chart = ChartOfAccounts::new(TenantId::new());
        chart.open_account(account("512000", AccountKind::Asset)).unwrap();
        chart.open_account(account("101000", AccountKind::Equity)).unwrap();

        let bank = AccountNumber::new("512000").unwrap();
        let capital = AccountNumber::new("101000").unwrap();
        chart.set_opening_balance(&bank, Money::new(dec!(1000))).unwrap();
        chart.set_opening_balance(&capital, Money::new(dec!(-1000))).unwrap();

        let check = chart.opening_balance_check();
        assert!(check.balanced);
        assert_eq!(check.total_debit, Money::new(dec!(1000)));

        chart.set_opening_balance(&capital, Money::new(dec!(-900))).unwrap();
        assert!(!chart.opening_balance_check().balanced);
    }
}
