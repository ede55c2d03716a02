//! Account statement (`grand livre` view of a single account).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use ledgerly_core::{DomainError, Money};

use crate::account::AccountNumber;
use crate::balance::Side;
use crate::chart::ChartOfAccounts;
use crate::journal::JournalEntryId;
use crate::trial_balance::{Period, PostedEntry};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementLine {
    pub entry_id: JournalEntryId,
    pub entry_date: NaiveDate,
    pub journal_code: String,
    pub label: Option<String>,
    pub debit: Money,
    pub credit: Money,
    /// Debit-positive balance after this line.
    pub running_balance: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStatement {
    pub account: AccountNumber,
    pub period: Period,
    pub opening: Money,
    pub lines: Vec<StatementLine>,
    pub closing: Money,
}

impl AccountStatement {
    /// Movements of `account` in `period`, ordered by date then entry id,
    /// with a running balance seeded from the chart opening balance and
    /// everything posted before the period.
    ///
    /// Entries must belong to the chart's tenant.
    pub fn compute<'a, I>(
        chart: &ChartOfAccounts,
        account: &AccountNumber,
        period: Period,
        entries: I,
    ) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = &'a PostedEntry>,
    {
        let mut opening = chart
            .get(account)
            .map(|a| a.opening_balance)
            .unwrap_or(Money::ZERO);

        let mut in_period: Vec<(&PostedEntry, Side, Money, Option<String>)> = Vec::new();

        for entry in entries {
            if entry.tenant_id != chart.tenant_id() {
                return Err(DomainError::invariant(format!(
                    "entry {} belongs to another tenant",
                    entry.entry_id
                )));
            }
            if entry.entry_date > period.end() {
                continue;
            }
            for line in entry.lines.iter().filter(|l| &l.account == account) {
                if entry.entry_date < period.start() {
                    opening += line.side.signed(line.amount);
                } else {
                    let label = line.label.clone().or_else(|| entry.description.clone());
                    in_period.push((entry, line.side, line.amount, label));
                }
            }
        }

        in_period.sort_by_key(|(e, ..)| (e.entry_date, e.entry_id));

        let mut running = opening;
        let lines = in_period
            .into_iter()
            .map(|(entry, side, amount, label)| {
                running += side.signed(amount);
                let (debit, credit) = match side {
                    Side::Debit => (amount, Money::ZERO),
                    Side::Credit => (Money::ZERO, amount),
                };
                StatementLine {
                    entry_id: entry.entry_id,
                    entry_date: entry.entry_date,
                    journal_code: entry.journal_code.clone(),
                    label,
                    debit,
                    credit,
                    running_balance: running,
                }
            })
            .collect();

        Ok(Self {
            account: account.clone(),
            period,
            opening,
            lines,
            closing: running,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{Account, AccountKind};
    use crate::journal::PostedLine;
    use chrono::Utc;
    use ledgerly_core::{AggregateId, TenantId};
    use rust_decimal_macros::dec;

    fn acct(n: &str) -> AccountNumber {
        AccountNumber::new(n).unwrap()
    }

    fn entry(tenant_id: TenantId, day: u32, side: Side, amount: rust_decimal::Decimal) -> PostedEntry {
        let amount = Money::new(amount);
        PostedEntry {
            tenant_id,
            entry_id: JournalEntryId::new(AggregateId::new()),
            journal_code: "BQ".to_string(),
            entry_date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            reference: None,
            description: Some(format!("op {day}")),
            lines: vec![
                PostedLine { account: acct("512000"), side, amount, label: None },
                PostedLine { account: acct("706000"), side: side.opposite(), amount, label: None },
            ],
            total: amount,
            posted_at: Utc::now(),
        }
    }

    #[test]
    fn running_balance_follows_date_order() {
        let tenant_id = TenantId::new();
        let mut chart = ChartOfAccounts::new(tenant_id);
        chart
            .open_account(
                Account::new(acct("512000"), "Bank", AccountKind::Asset)
                    .unwrap()
                    .with_opening_balance(Money::new(dec!(100))),
            )
            .unwrap();

        let entries = vec![
            entry(tenant_id, 20, Side::Credit, dec!(30)),
            entry(tenant_id, 2, Side::Debit, dec!(10)),
            entry(tenant_id, 10, Side::Debit, dec!(50)),
        ];
        let period = Period::new(
            NaiveDate::from_ymd_opt(2024, 5, 5).unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, 31).unwrap(),
        )
        .unwrap();

        let st = AccountStatement::compute(&chart, &acct("512000"), period, &entries).unwrap();

        assert_eq!(st.opening, Money::new(dec!(110)));
        assert_eq!(st.lines.len(), 2);
        assert_eq!(st.lines[0].debit, Money::new(dec!(50)));
        assert_eq!(st.lines[0].running_balance, Money::new(dec!(160)));
        assert_eq!(st.lines[1].credit, Money::new(dec!(30)));
        assert_eq!(st.lines[1].label.as_deref(), Some("op 20"));
        assert_eq!(st.closing, Money::new(dec!(130)));
    }

    #[test]
    fn foreign_entries_are_refused() {
        let chart = ChartOfAccounts::new(TenantId::new());
        let entries = vec![entry(TenantId::new(), 3, Side::Debit, dec!(5))];

        let err = AccountStatement::compute(&chart, &acct("512000"), Period::month(2024, 5).unwrap(), &entries)
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }
}
