//! Trial balance (`balance comptable`) over posted entries.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use ledgerly_core::{DomainError, DomainResult, Money, TenantId, ValueObject};

use crate::account::{AccountKind, AccountNumber};
use crate::balance::{BalanceCheck, Side};
use crate::chart::ChartOfAccounts;
use crate::journal::{JournalEntryId, JournalEntryPosted, PostedLine};

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    start: NaiveDate,
    end: NaiveDate,
}

impl ValueObject for Period {}

impl Period {
    pub fn new(start: NaiveDate, end: NaiveDate) -> DomainResult<Self> {
        if start > end {
            return Err(DomainError::validation(format!(
                "period start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Calendar month `month` of `year`.
    pub fn month(year: i32, month: u32) -> DomainResult<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| DomainError::validation(format!("invalid month {year}-{month}")))?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(|| DomainError::validation(format!("invalid month {year}-{month}")))?;
        let end = next
            .pred_opt()
            .ok_or_else(|| DomainError::validation("period end out of range"))?;
        Self::new(start, end)
    }

    /// Calendar year `year`.
    pub fn year(year: i32) -> DomainResult<Self> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| DomainError::validation(format!("invalid year {year}")))?;
        let end = NaiveDate::from_ymd_opt(year, 12, 31)
            .ok_or_else(|| DomainError::validation(format!("invalid year {year}")))?;
        Self::new(start, end)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Read-side record of a posted entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedEntry {
    pub tenant_id: TenantId,
    pub entry_id: JournalEntryId,
    pub journal_code: String,
    pub entry_date: NaiveDate,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub lines: Vec<PostedLine>,
    pub total: Money,
    pub posted_at: DateTime<Utc>,
}

impl PostedEntry {
    pub fn balance_check(&self) -> BalanceCheck {
        let mut debit = Money::ZERO;
        let mut credit = Money::ZERO;
        for line in &self.lines {
            match line.side {
                Side::Debit => debit += line.amount,
                Side::Credit => credit += line.amount,
            }
        }
        BalanceCheck::from_totals(debit, credit)
    }
}

impl From<&JournalEntryPosted> for PostedEntry {
    fn from(e: &JournalEntryPosted) -> Self {
        Self {
            tenant_id: e.tenant_id,
            entry_id: e.entry_id,
            journal_code: e.journal_code.clone(),
            entry_date: e.entry_date,
            reference: e.reference.clone(),
            description: e.description.clone(),
            lines: e.lines.clone(),
            total: e.total,
            posted_at: e.occurred_at,
        }
    }
}

/// One account's line in the trial balance. Balances are debit-positive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalanceRow {
    pub account: AccountNumber,
    pub name: String,
    /// `None` for accounts posted to but missing from the chart.
    pub kind: Option<AccountKind>,
    pub opening: Money,
    pub debit: Money,
    pub credit: Money,
    pub closing: Money,
}

impl TrialBalanceRow {
    fn empty(account: AccountNumber, name: String, kind: Option<AccountKind>, opening: Money) -> Self {
        Self {
            account,
            name,
            kind,
            opening,
            debit: Money::ZERO,
            credit: Money::ZERO,
            closing: opening,
        }
    }

    /// `solde débiteur`: closing balance when it sits on the debit side.
    pub fn closing_debit(&self) -> Money {
        if self.closing.is_positive() { self.closing } else { Money::ZERO }
    }

    /// `solde créditeur`: closing balance when it sits on the credit side.
    pub fn closing_credit(&self) -> Money {
        if self.closing.is_negative() { -self.closing } else { Money::ZERO }
    }

    pub fn has_activity(&self) -> bool {
        !self.opening.is_zero() || !self.debit.is_zero() || !self.credit.is_zero()
    }

    fn post_opening(&mut self, line: &PostedLine) {
        let delta = line.side.signed(line.amount);
        self.opening += delta;
        self.closing += delta;
    }

    fn post_movement(&mut self, line: &PostedLine) {
        match line.side {
            Side::Debit => self.debit += line.amount,
            Side::Credit => self.credit += line.amount,
        }
        self.closing += line.side.signed(line.amount);
    }
}

/// Trial balance snapshot for one company and period (`BalanceComptable`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalance {
    pub tenant_id: TenantId,
    pub period: Period,
    pub rows: Vec<TrialBalanceRow>,
    /// Sum of period debit movements.
    pub total_debit: Money,
    /// Sum of period credit movements.
    pub total_credit: Money,
    /// `total_debit == total_credit`.
    pub equilibre: bool,
    pub unknown_accounts: Vec<AccountNumber>,
    pub entry_count: usize,
}

impl TrialBalance {
    /// Roll posted entries up per account.
    ///
    /// Entries dated before the period fold into opening balances; entries
    /// after it are ignored. Entries of another tenant are an error.
    pub fn compute<'a, I>(chart: &ChartOfAccounts, period: Period, entries: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = &'a PostedEntry>,
    {
        let tenant_id = chart.tenant_id();

        let mut rows: BTreeMap<AccountNumber, TrialBalanceRow> = chart
            .accounts()
            .map(|a| {
                (
                    a.number.clone(),
                    TrialBalanceRow::empty(a.number.clone(), a.name.clone(), Some(a.kind), a.opening_balance),
                )
            })
            .collect();
        let mut unknown: BTreeSet<AccountNumber> = BTreeSet::new();
        let mut entry_count = 0usize;

        for entry in entries {
            if entry.tenant_id != tenant_id {
                return Err(DomainError::invariant(format!(
                    "entry {} belongs to another tenant",
                    entry.entry_id
                )));
            }
            if entry.entry_date > period.end() {
                continue;
            }
            let in_period = period.contains(entry.entry_date);
            if in_period {
                entry_count += 1;
            }

            for line in &entry.lines {
                let row = rows.entry(line.account.clone()).or_insert_with(|| {
                    unknown.insert(line.account.clone());
                    TrialBalanceRow::empty(line.account.clone(), String::new(), None, Money::ZERO)
                });
                if in_period {
                    row.post_movement(line);
                } else {
                    row.post_opening(line);
                }
            }
        }

        let total_debit: Money = rows.values().map(|r| r.debit).sum();
        let total_credit: Money = rows.values().map(|r| r.credit).sum();

        Ok(Self {
            tenant_id,
            period,
            rows: rows.into_values().collect(),
            total_debit,
            total_credit,
            equilibre: total_debit == total_credit,
            unknown_accounts: unknown.into_iter().collect(),
            entry_count,
        })
    }

    pub fn row(&self, account: &AccountNumber) -> Option<&TrialBalanceRow> {
        self.rows.iter().find(|r| &r.account == account)
    }

    pub fn rows_with_activity(&self) -> impl Iterator<Item = &TrialBalanceRow> {
        self.rows.iter().filter(|r| r.has_activity())
    }

    pub fn movement_check(&self) -> BalanceCheck {
        BalanceCheck::from_totals(self.total_debit, self.total_credit)
    }

    /// Debit-side closing balances against credit-side closing balances.
    pub fn closing_check(&self) -> BalanceCheck {
        let debit: Money = self.rows.iter().map(TrialBalanceRow::closing_debit).sum();
        let credit: Money = self.rows.iter().map(TrialBalanceRow::closing_credit).sum();
        BalanceCheck::from_totals(debit, credit)
    }

    pub fn closing_balanced(&self) -> bool {
        self.closing_check().balanced
    }
}
