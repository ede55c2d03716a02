//! Double-entry balance check.
//!
//! An entry balances when the sum of its debit legs equals the sum of its
//! credit legs. The check returns a value; callers decide whether an
//! unbalanced result rejects an operation.

use serde::{Deserialize, Serialize};

use ledgerly_core::Money;

use crate::account::AccountNumber;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Debit,
    Credit,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Debit => Side::Credit,
            Side::Credit => Side::Debit,
        }
    }

    /// Debit-positive signed view of `amount` on this side.
    pub fn signed(self, amount: Money) -> Money {
        match self {
            Side::Debit => amount,
            Side::Credit => -amount,
        }
    }
}

/// One leg of a journal entry (`LigneEcriture`).
///
/// `amount` is optional while an entry is being drafted; a missing amount
/// counts as zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryLine {
    pub account: AccountNumber,
    pub side: Side,
    #[serde(default)]
    pub amount: Option<Money>,
    #[serde(default)]
    pub label: Option<String>,
}

impl EntryLine {
    pub fn debit(account: AccountNumber, amount: Money) -> Self {
        Self {
            account,
            side: Side::Debit,
            amount: Some(amount),
            label: None,
        }
    }

    pub fn credit(account: AccountNumber, amount: Money) -> Self {
        Self {
            account,
            side: Side::Credit,
            amount: Some(amount),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn amount_or_zero(&self) -> Money {
        Money::from_optional(self.amount)
    }
}

/// Outcome of a balance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceCheck {
    pub total_debit: Money,
    pub total_credit: Money,
    pub balanced: bool,
}

impl BalanceCheck {
    pub fn from_totals(total_debit: Money, total_credit: Money) -> Self {
        Self {
            total_debit,
            total_credit,
            balanced: total_debit == total_credit,
        }
    }

    /// Debit minus credit; zero when balanced.
    pub fn difference(&self) -> Money {
        self.total_debit - self.total_credit
    }
}

/// Sum each side of `lines` and compare.
///
/// An empty slice is balanced at zero/zero.
pub fn check_balance<'a, I>(lines: I) -> BalanceCheck
where
    I: IntoIterator<Item = &'a EntryLine>,
{
    let mut total_debit = Money::ZERO;
    let mut total_credit = Money::ZERO;

    for line in lines {
        match line.side {
            Side::Debit => total_debit += line.amount_or_zero(),
            Side::Credit => total_credit += line.amount_or_zero(),
        }
    }

    BalanceCheck::from_totals(total_debit, total_credit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn acct(n: &str) -> AccountNumber {
        AccountNumber::new(n).unwrap()
    }

    fn money(v: rust_decimal::Decimal) -> Money {
        Money::new(v)
    }

    #[test]
    fn split_debits_against_single_credit_balance() {
        let lines = vec![
            EntryLine::debit(acct("607000"), money(dec!(100))),
            EntryLine::debit(acct("445660"), money(dec!(50))),
            EntryLine::credit(acct("401000"), money(dec!(150))),
        ];

        let check = check_balance(&lines);
        assert!(check.balanced);
        assert_eq!(check.total_debit, money(dec!(150)));
        assert_eq!(check.total_credit, money(dec!(150)));
        assert!(check.difference().is_zero());
    }

    #[test]
    fn short_credit_is_unbalanced() {
        let lines = vec![
            EntryLine::debit(acct("512000"), money(dec!(100))),
            EntryLine::credit(acct("706000"), money(dec!(90))),
        ];

        let check = check_balance(&lines);
        assert!(!check.balanced);
        assert_eq!(check.difference(), money(dec!(10)));
    }

    #[test]
    fn empty_lines_are_trivially_balanced() {
        let check = check_balance(&Vec::<EntryLine>::new());
        assert!(check.balanced);
        assert_eq!(check.total_debit, Money::ZERO);
        assert_eq!(check.total_credit, Money::ZERO);
    }

    #[test]
    fn missing_amounts_count_as_zero() {
        let lines = vec![
            EntryLine {
                account: acct("512000"),
                side: Side::Debit,
                amount: None,
                label: None,
            },
            EntryLine::credit(acct("706000"), Money::ZERO),
        ];

        let check = check_balance(&lines);
        assert!(check.balanced);
        assert_eq!(check.total_debit, Money::ZERO);
    }

    proptest! {
        #[test]
        fn mirrored_lines_always_balance(cents in prop::collection::vec(0i64..10_000_000i64, 0..20)) {
            let mut lines = Vec::new();
            for c in &cents {
                lines.push(EntryLine::debit(acct("512000"), Money::from_minor(*c, 2)));
            }
            let total: i64 = cents.iter().sum();
            lines.push(EntryLine::credit(acct("706000"), Money::from_minor(total, 2)));

            let check = check_balance(&lines);
            prop_assert!(check.balanced);
            prop_assert_eq!(check.total_debit, check.total_credit);
        }

        #[test]
        fn balanced_flag_matches_totals(
            debits in prop::collection::vec(-1_000_000i64..1_000_000i64, 0..10),
            credits in prop::collection::vec(-1_000_000i64..1_000_000i64, 0..10),
        ) {
            let lines: Vec<EntryLine> = debits
                .iter()
                .map(|d| EntryLine::debit(acct("1"), Money::from_minor(*d, 2)))
                .chain(credits.iter().map(|c| EntryLine::credit(acct("2"), Money::from_minor(*c, 2))))
                .collect();

            let check = check_balance(&lines);
            prop_assert_eq!(check.balanced, check.total_debit == check.total_credit);
        }
    }
}
