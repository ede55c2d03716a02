//! Accounting module: chart of accounts, double-entry journal entries and
//! trial balances.
//!
//! Pure domain logic only: no IO, no persistence concerns.

pub mod account;
pub mod balance;
pub mod chart;
pub mod journal;
pub mod statement;
pub mod trial_balance;

pub use account::{Account, AccountClass, AccountKind, AccountNumber};
pub use balance::{BalanceCheck, EntryLine, Side, check_balance};
pub use chart::ChartOfAccounts;
pub use journal::{
    AddLine, CancelEntry, CreateJournalEntry, EntryStatus, JournalEntry, JournalEntryCancelled,
    JournalEntryCommand, JournalEntryCreated, JournalEntryEvent, JournalEntryId,
    JournalEntryPosted, JournalEntryRejected, JournalEntryReopened, JournalEntryReversed,
    JournalEntryValidated, LineAdded, LineRemoved, MarkReversed, PostEntry, PostReversal,
    PostedLine, RejectionReason, RemoveLine, ReopenEntry, ValidateEntry, ValidationPolicy,
};
pub use statement::{AccountStatement, StatementLine};
pub use trial_balance::{Period, PostedEntry, TrialBalance, TrialBalanceRow};

/// Aggregate type name of journal entry streams.
pub const JOURNAL_ENTRY_AGGREGATE: &str = "accounting.journal_entry";
