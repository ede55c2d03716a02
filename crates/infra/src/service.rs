//! Ledger application service.
//!
//! Owns the per-tenant charts of accounts, runs journal entry commands
//! through the [`CommandDispatcher`], and feeds every committed event to the
//! read models before returning, so queries observe a command's effects as
//! soon as it succeeds.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{NaiveDate, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::instrument;

use ledgerly_accounting::{
    Account, AccountNumber, AccountStatement, AddLine, BalanceCheck, CancelEntry, ChartOfAccounts,
    CreateJournalEntry, EntryLine, EntryStatus, JOURNAL_ENTRY_AGGREGATE, JournalEntry,
    JournalEntryCommand, JournalEntryEvent, JournalEntryId, MarkReversed, Period, PostEntry,
    PostReversal, PostedEntry, RejectionReason, RemoveLine, ReopenEntry, TrialBalance, ValidateEntry,
};
use ledgerly_core::{AggregateId, DomainError, Money, TenantId};
use ledgerly_events::{EventBus, EventEnvelope, InMemoryEventBus};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::config::LedgerConfig;
use crate::event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent};
use crate::projections::{AccountBalance, AccountBalancesProjection, PostedEntriesProjection, ProjectionError};
use crate::read_model::InMemoryTenantStore;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] EventStoreError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error("account {0} is not in the chart of accounts")]
    UnknownAccount(AccountNumber),

    #[error("ledger state lock poisoned")]
    Poisoned,
}

/// Result of validating an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub check: BalanceCheck,
    /// `Validated` when accepted, `Draft` when sent back.
    pub status: EntryStatus,
    pub rejection: Option<RejectionReason>,
}

impl ValidationOutcome {
    pub fn is_validated(&self) -> bool {
        self.status == EntryStatus::Validated
    }
}

/// Fields of a new journal entry header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub journal_code: String,
    pub entry_date: NaiveDate,
    pub reference: Option<String>,
    pub description: Option<String>,
}

impl NewEntry {
    pub fn new(journal_code: impl Into<String>, entry_date: NaiveDate) -> Self {
        Self {
            journal_code: journal_code.into(),
            entry_date,
            reference: None,
            description: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

type BalancesStore = InMemoryTenantStore<AccountNumber, AccountBalance>;
type PostedStore = InMemoryTenantStore<JournalEntryId, PostedEntry>;

/// Service wired to the in-memory store and bus.
pub type InMemoryLedgerService =
    LedgerService<Arc<InMemoryEventStore>, Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>>;

pub struct LedgerService<S, B> {
    dispatcher: CommandDispatcher<S, B>,
    charts: RwLock<HashMap<TenantId, ChartOfAccounts>>,
    balances: AccountBalancesProjection<BalancesStore>,
    posted: PostedEntriesProjection<PostedStore>,
    /// Serialises read model updates across callers.
    projection_lock: Mutex<()>,
    config: LedgerConfig,
}

impl InMemoryLedgerService {
    pub fn in_memory(config: LedgerConfig) -> Self {
        Self::new(
            Arc::new(InMemoryEventStore::new()),
            Arc::new(InMemoryEventBus::new()),
            config,
        )
    }
}

impl<S, B> LedgerService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(store: S, bus: B, config: LedgerConfig) -> Self {
        Self {
            dispatcher: CommandDispatcher::new(store, bus),
            charts: RwLock::new(HashMap::new()),
            balances: AccountBalancesProjection::new(InMemoryTenantStore::new()),
            posted: PostedEntriesProjection::new(InMemoryTenantStore::new()),
            projection_lock: Mutex::new(()),
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &CommandDispatcher<S, B> {
        &self.dispatcher
    }

    // ---- chart of accounts ----

    #[instrument(skip(self, account), fields(tenant_id = %tenant_id, account = %account.number), err)]
    pub fn open_account(&self, tenant_id: TenantId, mut account: Account) -> Result<(), ServiceError> {
        account.opening_balance = account.opening_balance.round_dp(self.config.amount_scale);
        let mut charts = self.charts.write().map_err(|_| ServiceError::Poisoned)?;
        charts
            .entry(tenant_id)
            .or_insert_with(|| ChartOfAccounts::new(tenant_id))
            .open_account(account)?;
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    pub fn set_opening_balance(
        &self,
        tenant_id: TenantId,
        account: &AccountNumber,
        opening: Money,
    ) -> Result<(), ServiceError> {
        let mut charts = self.charts.write().map_err(|_| ServiceError::Poisoned)?;
        let chart = charts
            .get_mut(&tenant_id)
            .ok_or_else(|| ServiceError::UnknownAccount(account.clone()))?;
        if !chart.contains(account) {
            return Err(ServiceError::UnknownAccount(account.clone()));
        }
        chart.set_opening_balance(account, opening.round_dp(self.config.amount_scale))?;
        Ok(())
    }

    /// Snapshot of a tenant's chart; empty if no account was opened yet.
    pub fn chart(&self, tenant_id: TenantId) -> Result<ChartOfAccounts, ServiceError> {
        let charts = self.charts.read().map_err(|_| ServiceError::Poisoned)?;
        Ok(charts
            .get(&tenant_id)
            .cloned()
            .unwrap_or_else(|| ChartOfAccounts::new(tenant_id)))
    }

    fn ensure_account(&self, tenant_id: TenantId, account: &AccountNumber) -> Result<(), ServiceError> {
        let charts = self.charts.read().map_err(|_| ServiceError::Poisoned)?;
        match charts.get(&tenant_id) {
            Some(chart) if chart.contains(account) => Ok(()),
            _ => Err(ServiceError::UnknownAccount(account.clone())),
        }
    }

    // ---- journal entry lifecycle ----

    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    pub fn create_entry(&self, tenant_id: TenantId, header: NewEntry) -> Result<JournalEntryId, ServiceError> {
        let entry_id = JournalEntryId::new(AggregateId::new());
        self.execute(
            tenant_id,
            entry_id,
            JournalEntryCommand::CreateJournalEntry(CreateJournalEntry {
                tenant_id,
                entry_id,
                journal_code: header.journal_code,
                entry_date: header.entry_date,
                reference: header.reference,
                description: header.description,
                occurred_at: Utc::now(),
            }),
        )?;
        tracing::info!(entry_id = %entry_id, "journal entry created");
        Ok(entry_id)
    }

    /// Append a line to a draft entry. The account must be in the tenant's
    /// chart; the amount is rounded to the configured scale.
    #[instrument(skip(self, line), fields(tenant_id = %tenant_id, entry_id = %entry_id, account = %line.account), err)]
    pub fn add_line(&self, tenant_id: TenantId, entry_id: JournalEntryId, mut line: EntryLine) -> Result<(), ServiceError> {
        self.ensure_account(tenant_id, &line.account)?;
        line.amount = line.amount.map(|a| a.round_dp(self.config.amount_scale));

        self.execute(
            tenant_id,
            entry_id,
            JournalEntryCommand::AddLine(AddLine {
                tenant_id,
                entry_id,
                line,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, entry_id = %entry_id), err)]
    pub fn remove_line(&self, tenant_id: TenantId, entry_id: JournalEntryId, line_no: u32) -> Result<(), ServiceError> {
        self.execute(
            tenant_id,
            entry_id,
            JournalEntryCommand::RemoveLine(RemoveLine {
                tenant_id,
                entry_id,
                line_no,
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(())
    }

    /// Run the balance check. A failing check is not an error: the entry
    /// returns to draft and the outcome carries the reason.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, entry_id = %entry_id), err)]
    pub fn validate_entry(&self, tenant_id: TenantId, entry_id: JournalEntryId) -> Result<ValidationOutcome, ServiceError> {
        let committed = self.execute(
            tenant_id,
            entry_id,
            JournalEntryCommand::ValidateEntry(ValidateEntry {
                tenant_id,
                entry_id,
                policy: self.config.validation_policy(),
                occurred_at: Utc::now(),
            }),
        )?;

        let mut outcome = None;
        for stored in &committed {
            let event: JournalEntryEvent = serde_json::from_value(stored.payload.clone())
                .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
            match event {
                JournalEntryEvent::JournalEntryValidated(e) => {
                    tracing::info!(total = %e.total, "journal entry validated");
                    outcome = Some(ValidationOutcome {
                        check: BalanceCheck::from_totals(e.total, e.total),
                        status: EntryStatus::Validated,
                        rejection: None,
                    });
                }
                JournalEntryEvent::JournalEntryRejected(e) => {
                    tracing::warn!(
                        reason = ?e.reason,
                        total_debit = %e.total_debit,
                        total_credit = %e.total_credit,
                        "journal entry rejected; returned to draft"
                    );
                    outcome = Some(ValidationOutcome {
                        check: BalanceCheck::from_totals(e.total_debit, e.total_credit),
                        status: EntryStatus::Draft,
                        rejection: Some(e.reason),
                    });
                }
                _ => {}
            }
        }

        outcome.ok_or_else(|| {
            ServiceError::Domain(DomainError::invariant("validation produced no outcome"))
        })
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, entry_id = %entry_id), err)]
    pub fn reopen_entry(&self, tenant_id: TenantId, entry_id: JournalEntryId) -> Result<(), ServiceError> {
        self.execute(
            tenant_id,
            entry_id,
            JournalEntryCommand::ReopenEntry(ReopenEntry {
                tenant_id,
                entry_id,
                occurred_at: Utc::now(),
            }),
        )?;
        tracing::info!("journal entry reopened");
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, entry_id = %entry_id), err)]
    pub fn post_entry(&self, tenant_id: TenantId, entry_id: JournalEntryId) -> Result<(), ServiceError> {
        self.execute(
            tenant_id,
            entry_id,
            JournalEntryCommand::PostEntry(PostEntry {
                tenant_id,
                entry_id,
                occurred_at: Utc::now(),
            }),
        )?;
        tracing::info!("journal entry posted");
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, entry_id = %entry_id), err)]
    pub fn cancel_entry(
        &self,
        tenant_id: TenantId,
        entry_id: JournalEntryId,
        reason: Option<String>,
    ) -> Result<(), ServiceError> {
        self.execute(
            tenant_id,
            entry_id,
            JournalEntryCommand::CancelEntry(CancelEntry {
                tenant_id,
                entry_id,
                reason,
                occurred_at: Utc::now(),
            }),
        )?;
        tracing::info!("journal entry cancelled");
        Ok(())
    }

    /// Post a new entry dated `reversal_date` that mirrors a posted entry
    /// with debit and credit swapped. Returns the new entry's id.
    ///
    /// The original is marked with the reversal's id before the mirror is
    /// written, so a second reversal is a conflict. If writing the mirror
    /// fails, calling again finishes the recorded reversal.
    #[instrument(skip(self), fields(tenant_id = %tenant_id, entry_id = %entry_id), err)]
    pub fn reverse_entry(
        &self,
        tenant_id: TenantId,
        entry_id: JournalEntryId,
        reversal_date: NaiveDate,
    ) -> Result<JournalEntryId, ServiceError> {
        let original = self.entry(tenant_id, entry_id)?;

        let (reversal_id, lines) = match original.reversed_by() {
            Some(recorded) if !self.load_entry(tenant_id, recorded)?.exists() => {
                tracing::warn!(reversal_id = %recorded, "finishing a recorded reversal that was never posted");
                (recorded, original.recorded_reversal_lines(recorded)?)
            }
            _ => {
                let lines = original.reversal_lines()?;
                let reversal_id = JournalEntryId::new(AggregateId::new());
                self.execute(
                    tenant_id,
                    entry_id,
                    JournalEntryCommand::MarkReversed(MarkReversed {
                        tenant_id,
                        entry_id,
                        reversed_by: reversal_id,
                        occurred_at: Utc::now(),
                    }),
                )?;
                (reversal_id, lines)
            }
        };

        self.execute(
            tenant_id,
            reversal_id,
            JournalEntryCommand::PostReversal(PostReversal {
                tenant_id,
                entry_id: reversal_id,
                reverses: entry_id,
                journal_code: original.journal_code().to_string(),
                entry_date: reversal_date,
                reference: original.reference().map(str::to_string),
                description: Some(format!("Reversal of {entry_id}")),
                lines,
                occurred_at: Utc::now(),
            }),
        )?;

        tracing::info!(reversal_id = %reversal_id, "journal entry reversed");
        Ok(reversal_id)
    }

    // ---- queries ----

    /// Current state of an entry, rebuilt from its stream.
    pub fn entry(&self, tenant_id: TenantId, entry_id: JournalEntryId) -> Result<JournalEntry, ServiceError> {
        let entry = self.load_entry(tenant_id, entry_id)?;
        if !entry.exists() {
            return Err(DomainError::NotFound.into());
        }
        Ok(entry)
    }

    fn load_entry(&self, tenant_id: TenantId, entry_id: JournalEntryId) -> Result<JournalEntry, ServiceError> {
        Ok(self
            .dispatcher
            .load(tenant_id, entry_id.0, |_, id| JournalEntry::empty(JournalEntryId::new(id)))?)
    }

    /// Trial balance (`balance comptable`) of posted entries for `period`.
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    pub fn trial_balance(&self, tenant_id: TenantId, period: Period) -> Result<TrialBalance, ServiceError> {
        let chart = self.chart(tenant_id)?;
        let entries = self.posted.list(tenant_id);
        let tb = TrialBalance::compute(&chart, period, &entries)?;

        if !tb.equilibre {
            tracing::warn!(
                total_debit = %tb.total_debit,
                total_credit = %tb.total_credit,
                "trial balance is not balanced"
            );
        }
        if !tb.unknown_accounts.is_empty() {
            tracing::warn!(count = tb.unknown_accounts.len(), "posted lines reference accounts missing from the chart");
        }
        Ok(tb)
    }

    pub fn account_balance(&self, tenant_id: TenantId, account: &AccountNumber) -> Option<AccountBalance> {
        self.balances.get(tenant_id, account)
    }

    pub fn account_balances(&self, tenant_id: TenantId) -> Vec<AccountBalance> {
        self.balances.list(tenant_id)
    }

    pub fn account_statement(
        &self,
        tenant_id: TenantId,
        account: &AccountNumber,
        period: Period,
    ) -> Result<AccountStatement, ServiceError> {
        self.ensure_account(tenant_id, account)?;
        let chart = self.chart(tenant_id)?;
        let entries = self.posted.list(tenant_id);
        Ok(AccountStatement::compute(&chart, account, period, &entries)?)
    }

    pub fn posted_entries(&self, tenant_id: TenantId, period: Period) -> Vec<PostedEntry> {
        self.posted.in_period(tenant_id, period)
    }

    /// Rebuild a tenant's read models from the event store.
    #[instrument(skip(self), fields(tenant_id = %tenant_id), err)]
    pub fn rebuild_projections(&self, tenant_id: TenantId) -> Result<usize, ServiceError> {
        let _guard = self.projection_lock.lock().map_err(|_| ServiceError::Poisoned)?;
        self.rebuild_locked(tenant_id)
    }

    fn rebuild_locked(&self, tenant_id: TenantId) -> Result<usize, ServiceError> {
        let envelopes: Vec<EventEnvelope<JsonValue>> = self
            .dispatcher
            .store()
            .load_tenant(tenant_id)?
            .iter()
            .map(StoredEvent::to_envelope)
            .collect();
        let count = envelopes.len();

        self.balances.rebuild_from_scratch(envelopes.clone())?;
        self.posted.rebuild_from_scratch(envelopes)?;

        tracing::info!(events = count, "projections rebuilt");
        Ok(count)
    }

    fn execute(
        &self,
        tenant_id: TenantId,
        entry_id: JournalEntryId,
        command: JournalEntryCommand,
    ) -> Result<Vec<StoredEvent>, ServiceError> {
        let committed = self.dispatcher.dispatch(
            tenant_id,
            entry_id.0,
            JOURNAL_ENTRY_AGGREGATE,
            command,
            |_, id| JournalEntry::empty(JournalEntryId::new(id)),
        )?;

        if !committed.is_empty() {
            self.catch_up(tenant_id, entry_id);
        }
        Ok(committed)
    }

    /// Apply the entry's stream to both read models. Whichever caller gets
    /// the lock first applies everything committed so far, in stream order.
    ///
    /// The command is already committed here, so a failure only rebuilds the
    /// tenant's read models and is logged, never returned.
    fn catch_up(&self, tenant_id: TenantId, entry_id: JournalEntryId) {
        let Ok(_guard) = self.projection_lock.lock() else {
            tracing::error!(entry_id = %entry_id, "projection lock poisoned; read models not updated");
            return;
        };

        let applied = self.apply_stream(tenant_id, entry_id).or_else(|error| {
            tracing::error!(entry_id = %entry_id, error = %error, "projection update failed; rebuilding tenant");
            self.rebuild_locked(tenant_id).map(|_| ())
        });
        if let Err(error) = applied {
            tracing::error!(error = %error, "read models stale until rebuild_projections succeeds");
        }
    }

    fn apply_stream(&self, tenant_id: TenantId, entry_id: JournalEntryId) -> Result<(), ServiceError> {
        for stored in self.dispatcher.store().load_stream(tenant_id, entry_id.0)? {
            let envelope = stored.to_envelope();
            self.balances.apply_envelope(&envelope)?;
            self.posted.apply_envelope(&envelope)?;
        }
        Ok(())
    }
}
