use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use ledgerly_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money, TenantId};
use ledgerly_events::{Command, Event, TenantScoped};

use crate::account::AccountNumber;
use crate::balance::{BalanceCheck, EntryLine, Side, check_balance};

/// Journal entry identifier (`EcritureComptable`).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JournalEntryId(pub AggregateId);

impl JournalEntryId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for JournalEntryId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Entry lifecycle: `Draft -> Validated -> Posted`, with `Cancelled`
/// reachable from draft or validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Draft,
    Validated,
    Posted,
    Cancelled,
}

impl EntryStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, EntryStatus::Posted | EntryStatus::Cancelled)
    }
}

/// Rules applied when validating an entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationPolicy {
    /// Accept entries without lines (balanced at zero/zero).
    pub allow_empty: bool,
}

/// Why validation sent an entry back to draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    Unbalanced,
    Empty,
}

/// A line as recorded at posting time: the amount is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedLine {
    pub account: AccountNumber,
    pub side: Side,
    pub amount: Money,
    #[serde(default)]
    pub label: Option<String>,
}

impl From<&EntryLine> for PostedLine {
    fn from(line: &EntryLine) -> Self {
        Self {
            account: line.account.clone(),
            side: line.side,
            amount: line.amount_or_zero(),
            label: line.label.clone(),
        }
    }
}

/// Aggregate root: JournalEntry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    id: JournalEntryId,
    tenant_id: Option<TenantId>,
    journal_code: String,
    entry_date: Option<NaiveDate>,
    reference: Option<String>,
    description: Option<String>,
    lines: Vec<EntryLine>,
    status: EntryStatus,
    posted_at: Option<DateTime<Utc>>,
    reverses: Option<JournalEntryId>,
    reversed_by: Option<JournalEntryId>,
    version: u64,
    created: bool,
}

impl JournalEntry {
    /// Empty aggregate for rehydration.
    pub fn empty(id: JournalEntryId) -> Self {
        Self {
            id,
            tenant_id: None,
            journal_code: String::new(),
            entry_date: None,
            reference: None,
            description: None,
            lines: Vec::new(),
            status: EntryStatus::Draft,
            posted_at: None,
            reverses: None,
            reversed_by: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> JournalEntryId {
        self.id
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn journal_code(&self) -> &str {
        &self.journal_code
    }

    pub fn entry_date(&self) -> Option<NaiveDate> {
        self.entry_date
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn lines(&self) -> &[EntryLine] {
        &self.lines
    }

    pub fn status(&self) -> EntryStatus {
        self.status
    }

    pub fn posted_at(&self) -> Option<DateTime<Utc>> {
        self.posted_at
    }

    /// The entry this one reverses, if it is a reversal.
    pub fn reverses(&self) -> Option<JournalEntryId> {
        self.reverses
    }

    /// The reversal that cancels this entry out, once one was recorded.
    pub fn reversed_by(&self) -> Option<JournalEntryId> {
        self.reversed_by
    }

    pub fn is_modifiable(&self) -> bool {
        matches!(self.status, EntryStatus::Draft)
    }

    /// Current debit/credit totals of the entry's lines.
    pub fn balance_check(&self) -> BalanceCheck {
        check_balance(&self.lines)
    }

    /// Lines of a reversing entry (`contrepassation`): same accounts and
    /// amounts with debit and credit swapped. Only posted entries reverse,
    /// and only once.
    pub fn reversal_lines(&self) -> Result<Vec<EntryLine>, DomainError> {
        self.ensure_reversible()?;
        Ok(self.mirrored_lines())
    }

    /// Lines for finishing the reversal already recorded as `reversal_id`.
    pub fn recorded_reversal_lines(&self, reversal_id: JournalEntryId) -> Result<Vec<EntryLine>, DomainError> {
        if self.status != EntryStatus::Posted || self.reversed_by != Some(reversal_id) {
            return Err(DomainError::invariant(format!("no pending reversal {reversal_id} on this entry")));
        }
        Ok(self.mirrored_lines())
    }

    fn mirrored_lines(&self) -> Vec<EntryLine> {
        self.lines
            .iter()
            .map(|line| EntryLine {
                account: line.account.clone(),
                side: line.side.opposite(),
                amount: Some(line.amount_or_zero()),
                label: Some(format!("Reversal of {}", self.id)),
            })
            .collect()
    }
}

impl AggregateRoot for JournalEntry {
    type Id = JournalEntryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateJournalEntry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateJournalEntry {
    pub tenant_id: TenantId,
    pub entry_id: JournalEntryId,
    pub journal_code: String,
    pub entry_date: NaiveDate,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AddLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLine {
    pub tenant_id: TenantId,
    pub entry_id: JournalEntryId,
    pub line: EntryLine,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveLine (1-based position).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLine {
    pub tenant_id: TenantId,
    pub entry_id: JournalEntryId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ValidateEntry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateEntry {
    pub tenant_id: TenantId,
    pub entry_id: JournalEntryId,
    #[serde(default)]
    pub policy: ValidationPolicy,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReopenEntry (validated back to draft).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReopenEntry {
    pub tenant_id: TenantId,
    pub entry_id: JournalEntryId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PostEntry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostEntry {
    pub tenant_id: TenantId,
    pub entry_id: JournalEntryId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkReversed. Claims a posted entry for the reversal
/// `reversed_by` before that entry is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkReversed {
    pub tenant_id: TenantId,
    pub entry_id: JournalEntryId,
    pub reversed_by: JournalEntryId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PostReversal. Creates, fills, validates and posts a reversing
/// entry in one batch, so no draft is left behind on failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostReversal {
    pub tenant_id: TenantId,
    pub entry_id: JournalEntryId,
    pub reverses: JournalEntryId,
    pub journal_code: String,
    pub entry_date: NaiveDate,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub lines: Vec<EntryLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelEntry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelEntry {
    pub tenant_id: TenantId,
    pub entry_id: JournalEntryId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalEntryCommand {
    CreateJournalEntry(CreateJournalEntry),
    AddLine(AddLine),
    RemoveLine(RemoveLine),
    ValidateEntry(ValidateEntry),
    ReopenEntry(ReopenEntry),
    PostEntry(PostEntry),
    CancelEntry(CancelEntry),
    MarkReversed(MarkReversed),
    PostReversal(PostReversal),
}

impl JournalEntryCommand {
    pub fn entry_id(&self) -> JournalEntryId {
        match self {
            JournalEntryCommand::CreateJournalEntry(c) => c.entry_id,
            JournalEntryCommand::AddLine(c) => c.entry_id,
            JournalEntryCommand::RemoveLine(c) => c.entry_id,
            JournalEntryCommand::ValidateEntry(c) => c.entry_id,
            JournalEntryCommand::ReopenEntry(c) => c.entry_id,
            JournalEntryCommand::PostEntry(c) => c.entry_id,
            JournalEntryCommand::CancelEntry(c) => c.entry_id,
            JournalEntryCommand::MarkReversed(c) => c.entry_id,
            JournalEntryCommand::PostReversal(c) => c.entry_id,
        }
    }
}

impl Command for JournalEntryCommand {
    fn target_aggregate_id(&self) -> AggregateId {
        self.entry_id().0
    }
}

/// Event: JournalEntryCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntryCreated {
    pub tenant_id: TenantId,
    pub entry_id: JournalEntryId,
    pub journal_code: String,
    pub entry_date: NaiveDate,
    pub reference: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub reverses: Option<JournalEntryId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineAdded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAdded {
    pub tenant_id: TenantId,
    pub entry_id: JournalEntryId,
    pub line_no: u32,
    pub line: EntryLine,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRemoved {
    pub tenant_id: TenantId,
    pub entry_id: JournalEntryId,
    pub line_no: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: JournalEntryValidated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntryValidated {
    pub tenant_id: TenantId,
    pub entry_id: JournalEntryId,
    pub total: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: JournalEntryRejected. The entry stays in draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntryRejected {
    pub tenant_id: TenantId,
    pub entry_id: JournalEntryId,
    pub reason: RejectionReason,
    pub total_debit: Money,
    pub total_credit: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: JournalEntryReopened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntryReopened {
    pub tenant_id: TenantId,
    pub entry_id: JournalEntryId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: JournalEntryPosted.
///
/// Self-contained so read models can roll balances up without loading the
/// entry stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntryPosted {
    pub tenant_id: TenantId,
    pub entry_id: JournalEntryId,
    pub journal_code: String,
    pub entry_date: NaiveDate,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub lines: Vec<PostedLine>,
    pub total: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: JournalEntryCancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntryCancelled {
    pub tenant_id: TenantId,
    pub entry_id: JournalEntryId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: JournalEntryReversed. Recorded on the original entry; it stays
/// posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntryReversed {
    pub tenant_id: TenantId,
    pub entry_id: JournalEntryId,
    pub reversed_by: JournalEntryId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalEntryEvent {
    JournalEntryCreated(JournalEntryCreated),
    LineAdded(LineAdded),
    LineRemoved(LineRemoved),
    JournalEntryValidated(JournalEntryValidated),
    JournalEntryRejected(JournalEntryRejected),
    JournalEntryReopened(JournalEntryReopened),
    JournalEntryPosted(JournalEntryPosted),
    JournalEntryCancelled(JournalEntryCancelled),
    JournalEntryReversed(JournalEntryReversed),
}

impl JournalEntryEvent {
    pub fn tenant_id(&self) -> TenantId {
        match self {
            JournalEntryEvent::JournalEntryCreated(e) => e.tenant_id,
            JournalEntryEvent::LineAdded(e) => e.tenant_id,
            JournalEntryEvent::LineRemoved(e) => e.tenant_id,
            JournalEntryEvent::JournalEntryValidated(e) => e.tenant_id,
            JournalEntryEvent::JournalEntryRejected(e) => e.tenant_id,
            JournalEntryEvent::JournalEntryReopened(e) => e.tenant_id,
            JournalEntryEvent::JournalEntryPosted(e) => e.tenant_id,
            JournalEntryEvent::JournalEntryCancelled(e) => e.tenant_id,
            JournalEntryEvent::JournalEntryReversed(e) => e.tenant_id,
        }
    }
}

impl TenantScoped for JournalEntryEvent {
    fn tenant_id(&self) -> TenantId {
        JournalEntryEvent::tenant_id(self)
    }
}

impl Event for JournalEntryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            JournalEntryEvent::JournalEntryCreated(_) => "accounting.journal_entry.created",
            JournalEntryEvent::LineAdded(_) => "accounting.journal_entry.line_added",
            JournalEntryEvent::LineRemoved(_) => "accounting.journal_entry.line_removed",
            JournalEntryEvent::JournalEntryValidated(_) => "accounting.journal_entry.validated",
            JournalEntryEvent::JournalEntryRejected(_) => "accounting.journal_entry.rejected",
            JournalEntryEvent::JournalEntryReopened(_) => "accounting.journal_entry.reopened",
            JournalEntryEvent::JournalEntryPosted(_) => "accounting.journal_entry.posted",
            JournalEntryEvent::JournalEntryCancelled(_) => "accounting.journal_entry.cancelled",
            JournalEntryEvent::JournalEntryReversed(_) => "accounting.journal_entry.reversed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            JournalEntryEvent::JournalEntryCreated(e) => e.occurred_at,
            JournalEntryEvent::LineAdded(e) => e.occurred_at,
            JournalEntryEvent::LineRemoved(e) => e.occurred_at,
            JournalEntryEvent::JournalEntryValidated(e) => e.occurred_at,
            JournalEntryEvent::JournalEntryRejected(e) => e.occurred_at,
            JournalEntryEvent::JournalEntryReopened(e) => e.occurred_at,
            JournalEntryEvent::JournalEntryPosted(e) => e.occurred_at,
            JournalEntryEvent::JournalEntryCancelled(e) => e.occurred_at,
            JournalEntryEvent::JournalEntryReversed(e) => e.occurred_at,
        }
    }
}

impl Aggregate for JournalEntry {
    type Command = JournalEntryCommand;
    type Event = JournalEntryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            JournalEntryEvent::JournalEntryCreated(e) => {
                self.id = e.entry_id;
                self.tenant_id = Some(e.tenant_id);
                self.journal_code = e.journal_code.clone();
                self.entry_date = Some(e.entry_date);
                self.reference = e.reference.clone();
                self.description = e.description.clone();
                self.reverses = e.reverses;
                self.lines.clear();
                self.status = EntryStatus::Draft;
                self.created = true;
            }
            JournalEntryEvent::LineAdded(e) => {
                self.lines.push(e.line.clone());
            }
            JournalEntryEvent::LineRemoved(e) => {
                let idx = e.line_no as usize;
                if idx >= 1 && idx <= self.lines.len() {
                    self.lines.remove(idx - 1);
                }
            }
            JournalEntryEvent::JournalEntryValidated(_) => {
                self.status = EntryStatus::Validated;
            }
            JournalEntryEvent::JournalEntryRejected(_) | JournalEntryEvent::JournalEntryReopened(_) => {
                self.status = EntryStatus::Draft;
            }
            JournalEntryEvent::JournalEntryPosted(e) => {
                self.status = EntryStatus::Posted;
                self.posted_at = Some(e.occurred_at);
            }
            JournalEntryEvent::JournalEntryCancelled(_) => {
                self.status = EntryStatus::Cancelled;
            }
            JournalEntryEvent::JournalEntryReversed(e) => {
                self.reversed_by = Some(e.reversed_by);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            JournalEntryCommand::CreateJournalEntry(cmd) => self.handle_create(cmd),
            JournalEntryCommand::AddLine(cmd) => self.handle_add_line(cmd),
            JournalEntryCommand::RemoveLine(cmd) => self.handle_remove_line(cmd),
            JournalEntryCommand::ValidateEntry(cmd) => self.handle_validate(cmd),
            JournalEntryCommand::ReopenEntry(cmd) => self.handle_reopen(cmd),
            JournalEntryCommand::PostEntry(cmd) => self.handle_post(cmd),
            JournalEntryCommand::CancelEntry(cmd) => self.handle_cancel(cmd),
            JournalEntryCommand::MarkReversed(cmd) => self.handle_mark_reversed(cmd),
            JournalEntryCommand::PostReversal(cmd) => self.handle_post_reversal(cmd),
        }
    }
}

impl JournalEntry {
    fn ensure_target(&self, tenant_id: TenantId, entry_id: JournalEntryId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != entry_id {
            return Err(DomainError::invariant("entry_id mismatch"));
        }
        Ok(())
    }

    fn ensure_draft(&self) -> Result<(), DomainError> {
        if !self.is_modifiable() {
            return Err(DomainError::invariant(format!(
                "entry is {:?}; only draft entries can be modified",
                self.status
            )));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateJournalEntry) -> Result<Vec<JournalEntryEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("journal entry already exists"));
        }

        let journal_code = cmd.journal_code.trim();
        if journal_code.is_empty() {
            return Err(DomainError::validation("journal code must not be empty"));
        }

        Ok(vec![JournalEntryEvent::JournalEntryCreated(JournalEntryCreated {
            tenant_id: cmd.tenant_id,
            entry_id: cmd.entry_id,
            journal_code: journal_code.to_uppercase(),
            entry_date: cmd.entry_date,
            reference: cmd.reference.clone(),
            description: cmd.description.clone(),
            reverses: None,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_line(&self, cmd: &AddLine) -> Result<Vec<JournalEntryEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.entry_id)?;
        self.ensure_draft()?;

        if cmd.line.amount.is_some_and(|a| a.is_negative()) {
            return Err(DomainError::validation("line amount must not be negative"));
        }

        let line_no = (self.lines.len() as u32) + 1;

        Ok(vec![JournalEntryEvent::LineAdded(LineAdded {
            tenant_id: cmd.tenant_id,
            entry_id: cmd.entry_id,
            line_no,
            line: cmd.line.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_line(&self, cmd: &RemoveLine) -> Result<Vec<JournalEntryEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.entry_id)?;
        self.ensure_draft()?;

        if cmd.line_no == 0 || cmd.line_no as usize > self.lines.len() {
            return Err(DomainError::validation(format!(
                "line {} does not exist (entry has {} lines)",
                cmd.line_no,
                self.lines.len()
            )));
        }

        Ok(vec![JournalEntryEvent::LineRemoved(LineRemoved {
            tenant_id: cmd.tenant_id,
            entry_id: cmd.entry_id,
            line_no: cmd.line_no,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_validate(&self, cmd: &ValidateEntry) -> Result<Vec<JournalEntryEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.entry_id)?;
        if self.status != EntryStatus::Draft {
            return Err(DomainError::invariant(format!(
                "entry is {:?}; only draft entries can be validated",
                self.status
            )));
        }

        let check = self.balance_check();

        let rejection = if self.lines.is_empty() && !cmd.policy.allow_empty {
            Some(RejectionReason::Empty)
        } else if !check.balanced {
            Some(RejectionReason::Unbalanced)
        } else {
            None
        };

        let event = match rejection {
            Some(reason) => JournalEntryEvent::JournalEntryRejected(JournalEntryRejected {
                tenant_id: cmd.tenant_id,
                entry_id: cmd.entry_id,
                reason,
                total_debit: check.total_debit,
                total_credit: check.total_credit,
                occurred_at: cmd.occurred_at,
            }),
            None => JournalEntryEvent::JournalEntryValidated(JournalEntryValidated {
                tenant_id: cmd.tenant_id,
                entry_id: cmd.entry_id,
                total: check.total_debit,
                occurred_at: cmd.occurred_at,
            }),
        };

        Ok(vec![event])
    }

    fn handle_reopen(&self, cmd: &ReopenEntry) -> Result<Vec<JournalEntryEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.entry_id)?;
        if self.status != EntryStatus::Validated {
            return Err(DomainError::invariant(format!(
                "entry is {:?}; only validated entries can be reopened",
                self.status
            )));
        }

        Ok(vec![JournalEntryEvent::JournalEntryReopened(JournalEntryReopened {
            tenant_id: cmd.tenant_id,
            entry_id: cmd.entry_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_post(&self, cmd: &PostEntry) -> Result<Vec<JournalEntryEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.entry_id)?;
        if self.status != EntryStatus::Validated {
            return Err(DomainError::invariant(format!(
                "entry is {:?}; it must be validated before posting",
                self.status
            )));
        }

        let check = self.balance_check();
        if !check.balanced {
            return Err(DomainError::unbalanced(
                check.total_debit.amount(),
                check.total_credit.amount(),
            ));
        }

        let entry_date = self
            .entry_date
            .ok_or_else(|| DomainError::invariant("entry has no date"))?;

        Ok(vec![JournalEntryEvent::JournalEntryPosted(JournalEntryPosted {
            tenant_id: cmd.tenant_id,
            entry_id: cmd.entry_id,
            journal_code: self.journal_code.clone(),
            entry_date,
            reference: self.reference.clone(),
            description: self.description.clone(),
            lines: self.lines.iter().map(PostedLine::from).collect(),
            total: check.total_debit,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn ensure_reversible(&self) -> Result<(), DomainError> {
        if self.status != EntryStatus::Posted {
            return Err(DomainError::invariant("only posted entries can be reversed"));
        }
        if let Some(reversal) = self.reversed_by {
            return Err(DomainError::conflict(format!("entry was already reversed by {reversal}")));
        }
        Ok(())
    }

    fn handle_mark_reversed(&self, cmd: &MarkReversed) -> Result<Vec<JournalEntryEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.entry_id)?;
        self.ensure_reversible()?;
        if cmd.reversed_by == cmd.entry_id {
            return Err(DomainError::validation("an entry cannot reverse itself"));
        }

        Ok(vec![JournalEntryEvent::JournalEntryReversed(JournalEntryReversed {
            tenant_id: cmd.tenant_id,
            entry_id: cmd.entry_id,
            reversed_by: cmd.reversed_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    /// Runs the regular create, add-line, validate and post handlers against
    /// a scratch copy and returns their events as one batch.
    fn handle_post_reversal(&self, cmd: &PostReversal) -> Result<Vec<JournalEntryEvent>, DomainError> {
        let mut scratch = self.clone();
        let mut events = Vec::new();
        let mut record = |scratch: &mut JournalEntry, batch: Vec<JournalEntryEvent>| {
            for event in &batch {
                scratch.apply(event);
            }
            events.extend(batch);
        };

        let mut created = scratch.handle_create(&CreateJournalEntry {
            tenant_id: cmd.tenant_id,
            entry_id: cmd.entry_id,
            journal_code: cmd.journal_code.clone(),
            entry_date: cmd.entry_date,
            reference: cmd.reference.clone(),
            description: cmd.description.clone(),
            occurred_at: cmd.occurred_at,
        })?;
        for event in &mut created {
            if let JournalEntryEvent::JournalEntryCreated(e) = event {
                e.reverses = Some(cmd.reverses);
            }
        }
        record(&mut scratch, created);

        for line in &cmd.lines {
            let added = scratch.handle_add_line(&AddLine {
                tenant_id: cmd.tenant_id,
                entry_id: cmd.entry_id,
                line: line.clone(),
                occurred_at: cmd.occurred_at,
            })?;
            record(&mut scratch, added);
        }

        let validated = scratch.handle_validate(&ValidateEntry {
            tenant_id: cmd.tenant_id,
            entry_id: cmd.entry_id,
            policy: ValidationPolicy::default(),
            occurred_at: cmd.occurred_at,
        })?;
        if let Some(JournalEntryEvent::JournalEntryRejected(rejected)) = validated.first() {
            return Err(DomainError::unbalanced(
                rejected.total_debit.amount(),
                rejected.total_credit.amount(),
            ));
        }
        record(&mut scratch, validated);

        let posted = scratch.handle_post(&PostEntry {
            tenant_id: cmd.tenant_id,
            entry_id: cmd.entry_id,
            occurred_at: cmd.occurred_at,
        })?;
        record(&mut scratch, posted);

        Ok(events)
    }

    fn handle_cancel(&self, cmd: &CancelEntry) -> Result<Vec<JournalEntryEvent>, DomainError> {
        self.ensure_target(cmd.tenant_id, cmd.entry_id)?;
        match self.status {
            EntryStatus::Posted => {
                return Err(DomainError::invariant(
                    "posted entries cannot be cancelled; post a reversal instead",
                ));
            }
            EntryStatus::Cancelled => {
                return Err(DomainError::conflict("entry is already cancelled"));
            }
            EntryStatus::Draft | EntryStatus::Validated => {}
        }

        Ok(vec![JournalEntryEvent::JournalEntryCancelled(JournalEntryCancelled {
            tenant_id: cmd.tenant_id,
            entry_id: cmd.entry_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn test_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    fn acct(n: &str) -> AccountNumber {
        AccountNumber::new(n).unwrap()
    }

    fn money(v: rust_decimal::Decimal) -> Money {
        Money::new(v)
    }

    fn run(entry: &mut JournalEntry, cmd: JournalEntryCommand) -> Result<Vec<JournalEntryEvent>, DomainError> {
        let events = entry.handle(&cmd)?;
        for e in &events {
            entry.apply(e);
        }
        Ok(events)
    }

    fn created(tenant_id: TenantId) -> JournalEntry {
        let entry_id = JournalEntryId::new(AggregateId::new());
        let mut entry = JournalEntry::empty(entry_id);
        run(
            &mut entry,
            JournalEntryCommand::CreateJournalEntry(CreateJournalEntry {
                tenant_id,
                entry_id,
                journal_code: "od".to_string(),
                entry_date: test_date(),
                reference: Some("PC-001".to_string()),
                description: Some("Supplier invoice".to_string()),
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        entry
    }

    fn add(entry: &mut JournalEntry, tenant_id: TenantId, line: EntryLine) {
        let entry_id = entry.id_typed();
        run(
            entry,
            JournalEntryCommand::AddLine(AddLine {
                tenant_id,
                entry_id,
                line,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
    }

    fn validate(entry: &mut JournalEntry, tenant_id: TenantId, policy: ValidationPolicy) -> JournalEntryEvent {
        let entry_id = entry.id_typed();
        let mut events = run(
            entry,
            JournalEntryCommand::ValidateEntry(ValidateEntry {
                tenant_id,
                entry_id,
                policy,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        events.remove(0)
    }

    fn post(entry: &mut JournalEntry, tenant_id: TenantId) -> Result<Vec<JournalEntryEvent>, DomainError> {
        let entry_id = entry.id_typed();
        run(
            entry,
            JournalEntryCommand::PostEntry(PostEntry {
                tenant_id,
                entry_id,
                occurred_at: test_time(),
            }),
        )
    }

    #[test]
    fn create_normalizes_journal_code_and_starts_in_draft() {
        let entry = created(TenantId::new());
        assert_eq!(entry.journal_code(), "OD");
        assert_eq!(entry.status(), EntryStatus::Draft);
        assert_eq!(entry.version(), 1);
        assert_eq!(entry.entry_date(), Some(test_date()));
    }

    #[test]
    fn creating_twice_is_a_conflict() {
        let tenant_id = TenantId::new();
        let entry = created(tenant_id);
        let err = entry
            .handle(&JournalEntryCommand::CreateJournalEntry(CreateJournalEntry {
                tenant_id,
                entry_id: entry.id_typed(),
                journal_code: "OD".to_string(),
                entry_date: test_date(),
                reference: None,
                description: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn balanced_entry_validates_and_posts() {
        let tenant_id = TenantId::new();
        let mut entry = created(tenant_id);
        add(&mut entry, tenant_id, EntryLine::debit(acct("607000"), money(dec!(100))));
        add(&mut entry, tenant_id, EntryLine::debit(acct("445660"), money(dec!(50))));
        add(&mut entry, tenant_id, EntryLine::credit(acct("401000"), money(dec!(150))));

        match validate(&mut entry, tenant_id, ValidationPolicy::default()) {
            JournalEntryEvent::JournalEntryValidated(e) => assert_eq!(e.total, money(dec!(150))),
            other => panic!("expected validation, got {other:?}"),
        }
        assert_eq!(entry.status(), EntryStatus::Validated);

        let events = post(&mut entry, tenant_id).unwrap();
        match &events[0] {
            JournalEntryEvent::JournalEntryPosted(e) => {
                assert_eq!(e.lines.len(), 3);
                assert_eq!(e.total, money(dec!(150)));
                assert_eq!(e.journal_code, "OD");
            }
            other => panic!("expected posting, got {other:?}"),
        }
        assert_eq!(entry.status(), EntryStatus::Posted);
        assert!(entry.posted_at().is_some());
    }

    #[test]
    fn unbalanced_entry_is_rejected_back_to_draft() {
        let tenant_id = TenantId::new();
        let mut entry = created(tenant_id);
        add(&mut entry, tenant_id, EntryLine::debit(acct("512000"), money(dec!(100))));
        add(&mut entry, tenant_id, EntryLine::credit(acct("706000"), money(dec!(90))));

        match validate(&mut entry, tenant_id, ValidationPolicy::default()) {
            JournalEntryEvent::JournalEntryRejected(e) => {
                assert_eq!(e.reason, RejectionReason::Unbalanced);
                assert_eq!(e.total_debit, money(dec!(100)));
                assert_eq!(e.total_credit, money(dec!(90)));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(entry.status(), EntryStatus::Draft);

        let err = post(&mut entry, tenant_id).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn empty_entry_is_rejected_unless_policy_allows() {
        let tenant_id = TenantId::new();
        let mut entry = created(tenant_id);

        match validate(&mut entry, tenant_id, ValidationPolicy::default()) {
            JournalEntryEvent::JournalEntryRejected(e) => assert_eq!(e.reason, RejectionReason::Empty),
            other => panic!("expected rejection, got {other:?}"),
        }

        match validate(&mut entry, tenant_id, ValidationPolicy { allow_empty: true }) {
            JournalEntryEvent::JournalEntryValidated(e) => assert_eq!(e.total, Money::ZERO),
            other => panic!("expected validation, got {other:?}"),
        }
    }

    #[test]
    fn lines_are_frozen_once_validated_until_reopened() {
        let tenant_id = TenantId::new();
        let mut entry = created(tenant_id);
        add(&mut entry, tenant_id, EntryLine::debit(acct("512000"), money(dec!(10))));
        add(&mut entry, tenant_id, EntryLine::credit(acct("706000"), money(dec!(10))));
        validate(&mut entry, tenant_id, ValidationPolicy::default());

        let entry_id = entry.id_typed();
        let add_cmd = JournalEntryCommand::AddLine(AddLine {
            tenant_id,
            entry_id,
            line: EntryLine::debit(acct("512000"), money(dec!(1))),
            occurred_at: test_time(),
        });
        assert!(matches!(entry.handle(&add_cmd), Err(DomainError::InvariantViolation(_))));

        run(
            &mut entry,
            JournalEntryCommand::ReopenEntry(ReopenEntry {
                tenant_id,
                entry_id,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(entry.status(), EntryStatus::Draft);
        assert!(entry.handle(&add_cmd).is_ok());
    }

    #[test]
    fn negative_amounts_are_refused() {
        let tenant_id = TenantId::new();
        let entry = created(tenant_id);
        let err = entry
            .handle(&JournalEntryCommand::AddLine(AddLine {
                tenant_id,
                entry_id: entry.id_typed(),
                line: EntryLine::debit(acct("512000"), money(dec!(-1))),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn remove_line_shifts_positions() {
        let tenant_id = TenantId::new();
        let mut entry = created(tenant_id);
        add(&mut entry, tenant_id, EntryLine::debit(acct("512000"), money(dec!(1))));
        add(&mut entry, tenant_id, EntryLine::debit(acct("512100"), money(dec!(2))));
        add(&mut entry, tenant_id, EntryLine::credit(acct("706000"), money(dec!(3))));

        let entry_id = entry.id_typed();
        run(
            &mut entry,
            JournalEntryCommand::RemoveLine(RemoveLine {
                tenant_id,
                entry_id,
                line_no: 1,
                occurred_at: test_time(),
            }),
        )
        .unwrap();
        assert_eq!(entry.lines().len(), 2);
        assert_eq!(entry.lines()[0].account, acct("512100"));

        let err = entry
            .handle(&JournalEntryCommand::RemoveLine(RemoveLine {
                tenant_id,
                entry_id,
                line_no: 5,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn posted_entries_cannot_be_cancelled_but_can_be_reversed() {
        let tenant_id = TenantId::new();
        let mut entry = created(tenant_id);
        add(&mut entry, tenant_id, EntryLine::debit(acct("512000"), money(dec!(75))));
        add(&mut entry, tenant_id, EntryLine::credit(acct("706000"), money(dec!(75))));
        validate(&mut entry, tenant_id, ValidationPolicy::default());
        post(&mut entry, tenant_id).unwrap();

        let err = entry
            .handle(&JournalEntryCommand::CancelEntry(CancelEntry {
                tenant_id,
                entry_id: entry.id_typed(),
                reason: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));

        let reversal = entry.reversal_lines().unwrap();
        assert_eq!(reversal[0].side, Side::Credit);
        assert_eq!(reversal[1].side, Side::Debit);
        assert!(check_balance(&reversal).balanced);
    }

    fn mark_reversed(entry: &mut JournalEntry, tenant_id: TenantId) -> Result<JournalEntryId, DomainError> {
        let entry_id = entry.id_typed();
        let reversed_by = JournalEntryId::new(AggregateId::new());
        run(
            entry,
            JournalEntryCommand::MarkReversed(MarkReversed {
                tenant_id,
                entry_id,
                reversed_by,
                occurred_at: test_time(),
            }),
        )?;
        Ok(reversed_by)
    }

    fn post_reversal(original: &JournalEntry, entry_id: JournalEntryId, lines: Vec<EntryLine>) -> PostReversal {
        PostReversal {
            tenant_id: original.tenant_id().unwrap(),
            entry_id,
            reverses: original.id_typed(),
            journal_code: original.journal_code().to_string(),
            entry_date: test_date(),
            reference: None,
            description: None,
            lines,
            occurred_at: test_time(),
        }
    }

    fn posted_entry(tenant_id: TenantId) -> JournalEntry {
        let mut entry = created(tenant_id);
        add(&mut entry, tenant_id, EntryLine::debit(acct("512000"), money(dec!(40))));
        add(&mut entry, tenant_id, EntryLine::credit(acct("706000"), money(dec!(40))));
        validate(&mut entry, tenant_id, ValidationPolicy::default());
        post(&mut entry, tenant_id).unwrap();
        entry
    }

    #[test]
    fn an_entry_is_reversed_at_most_once() {
        let tenant_id = TenantId::new();
        let mut entry = posted_entry(tenant_id);

        let reversal = mark_reversed(&mut entry, tenant_id).unwrap();
        assert_eq!(entry.reversed_by(), Some(reversal));
        assert_eq!(entry.status(), EntryStatus::Posted);

        assert!(matches!(entry.reversal_lines(), Err(DomainError::Conflict(_))));
        assert!(matches!(mark_reversed(&mut entry, tenant_id), Err(DomainError::Conflict(_))));

        assert_eq!(entry.recorded_reversal_lines(reversal).unwrap().len(), 2);
        let other = JournalEntryId::new(AggregateId::new());
        assert!(entry.recorded_reversal_lines(other).is_err());
    }

    #[test]
    fn drafts_cannot_be_marked_reversed() {
        let tenant_id = TenantId::new();
        let mut entry = created(tenant_id);
        assert!(matches!(
            mark_reversed(&mut entry, tenant_id),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn post_reversal_emits_one_posted_batch() {
        let tenant_id = TenantId::new();
        let original = posted_entry(tenant_id);
        let reversal_id = JournalEntryId::new(AggregateId::new());
        let mut reversal = JournalEntry::empty(reversal_id);

        let events = run(
            &mut reversal,
            JournalEntryCommand::PostReversal(post_reversal(
                &original,
                reversal_id,
                original.reversal_lines().unwrap(),
            )),
        )
        .unwrap();

        assert_eq!(events.len(), 5);
        assert!(matches!(events.last(), Some(JournalEntryEvent::JournalEntryPosted(_))));
        assert_eq!(reversal.status(), EntryStatus::Posted);
        assert_eq!(reversal.reverses(), Some(original.id_typed()));
        assert_eq!(reversal.journal_code(), "OD");
        assert_eq!(reversal.version(), 5);
    }

    #[test]
    fn unbalanced_reversal_produces_nothing() {
        let tenant_id = TenantId::new();
        let original = posted_entry(tenant_id);
        let reversal_id = JournalEntryId::new(AggregateId::new());
        let reversal = JournalEntry::empty(reversal_id);

        let lines = vec![EntryLine::credit(acct("512000"), money(dec!(40)))];
        let err = reversal
            .handle(&JournalEntryCommand::PostReversal(post_reversal(&original, reversal_id, lines)))
            .unwrap_err();

        assert!(matches!(err, DomainError::Unbalanced { .. }));
        assert!(!reversal.exists());
    }

    #[test]
    fn draft_entries_cancel_once() {
        let tenant_id = TenantId::new();
        let mut entry = created(tenant_id);
        let entry_id = entry.id_typed();
        let cancel = JournalEntryCommand::CancelEntry(CancelEntry {
            tenant_id,
            entry_id,
            reason: Some("duplicate".to_string()),
            occurred_at: test_time(),
        });

        run(&mut entry, cancel.clone()).unwrap();
        assert_eq!(entry.status(), EntryStatus::Cancelled);
        assert!(matches!(entry.handle(&cancel), Err(DomainError::Conflict(_))));
        assert!(entry.reversal_lines().is_err());
    }

    #[test]
    fn other_tenant_cannot_touch_entry() {
        let mut entry = created(TenantId::new());
        let err = post(&mut entry, TenantId::new()).unwrap_err();
        assert_eq!(err, DomainError::invariant("tenant mismatch"));
    }

    #[test]
    fn commands_on_missing_entry_are_not_found() {
        let entry = JournalEntry::empty(JournalEntryId::new(AggregateId::new()));
        let err = entry
            .handle(&JournalEntryCommand::PostEntry(PostEntry {
                tenant_id: TenantId::new(),
                entry_id: entry.id_typed(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    #[test]
    fn command_targets_entry_stream() {
        let entry_id = JournalEntryId::new(AggregateId::new());
        let cmd = JournalEntryCommand::PostEntry(PostEntry {
            tenant_id: TenantId::new(),
            entry_id,
            occurred_at: test_time(),
        });
        assert_eq!(cmd.target_aggregate_id(), entry_id.0);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Whatever lines were drafted, a posted entry's debits equal its credits.
        #[test]
        fn posted_entries_always_balance(
            debits in prop::collection::vec(0i64..1_000_000i64, 0..6),
            credits in prop::collection::vec(0i64..1_000_000i64, 0..6),
        ) {
            let tenant_id = TenantId::new();
            let mut entry = created(tenant_id);
            for d in &debits {
                add(&mut entry, tenant_id, EntryLine::debit(acct("512000"), Money::from_minor(*d, 2)));
            }
            for c in &credits {
                add(&mut entry, tenant_id, EntryLine::credit(acct("706000"), Money::from_minor(*c, 2)));
            }

            validate(&mut entry, tenant_id, ValidationPolicy::default());

            if let Ok(events) = post(&mut entry, tenant_id) {
                for ev in &events {
                    if let JournalEntryEvent::JournalEntryPosted(p) = ev {
                        let debit: Money = p.lines.iter().filter(|l| l.side == Side::Debit).map(|l| l.amount).sum();
                        let credit: Money = p.lines.iter().filter(|l| l.side == Side::Credit).map(|l| l.amount).sum();
                        prop_assert_eq!(debit, credit);
                        prop_assert_eq!(p.total, debit);
                    }
                }
            } else {
                prop_assert_ne!(entry.status(), EntryStatus::Posted);
            }
        }
    }
}
