use chrono::{DateTime, Utc};

/// A recorded ledger fact (entry created, validated, posted...).
///
/// Events are immutable and append-only. `version` is the payload schema
/// revision for its `event_type`.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name, e.g. `"accounting.journal_entry.posted"`.
    fn event_type(&self) -> &'static str;

    fn version(&self) -> u32;

    /// Business time of the fact.
    fn occurred_at(&self) -> DateTime<Utc>;
}
