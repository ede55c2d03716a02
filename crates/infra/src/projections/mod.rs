//! Read model builders fed by committed journal entry events.
//!
//! Projections are rebuildable from the event store, partitioned by tenant,
//! and idempotent under at-least-once delivery (see [`cursor_store`]).

pub mod account_balances;
pub mod cursor_store;
pub mod posted_entries;

use serde_json::Value as JsonValue;
use thiserror::Error;

use ledgerly_accounting::{JOURNAL_ENTRY_AGGREGATE, JournalEntryEvent};
use ledgerly_events::{EventEnvelope, TenantScoped};

pub use account_balances::{AccountBalance, AccountBalancesProjection};
pub use cursor_store::{InMemoryCursorStore, ProjectionCursorStore, StreamCursors};
pub use posted_entries::PostedEntriesProjection;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize journal entry event: {0}")]
    Deserialize(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Decode a journal entry envelope. Envelopes of other aggregate types yield
/// `None`.
pub(crate) fn decode_journal_event(
    envelope: &EventEnvelope<JsonValue>,
) -> Result<Option<JournalEntryEvent>, ProjectionError> {
    if envelope.aggregate_type() != JOURNAL_ENTRY_AGGREGATE {
        return Ok(None);
    }

    let ev: JournalEntryEvent = serde_json::from_value(envelope.payload().clone())
        .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

    ensure_same_tenant(envelope, &ev)?;
    Ok(Some(ev))
}

fn ensure_same_tenant<M: TenantScoped>(
    envelope: &EventEnvelope<JsonValue>,
    payload: &M,
) -> Result<(), ProjectionError> {
    if TenantScoped::tenant_id(envelope) != payload.tenant_id() {
        return Err(ProjectionError::TenantIsolation(
            "event tenant_id does not match envelope tenant_id".to_string(),
        ));
    }
    Ok(())
}

/// Order envelopes by stream then sequence number for replay.
pub(crate) fn replay_order(envelopes: &mut [EventEnvelope<JsonValue>]) {
    envelopes.sort_by_key(|e| (e.tenant_id(), e.aggregate_id(), e.sequence_number()));
}
