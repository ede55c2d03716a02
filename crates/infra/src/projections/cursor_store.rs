//! Projection cursors.
//!
//! A cursor is the last sequence number a projection applied for one
//! `(tenant, aggregate)` stream. Envelopes at or below the cursor are
//! replays and are skipped, which keeps projections idempotent under
//! at-least-once delivery. Clearing a tenant's cursors is the first step of a
//! rebuild.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value as JsonValue;

use ledgerly_core::{AggregateId, TenantId};
use ledgerly_events::EventEnvelope;

use super::ProjectionError;

pub trait ProjectionCursorStore: Send + Sync {
    fn get_cursor(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        projection_name: &str,
    ) -> Option<u64>;

    fn update_cursor(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        projection_name: &str,
        sequence_number: u64,
    );

    /// Forget every cursor of `projection_name` for a tenant.
    fn clear_cursors(&self, tenant_id: TenantId, projection_name: &str);
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CursorKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    projection_name: String,
}

/// Process-local cursor store.
#[derive(Debug, Default)]
pub struct InMemoryCursorStore {
    cursors: RwLock<HashMap<CursorKey, u64>>,
}

impl InMemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProjectionCursorStore for InMemoryCursorStore {
    fn get_cursor(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        projection_name: &str,
    ) -> Option<u64> {
        let cursors = self.cursors.read().ok()?;
        cursors
            .get(&CursorKey {
                tenant_id,
                aggregate_id,
                projection_name: projection_name.to_string(),
            })
            .copied()
    }

    fn update_cursor(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        projection_name: &str,
        sequence_number: u64,
    ) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.insert(
                CursorKey {
                    tenant_id,
                    aggregate_id,
                    projection_name: projection_name.to_string(),
                },
                sequence_number,
            );
        }
    }

    fn clear_cursors(&self, tenant_id: TenantId, projection_name: &str) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.retain(|k, _| !(k.tenant_id == tenant_id && k.projection_name == projection_name));
        }
    }
}

/// A projection's view of the cursor store, bound to its name.
#[derive(Debug)]
pub struct StreamCursors<C> {
    store: Arc<C>,
    projection_name: String,
}

impl<C> StreamCursors<C>
where
    C: ProjectionCursorStore,
{
    pub fn new(store: Arc<C>, projection_name: impl Into<String>) -> Self {
        Self {
            store,
            projection_name: projection_name.into(),
        }
    }

    pub fn projection_name(&self) -> &str {
        &self.projection_name
    }

    pub fn last(&self, tenant_id: TenantId, aggregate_id: AggregateId) -> u64 {
        self.store
            .get_cursor(tenant_id, aggregate_id, &self.projection_name)
            .unwrap_or(0)
    }

    /// `Ok(true)` when the envelope is next in its stream, `Ok(false)` when it
    /// was already applied.
    ///
    /// A projection may start mid-stream, so the first envelope seen for a
    /// stream is accepted at any positive sequence number; after that each
    /// envelope must be exactly one past the cursor.
    pub fn should_apply(&self, envelope: &EventEnvelope<JsonValue>) -> Result<bool, ProjectionError> {
        let seq = envelope.sequence_number();
        let last = self.last(envelope.tenant_id(), envelope.aggregate_id());

        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            return Ok(false);
        }
        if last != 0 && seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        Ok(true)
    }

    pub fn advance(&self, envelope: &EventEnvelope<JsonValue>) {
        self.store.update_cursor(
            envelope.tenant_id(),
            envelope.aggregate_id(),
            &self.projection_name,
            envelope.sequence_number(),
        );
    }

    pub fn clear(&self, tenant_id: TenantId) {
        self.store.clear_cursors(tenant_id, &self.projection_name);
    }
}
