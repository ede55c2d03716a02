use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use ledgerly_accounting::{JournalEntryEvent, JournalEntryId, Period, PostedEntry};
use ledgerly_core::TenantId;
use ledgerly_events::EventEnvelope;

use super::cursor_store::{InMemoryCursorStore, ProjectionCursorStore, StreamCursors};
use super::{ProjectionError, decode_journal_event, replay_order};
use crate::read_model::TenantStore;

/// Projection: the posted journal, one record per posted entry.
///
/// Trial balances and account statements are computed from this read model.
#[derive(Debug)]
pub struct PostedEntriesProjection<S, C = InMemoryCursorStore> {
    store: S,
    cursors: StreamCursors<C>,
}

impl<S> PostedEntriesProjection<S>
where
    S: TenantStore<JournalEntryId, PostedEntry>,
{
    pub fn new(store: S) -> Self {
        Self::with_cursor_store(store, Arc::new(InMemoryCursorStore::new()))
    }
}

impl<S, C> PostedEntriesProjection<S, C>
where
    S: TenantStore<JournalEntryId, PostedEntry>,
    C: ProjectionCursorStore,
{
    pub const NAME: &'static str = "accounting.posted_entries";

    pub fn with_cursor_store(store: S, cursor_store: Arc<C>) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(cursor_store, Self::NAME),
        }
    }

    pub fn get(&self, tenant_id: TenantId, entry_id: &JournalEntryId) -> Option<PostedEntry> {
        self.store.get(tenant_id, entry_id)
    }

    /// Every posted entry of a tenant, ordered by entry date then id.
    pub fn list(&self, tenant_id: TenantId) -> Vec<PostedEntry> {
        let mut entries = self.store.list(tenant_id);
        entries.sort_by_key(|e| (e.entry_date, e.entry_id));
        entries
    }

    /// Posted entries dated inside `period`.
    pub fn in_period(&self, tenant_id: TenantId, period: Period) -> Vec<PostedEntry> {
        self.list(tenant_id)
            .into_iter()
            .filter(|e| period.contains(e.entry_date))
            .collect()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let Some(event) = decode_journal_event(envelope)? else {
            return Ok(());
        };
        if !self.cursors.should_apply(envelope)? {
            return Ok(());
        }

        if let JournalEntryEvent::JournalEntryPosted(posted) = &event {
            self.store
                .upsert(posted.tenant_id, posted.entry_id, PostedEntry::from(posted));
        }

        self.cursors.advance(envelope);
        Ok(())
    }

    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        let mut envs: Vec<_> = envelopes.into_iter().collect();

        let tenants: BTreeSet<TenantId> = envs.iter().map(|e| e.tenant_id()).collect();
        for t in tenants {
            self.store.clear_tenant(t);
            self.cursors.clear(t);
        }

        replay_order(&mut envs);
        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}
