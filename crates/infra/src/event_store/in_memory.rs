use std::collections::BTreeMap;
use std::sync::RwLock;

use ledgerly_core::{AggregateId, ExpectedVersion, TenantId};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
struct StreamKey {
    tenant_id: TenantId,
    aggregate_id: AggregateId,
}

/// In-memory event store for tests and single-process use.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<BTreeMap<StreamKey, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }

    fn poisoned() -> EventStoreError {
        EventStoreError::Unavailable("lock poisoned".to_string())
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let Some(first) = events.first() else {
            return Ok(vec![]);
        };

        let tenant_id = first.tenant_id;
        let aggregate_id = first.aggregate_id;
        let aggregate_type = first.aggregate_type.clone();

        for (idx, e) in events.iter().enumerate() {
            if e.tenant_id != tenant_id {
                return Err(EventStoreError::TenantIsolation(format!(
                    "batch contains multiple tenant_ids (index {idx})"
                )));
            }
            if e.aggregate_id != aggregate_id {
                return Err(EventStoreError::InvalidAppend(format!(
                    "batch contains multiple aggregate_ids (index {idx})"
                )));
            }
            if e.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "batch contains multiple aggregate_types (index {idx})"
                )));
            }
        }

        let mut streams = self.streams.write().map_err(|_| Self::poisoned())?;
        let stream = streams
            .entry(StreamKey {
                tenant_id,
                aggregate_id,
            })
            .or_default();
        let current = Self::current_version(stream);

        if !expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        if let Some(existing) = stream.first() {
            if existing.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream aggregate_type is '{}', attempted append with '{}'",
                    existing.aggregate_type, aggregate_type
                )));
            }
        }

        let committed: Vec<StoredEvent> = events
            .into_iter()
            .zip(current + 1..)
            .map(|(e, sequence_number)| StoredEvent {
                event_id: e.event_id,
                tenant_id: e.tenant_id,
                aggregate_id: e.aggregate_id,
                aggregate_type: e.aggregate_type,
                sequence_number,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                payload: e.payload,
            })
            .collect();

        stream.extend(committed.iter().cloned());
        Ok(committed)
    }

    fn load_stream(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self.streams.read().map_err(|_| Self::poisoned())?;
        Ok(streams
            .get(&StreamKey {
                tenant_id,
                aggregate_id,
            })
            .cloned()
            .unwrap_or_default())
    }

    fn load_tenant(&self, tenant_id: TenantId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self.streams.read().map_err(|_| Self::poisoned())?;
        Ok(streams
            .iter()
            .filter(|(k, _)| k.tenant_id == tenant_id)
            .flat_map(|(_, stream)| stream.iter().cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn event(tenant_id: TenantId, aggregate_id: AggregateId) -> UncommittedEvent {
        UncommittedEvent {
            event_id: Uuid::now_v7(),
            tenant_id,
            aggregate_id,
            aggregate_type: "accounting.journal_entry".to_string(),
            event_type: "accounting.journal_entry.created".to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: json!({}),
        }
    }

    #[test]
    fn append_assigns_consecutive_sequence_numbers() {
        let store = InMemoryEventStore::new();
        let (t, a) = (TenantId::new(), AggregateId::new());

        let first = store
            .append(vec![event(t, a), event(t, a)], ExpectedVersion::Exact(0))
            .unwrap();
        assert_eq!(first.iter().map(|e| e.sequence_number).collect::<Vec<_>>(), vec![1, 2]);

        let next = store.append(vec![event(t, a)], ExpectedVersion::Exact(2)).unwrap();
        assert_eq!(next[0].sequence_number, 3);
        assert_eq!(store.load_stream(t, a).unwrap().len(), 3);
    }

    #[test]
    fn stale_expected_version_is_rejected() {
        let store = InMemoryEventStore::new();
        let (t, a) = (TenantId::new(), AggregateId::new());
        store.append(vec![event(t, a)], ExpectedVersion::Exact(0)).unwrap();

        let err = store.append(vec![event(t, a)], ExpectedVersion::Exact(0)).unwrap_err();
        assert!(matches!(err, EventStoreError::Concurrency(_)));
    }

    #[test]
    fn mixed_tenant_batch_is_rejected() {
        let store = InMemoryEventStore::new();
        let a = AggregateId::new();
        let err = store
            .append(vec![event(TenantId::new(), a), event(TenantId::new(), a)], ExpectedVersion::Any)
            .unwrap_err();
        assert!(matches!(err, EventStoreError::TenantIsolation(_)));
    }

    #[test]
    fn streams_are_tenant_scoped() {
        let store = InMemoryEventStore::new();
        let (t1, t2, a) = (TenantId::new(), TenantId::new(), AggregateId::new());
        store.append(vec![event(t1, a)], ExpectedVersion::Any).unwrap();

        assert!(store.load_stream(t2, a).unwrap().is_empty());
        assert_eq!(store.load_tenant(t1).unwrap().len(), 1);
        assert!(store.load_tenant(t2).unwrap().is_empty());
    }
}
