use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use ledgerly_core::TenantId;

/// Tenant-isolated key/value store for read models that can be rebuilt from
/// the event store at any time.
///
/// `list` returns records in key order.
pub trait TenantStore<K, V>: Send + Sync {
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V>;
    fn upsert(&self, tenant_id: TenantId, key: K, value: V);
    /// Read-modify-write of one record under a single write lock.
    fn update(&self, tenant_id: TenantId, key: K, f: &mut dyn FnMut(Option<V>) -> V);
    fn list(&self, tenant_id: TenantId) -> Vec<V>;
    /// Drop every record of a tenant (rebuild support).
    fn clear_tenant(&self, tenant_id: TenantId);
}

impl<K, V, S> TenantStore<K, V> for Arc<S>
where
    S: TenantStore<K, V> + ?Sized,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        (**self).get(tenant_id, key)
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        (**self).upsert(tenant_id, key, value)
    }

    fn update(&self, tenant_id: TenantId, key: K, f: &mut dyn FnMut(Option<V>) -> V) {
        (**self).update(tenant_id, key, f)
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        (**self).list(tenant_id)
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        (**self).clear_tenant(tenant_id)
    }
}

/// In-memory store partitioned per tenant.
#[derive(Debug)]
pub struct InMemoryTenantStore<K, V> {
    inner: RwLock<BTreeMap<TenantId, BTreeMap<K, V>>>,
}

impl<K, V> InMemoryTenantStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryTenantStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TenantStore<K, V> for InMemoryTenantStore<K, V>
where
    K: Clone + Ord + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Option<V> {
        let map = self.inner.read().ok()?;
        map.get(&tenant_id)?.get(key).cloned()
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) {
        if let Ok(mut map) = self.inner.write() {
            map.entry(tenant_id).or_default().insert(key, value);
        }
    }

    fn update(&self, tenant_id: TenantId, key: K, f: &mut dyn FnMut(Option<V>) -> V) {
        if let Ok(mut map) = self.inner.write() {
            let records = map.entry(tenant_id).or_default();
            let next = f(records.remove(&key));
            records.insert(key, next);
        }
    }

    fn list(&self, tenant_id: TenantId) -> Vec<V> {
        let Ok(map) = self.inner.read() else {
            return vec![];
        };
        map.get(&tenant_id)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        if let Ok(mut map) = self.inner.write() {
            map.remove(&tenant_id);
        }
    }
}
