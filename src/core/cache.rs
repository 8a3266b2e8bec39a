//! # Service catalog cache.
//!
//! Process-lifetime map from peripheral to its last discovered [`ServiceCatalog`].
//! Shared by clones, safe for concurrent readers and writers. No eviction.

use std::sync::Arc;

use dashmap::DashMap;

use crate::driver::{PeripheralId, ServiceCatalog};

/// Concurrent peripheral → catalog map.
#[derive(Clone, Default)]
pub struct DiscoveryCache {
    entries: Arc<DashMap<PeripheralId, ServiceCatalog>>,
}

impl DiscoveryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached catalog, if any.
    pub fn fetch(&self, id: PeripheralId) -> Option<ServiceCatalog> {
        self.entries.get(&id).map(|e| Arc::clone(e.value()))
    }

    /// Stores a catalog, replacing any previous entry as a whole.
    ///
    /// Returns the replaced catalog.
    pub fn store(
        &self,
        id: PeripheralId,
        catalog: impl Into<ServiceCatalog>,
    ) -> Option<ServiceCatalog> {
        self.entries.insert(id, catalog.into())
    }

    /// Returns `true` if a catalog is cached for `id`.
    pub fn contains(&self, id: PeripheralId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of cached peripherals.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for DiscoveryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryCache").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::ServiceDescriptor;
    use uuid::Uuid;

    #[test]
    fn store_then_fetch() {
        let cache = DiscoveryCache::new();
        let id = PeripheralId::new_v4();
        assert!(cache.fetch(id).is_none());
        assert!(cache.is_empty());

        let svc = ServiceDescriptor::primary(Uuid::new_v4());
        cache.store(id, vec![svc]);
        assert_eq!(cache.fetch(id).as_deref(), Some(&[svc][..]));
        assert_eq!(cache.len(), 1);
        assert!(!cache.is_empty());
    }

    #[test]
    fn store_replaces_whole_entry() {
        let cache = DiscoveryCache::new();
        let id = PeripheralId::new_v4();
        let a = ServiceDescriptor::primary(Uuid::new_v4());
        let b = ServiceDescriptor::primary(Uuid::new_v4());

        cache.store(id, vec![a, b]);
        let prev = cache.store(id, vec![b]);
        assert_eq!(prev.map(|c| c.len()), Some(2));
        assert_eq!(cache.fetch(id).as_deref(), Some(&[b][..]));
    }

    #[test]
    fn clones_share_entries() {
        let cache = DiscoveryCache::new();
        let other = cache.clone();
        let id = PeripheralId::new_v4();
        other.store(id, Vec::new());
        assert!(cache.contains(id));
        assert_eq!(cache.fetch(id).map(|c| c.len()), Some(0));
    }
}
