//! Identifier registry: the one segment that lists every live entry.
//!
//! Each cache instance keeps a mapping from identifier to entry key in a
//! well-known segment. Every rewrite is read-modify-write of the whole
//! mapping, so mutations demand a [`WriteGuard`]; concurrent writers would
//! otherwise lose each other's updates.

use serde::{Deserialize, Serialize};
use shmcache_core::{Error, ResourceKey, Result, REGISTRY_LABEL};
use shmcache_ipc::{HeldLock, SegmentStore, WriteGuard};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Identifier to entry key mapping as stored in the registry segment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryMapping {
    entries: BTreeMap<String, ResourceKey>,
}

impl RegistryMapping {
    pub fn get(&self, identifier: &str) -> Option<ResourceKey> {
        self.entries.get(identifier).copied()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ResourceKey)> {
        self.entries.iter().map(|(id, key)| (id.as_str(), *key))
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct MetadataRegistry {
    key: ResourceKey,
    segments: SegmentStore,
}

impl MetadataRegistry {
    pub fn new(key: ResourceKey, segments: SegmentStore) -> Self {
        Self { key, segments }
    }

    pub fn key(&self) -> ResourceKey {
        self.key
    }

    /// Record `identifier -> key`, replacing any previous mapping
    pub fn register(&self, _lock: &WriteGuard<'_>, identifier: &str, key: ResourceKey) -> Result<()> {
        let mut mapping = self.load()?;
        if mapping.entries.get(identifier) == Some(&key) {
            trace!(identifier, "already registered");
            return Ok(());
        }
        mapping.entries.insert(identifier.to_string(), key);
        self.store(&mapping)?;
        debug!(identifier, key = %key, entries = mapping.len(), "registered entry");
        Ok(())
    }

    /// Drop `identifier`; returns whether it was registered
    pub fn unregister(&self, _lock: &WriteGuard<'_>, identifier: &str) -> Result<bool> {
        let mut mapping = self.load()?;
        if mapping.entries.remove(identifier).is_none() {
            return Ok(false);
        }
        self.store(&mapping)?;
        debug!(identifier, entries = mapping.len(), "unregistered entry");
        Ok(true)
    }

    /// The current mapping; empty if the registry segment does not exist yet
    pub fn list(&self, _lock: &impl HeldLock) -> Result<RegistryMapping> {
        self.load()
    }

    pub fn lookup(&self, lock: &impl HeldLock, identifier: &str) -> Result<Option<ResourceKey>> {
        Ok(self.list(lock)?.get(identifier))
    }

    /// Replace the mapping with an empty one
    pub fn clear(&self, _lock: &WriteGuard<'_>) -> Result<()> {
        self.store(&RegistryMapping::default())?;
        debug!(key = %self.key, "cleared registry");
        Ok(())
    }

    /// Delete the registry segment itself
    pub fn remove_segment(&self, _lock: &WriteGuard<'_>) -> Result<bool> {
        self.segments.delete(self.key)
    }

    fn load(&self) -> Result<RegistryMapping> {
        match self.segments.read(self.key, REGISTRY_LABEL)? {
            None => Ok(RegistryMapping::default()),
            Some(bytes) => bincode::deserialize(&bytes)
                .map_err(|e| Error::corrupt(REGISTRY_LABEL, format!("undecodable mapping: {e}"))),
        }
    }

    fn store(&self, mapping: &RegistryMapping) -> Result<()> {
        let bytes = bincode::serialize(mapping)
            .map_err(|e| Error::corrupt(REGISTRY_LABEL, format!("mapping encoding failed: {e}")))?;
        self.segments.write(self.key, REGISTRY_LABEL, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shmcache_core::CacheIdentity;
    use shmcache_ipc::{LockManager, WaitPolicy};
    use std::time::Duration;

    struct Fixture {
        identity: CacheIdentity,
        lock: LockManager,
        registry: MetadataRegistry,
    }

    impl Fixture {
        fn new() -> Self {
            let identity =
                CacheIdentity::new(uuid::Uuid::new_v4().to_string(), "registry-tests").unwrap();
            let lock = LockManager::open(
                identity.lock_keys(),
                0o600,
                WaitPolicy::with_timeout(Duration::from_secs(5)),
            )
            .unwrap();
            let registry = MetadataRegistry::new(identity.registry_key(), SegmentStore::new(0o600, 1 << 20));
            Self {
                identity,
                lock,
                registry,
            }
        }

        fn teardown(self) {
            {
                let guard = self.lock.acquire_write().unwrap();
                self.registry.remove_segment(&guard).unwrap();
            }
            self.lock.remove().unwrap();
        }
    }

    #[test]
    fn test_absent_registry_lists_empty() {
        let fx = Fixture::new();
        {
            let guard = fx.lock.acquire_read().unwrap();
            assert!(fx.registry.list(&guard).unwrap().is_empty());
            assert_eq!(fx.registry.lookup(&guard, "a").unwrap(), None);
        }
        fx.teardown();
    }

    #[test]
    fn test_register_unregister_clear() {
        let fx = Fixture::new();
        {
            let guard = fx.lock.acquire_write().unwrap();
            let a = fx.identity.entry_key("a");
            let b = fx.identity.entry_key("b");
            fx.registry.register(&guard, "a", a).unwrap();
            fx.registry.register(&guard, "b", b).unwrap();
            fx.registry.register(&guard, "a", a).unwrap();

            let mapping = fx.registry.list(&guard).unwrap();
            assert_eq!(mapping.len(), 2);
            assert_eq!(mapping.get("a"), Some(a));
            assert_eq!(mapping.identifiers().collect::<Vec<_>>(), vec!["a", "b"]);

            assert!(fx.registry.unregister(&guard, "a").unwrap());
            assert!(!fx.registry.unregister(&guard, "a").unwrap());
            assert_eq!(fx.registry.lookup(&guard, "b").unwrap(), Some(b));

            fx.registry.clear(&guard).unwrap();
            assert!(fx.registry.list(&guard).unwrap().is_empty());
        }
        fx.teardown();
    }

    #[test]
    fn test_undecodable_registry_is_corrupt() {
        let fx = Fixture::new();
        {
            let guard = fx.lock.acquire_write().unwrap();
            SegmentStore::new(0o600, 1024)
                .write(fx.registry.key(), REGISTRY_LABEL, &[0xff; 3])
                .unwrap();
            let err = fx.registry.list(&guard).unwrap_err();
            assert!(err.is_corruption());
        }
        fx.teardown();
    }
}
