//! The shared memory backend: lock protocol, registry and segments combined.
//!
//! Every data operation runs inside one lock hold. Reads take the shared
//! mode, anything that rewrites a segment or the registry takes the exclusive
//! mode. The registry decides presence; a segment that exists without a
//! registry entry is invisible to `get` and `has`.

use crate::config::ShmCacheConfig;
use crate::registry::{MetadataRegistry, RegistryMapping};
use crate::statistics::{CacheStatistics, StatsCounters};
use crate::traits::CacheBackend;
use shmcache_core::{CacheIdentity, Error, ResourceKey, Result, REGISTRY_LABEL};
use shmcache_ipc::{LockManager, LockState, ReadGuard, ReleaseOutcome, SegmentStore, WriteGuard};
use shmcache_utils::tracing::cache_span;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// A bound handle on one cache instance
#[derive(Debug)]
pub struct SharedMemoryBackend {
    config: ShmCacheConfig,
    identity: CacheIdentity,
    lock: LockManager,
    segments: SegmentStore,
    registry: MetadataRegistry,
    stats: StatsCounters,
}

impl SharedMemoryBackend {
    /// Derive the keys for `config` and open (or create) the lock semaphores.
    ///
    /// No segment is created until the first write.
    pub fn bind(config: ShmCacheConfig) -> Result<Self> {
        config.validate()?;
        let identity = config.identity()?;
        let lock = LockManager::open(identity.lock_keys(), config.permissions, config.wait_policy())?;
        let segments = SegmentStore::new(config.permissions, config.max_payload_size);
        let registry = MetadataRegistry::new(identity.registry_key(), segments.clone());

        info!(
            cache = %identity,
            registry = %registry.key(),
            payload_limit = segments.payload_limit(),
            "bound shared memory cache"
        );

        Ok(Self {
            config,
            identity,
            lock,
            segments,
            registry,
            stats: StatsCounters::default(),
        })
    }

    pub fn config(&self) -> &ShmCacheConfig {
        &self.config
    }

    pub fn identity(&self) -> &CacheIdentity {
        &self.identity
    }

    /// Largest payload `set` accepts
    pub fn payload_limit(&self) -> usize {
        self.segments.payload_limit()
    }

    /// The segment key `identifier` is stored under
    pub fn entry_key(&self, identifier: &str) -> Result<ResourceKey> {
        let key = self.identity.entry_key(identifier);
        if key == self.registry.key() {
            return Err(Error::KeyCollision {
                identifier: identifier.to_string(),
                key: key.get(),
                occupant: REGISTRY_LABEL.to_string(),
            });
        }
        Ok(key)
    }

    /// Every registered identifier, in sorted order
    pub fn identifiers(&self) -> Result<Vec<String>> {
        let _span = cache_span("identifiers", self.identity.namespace()).entered();
        self.with_read(|guard| {
            let mapping = self.registry.list(guard)?;
            Ok(mapping.identifiers().map(str::to_string).collect())
        })
    }

    /// Current semaphore values, read without taking the lock
    pub fn lock_state(&self) -> Result<LockState> {
        self.lock.snapshot()
    }

    /// Force the lock back to its idle state.
    ///
    /// Only safe when no process is inside the cache, e.g. after a holder
    /// crashed and waits report [`Error::StaleLock`].
    pub fn reset_locks(&self) -> Result<()> {
        self.lock.reset()
    }

    /// Remove every entry, the registry segment and both semaphore sets.
    ///
    /// Other processes still bound to this cache will fail on their next
    /// operation and must bind again.
    pub fn destroy(self) -> Result<()> {
        let _span = cache_span("destroy", self.identity.namespace()).entered();
        self.with_write(|guard| {
            self.flush_locked(guard)?;
            self.registry.remove_segment(guard)?;
            Ok(())
        })?;
        info!(cache = %self.identity, "destroyed shared memory cache");
        self.lock.remove()
    }

    pub fn statistics(&self) -> CacheStatistics {
        self.stats.snapshot()
    }

    fn flush_locked(&self, guard: &WriteGuard<'_>) -> Result<usize> {
        let mapping = self.registry.list(guard)?;
        for (identifier, key) in mapping.iter() {
            if !self.segments.delete(key)? {
                debug!(identifier, key = %key, "segment already gone during flush");
            }
        }
        self.registry.clear(guard)?;
        Ok(mapping.len())
    }

    /// Identifier already stored under `key`, other than `identifier` itself
    fn occupant<'m>(mapping: &'m RegistryMapping, identifier: &str, key: ResourceKey) -> Option<&'m str> {
        mapping
            .iter()
            .find(|(other, other_key)| *other_key == key && *other != identifier)
            .map(|(other, _)| other)
    }

    fn with_read<T>(&self, f: impl FnOnce(&ReadGuard<'_>) -> Result<T>) -> Result<T> {
        let guard = self.lock.acquire_read().inspect_err(|_| self.stats.record_error())?;
        let result = f(&guard);
        let released = guard.release();
        self.settle(result, released)
    }

    fn with_write<T>(&self, f: impl FnOnce(&WriteGuard<'_>) -> Result<T>) -> Result<T> {
        let guard = self.lock.acquire_write().inspect_err(|_| self.stats.record_error())?;
        let result = f(&guard);
        let released = guard.release();
        self.settle(result, released)
    }

    /// Combine an operation result with the release of its lock hold.
    /// The operation's own error wins over a release error.
    fn settle<T>(&self, result: Result<T>, released: Result<ReleaseOutcome>) -> Result<T> {
        let outcome = match (result, released) {
            (Ok(value), Ok(ReleaseOutcome::Released)) => Ok(value),
            (Ok(value), Ok(ReleaseOutcome::AlreadyFree)) => {
                warn!(cache = %self.identity, "lock was already free on release; were the locks reset?");
                Ok(value)
            }
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(_)) => Err(e),
            (Err(e), Err(release_err)) => {
                warn!(error = %release_err, "failed to release lock after failed operation");
                Err(e)
            }
        };
        if outcome.is_err() {
            self.stats.record_error();
        }
        outcome
    }
}

impl CacheBackend for SharedMemoryBackend {
    fn set(
        &self,
        identifier: &str,
        data: &[u8],
        tags: &[String],
        lifetime: Option<Duration>,
    ) -> Result<()> {
        let _span = cache_span("set", self.identity.namespace()).entered();
        if !tags.is_empty() || lifetime.is_some() {
            trace!(identifier, tags = tags.len(), ?lifetime, "tags and lifetime are not enforced");
        }

        let key = self.entry_key(identifier)?;
        let limit = self.segments.payload_limit();
        if data.len() > limit {
            return Err(Error::OversizedPayload {
                identifier: identifier.to_string(),
                size: data.len(),
                limit,
            });
        }

        self.with_write(|guard| {
            let mapping = self.registry.list(guard)?;
            if let Some(occupant) = Self::occupant(&mapping, identifier, key) {
                return Err(Error::KeyCollision {
                    identifier: identifier.to_string(),
                    key: key.get(),
                    occupant: occupant.to_string(),
                });
            }
            let previous = mapping.get(identifier);
            self.segments.write(key, identifier, data)?;
            if let Err(e) = self.registry.register(guard, identifier, key) {
                // A segment nobody registered is unreachable by flush and destroy
                if previous.is_none() {
                    if let Err(cleanup) = self.segments.delete(key) {
                        warn!(identifier, key = %key, error = %cleanup, "failed to remove unregistered segment");
                    }
                }
                return Err(e);
            }
            Ok(())
        })?;

        self.stats.record_write(data.len());
        debug!(identifier, bytes = data.len(), "stored entry");
        Ok(())
    }

    fn get(&self, identifier: &str) -> Result<Option<Vec<u8>>> {
        let _span = cache_span("get", self.identity.namespace()).entered();
        let value = self.with_read(|guard| {
            let Some(key) = self.registry.lookup(guard, identifier)? else {
                return Ok(None);
            };
            let value = self.segments.read(key, identifier)?;
            if value.is_none() {
                warn!(identifier, key = %key, "registered entry has no segment");
            }
            Ok(value)
        })?;

        match &value {
            Some(bytes) => {
                self.stats.record_hit();
                trace!(identifier, bytes = bytes.len(), "cache hit");
            }
            None => {
                self.stats.record_miss();
                trace!(identifier, "cache miss");
            }
        }
        Ok(value)
    }

    fn has(&self, identifier: &str) -> Result<bool> {
        let _span = cache_span("has", self.identity.namespace()).entered();
        self.with_read(|guard| {
            let Some(key) = self.registry.lookup(guard, identifier)? else {
                return Ok(false);
            };
            let present = self.segments.exists(key)?;
            if !present {
                warn!(identifier, key = %key, "registered entry has no segment");
            }
            Ok(present)
        })
    }

    fn remove(&self, identifier: &str) -> Result<bool> {
        let _span = cache_span("remove", self.identity.namespace()).entered();
        let removed = self.with_write(|guard| {
            let mapping = self.registry.list(guard)?;
            match mapping.get(identifier) {
                Some(key) => {
                    self.segments.delete(key)?;
                    self.registry.unregister(guard, identifier)?;
                    Ok(true)
                }
                None => {
                    // An unregistered segment can be left behind by a set whose
                    // registry update failed; clean it up unless another entry
                    // owns the key.
                    let key = self.entry_key(identifier)?;
                    if Self::occupant(&mapping, identifier, key).is_some() {
                        return Ok(false);
                    }
                    let orphaned = self.segments.delete(key)?;
                    if orphaned {
                        warn!(identifier, key = %key, "removed unregistered segment");
                    }
                    Ok(orphaned)
                }
            }
        })?;

        if removed {
            self.stats.record_removal();
            debug!(identifier, "removed entry");
        }
        Ok(removed)
    }

    fn flush(&self) -> Result<()> {
        let _span = cache_span("flush", self.identity.namespace()).entered();
        let count = self.with_write(|guard| self.flush_locked(guard))?;
        self.stats.record_flush();
        info!(cache = %self.identity, entries = count, "flushed cache");
        Ok(())
    }

    fn collect_garbage(&self) {
        trace!(cache = %self.identity, "entries never expire; nothing to collect");
    }
}
