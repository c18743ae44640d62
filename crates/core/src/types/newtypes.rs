//! Newtype wrappers for cache identity and System V resource keys

use crate::constants::{GATE_SUFFIX, MUTEX_SUFFIX};
use crate::errors::{Error, Result};
use crate::keys::derive_key;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// A 32-bit key naming one System V semaphore set or shared memory segment.
///
/// Never zero: zero is `IPC_PRIVATE` and would create an anonymous object
/// that no other process can find.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(u32);

impl ResourceKey {
    /// Wrap a raw hash value, remapping zero away from `IPC_PRIVATE`
    pub const fn from_hash(hash: u32) -> Self {
        if hash == 0 {
            Self(1)
        } else {
            Self(hash)
        }
    }

    /// Get the raw unsigned value
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Reinterpret the key as the signed `key_t` the IPC calls expect
    pub const fn as_ipc_key(self) -> i32 {
        self.0 as i32
    }
}

impl Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// The pair of semaphore keys guarding one cache instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockKeys {
    /// Key of the guard mutex set (guard plus writer/reader tallies)
    pub mutex: ResourceKey,
    /// Key of the gate set
    pub gate: ResourceKey,
}

/// Installation scope plus cache namespace.
///
/// The scope keeps independent deployments on the same host apart; the
/// namespace names one logical cache inside a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheIdentity {
    scope: String,
    namespace: String,
}

impl CacheIdentity {
    /// Create a new identity, rejecting empty components
    pub fn new(scope: impl Into<String>, namespace: impl Into<String>) -> Result<Self> {
        let scope = scope.into();
        let namespace = namespace.into();
        if scope.is_empty() {
            return Err(Error::configuration("cache scope must not be empty"));
        }
        if namespace.is_empty() {
            return Err(Error::configuration("cache namespace must not be empty"));
        }
        Ok(Self { scope, namespace })
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Keys of the two semaphore sets backing the reader-writer lock
    pub fn lock_keys(&self) -> LockKeys {
        LockKeys {
            mutex: derive_key(&self.scope, &self.namespace, Some(MUTEX_SUFFIX)),
            gate: derive_key(&self.scope, &self.namespace, Some(GATE_SUFFIX)),
        }
    }

    /// Key of the segment holding the identifier registry
    pub fn registry_key(&self) -> ResourceKey {
        derive_key(&self.scope, &self.namespace, None)
    }

    /// Key of the segment holding one entry
    pub fn entry_key(&self, identifier: &str) -> ResourceKey {
        derive_key(&self.scope, &self.namespace, Some(identifier))
    }
}

impl Display for CacheIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.scope, self.namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_hash_is_remapped() {
        assert_eq!(ResourceKey::from_hash(0).get(), 1);
        assert_eq!(ResourceKey::from_hash(7).get(), 7);
    }

    #[test]
    fn test_ipc_key_reinterprets_high_bit() {
        let key = ResourceKey::from_hash(0xffff_fffe);
        assert_eq!(key.as_ipc_key(), -2);
        assert_eq!(key.to_string(), "0xfffffffe");
    }

    #[test]
    fn test_identity_rejects_empty_parts() {
        assert!(CacheIdentity::new("", "ns").is_err());
        assert!(CacheIdentity::new("/srv/app", "").is_err());
    }

    #[test]
    fn test_lock_keys_are_distinct_from_registry() {
        let identity = CacheIdentity::new("/srv/app", "Flow_Core").unwrap();
        let keys = identity.lock_keys();
        assert_ne!(keys.mutex, keys.gate);
        assert_ne!(keys.mutex, identity.registry_key());
        assert_ne!(identity.entry_key("a"), identity.entry_key("b"));
    }

    #[test]
    fn test_scopes_separate_deployments() {
        let a = CacheIdentity::new("/srv/one", "Flow_Core").unwrap();
        let b = CacheIdentity::new("/srv/two", "Flow_Core").unwrap();
        assert_ne!(a.registry_key(), b.registry_key());
        assert_ne!(a.lock_keys(), b.lock_keys());
    }
}
