//! Deterministic derivation of System V resource keys.
//!
//! A key is the CRC-32C (Castagnoli) of `scope::namespace[::suffix]`. Any two
//! processes on the same host that agree on the three inputs compute the same
//! key, so no discovery step is needed before attaching to a shared cache.
//!
//! The keyspace is 2^32. For `n` live keys the chance that at least two
//! collide is roughly `n² / 2^33`, which stays below one in a thousand up to
//! about 2,900 entries per host. Within one cache a collision is detected at
//! write time and reported as [`crate::Error::KeyCollision`]; collisions
//! across unrelated caches on the same host are not detectable.

use crate::constants::KEY_SEPARATOR;
use crate::types::ResourceKey;
use crc32c::crc32c_append;

/// Derive the resource key for `scope`, `namespace` and an optional purpose suffix
pub fn derive_key(scope: &str, namespace: &str, suffix: Option<&str>) -> ResourceKey {
    let mut crc = crc32c_append(0, scope.as_bytes());
    crc = crc32c_append(crc, KEY_SEPARATOR.as_bytes());
    crc = crc32c_append(crc, namespace.as_bytes());
    if let Some(suffix) = suffix {
        crc = crc32c_append(crc, KEY_SEPARATOR.as_bytes());
        crc = crc32c_append(crc, suffix.as_bytes());
    }
    ResourceKey::from_hash(crc)
}
