//! Backend-agnostic cache interface

use shmcache_core::Result;
use std::time::Duration;

/// Byte-level cache operations.
///
/// Absence is never an error: `get` returns `Ok(None)` and `has` returns
/// `Ok(false)`. Errors mean the backend could not answer at all.
pub trait CacheBackend {
    /// Store `data` under `identifier`, replacing any previous value.
    ///
    /// `tags` and `lifetime` exist for interface compatibility with backends
    /// that support invalidation and expiry; implementations may ignore them.
    fn set(
        &self,
        identifier: &str,
        data: &[u8],
        tags: &[String],
        lifetime: Option<Duration>,
    ) -> Result<()>;

    fn get(&self, identifier: &str) -> Result<Option<Vec<u8>>>;

    fn has(&self, identifier: &str) -> Result<bool>;

    /// Returns whether anything was removed
    fn remove(&self, identifier: &str) -> Result<bool>;

    /// Remove every entry
    fn flush(&self) -> Result<()>;

    /// Evict expired entries. Infallible.
    fn collect_garbage(&self);
}
