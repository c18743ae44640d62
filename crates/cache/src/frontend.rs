//! Typed access on top of any byte-level backend

use crate::backend::SharedMemoryBackend;
use crate::codec::{Compressed, PayloadCodec};
use crate::config::ShmCacheConfig;
use crate::traits::CacheBackend;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shmcache_core::{Error, Result};
use std::time::Duration;

static IDENTIFIER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_%\-&]{1,250}$").expect("identifier pattern is valid"));

/// Reject identifiers outside `[a-zA-Z0-9_%-&]{1,250}`
pub fn validate_identifier(identifier: &str) -> Result<()> {
    if identifier.is_empty() {
        return Err(Error::invalid_identifier(identifier, "must not be empty"));
    }
    if identifier.len() > 250 {
        return Err(Error::invalid_identifier(
            identifier,
            format!("{} characters exceed the limit of 250", identifier.len()),
        ));
    }
    if !IDENTIFIER_PATTERN.is_match(identifier) {
        return Err(Error::invalid_identifier(
            identifier,
            "only letters, digits, '_', '%', '-' and '&' are allowed",
        ));
    }
    Ok(())
}

/// Stores values of any serde type through a [`PayloadCodec`]
#[derive(Debug)]
pub struct CacheFrontend<B, C> {
    backend: B,
    codec: C,
}

impl<B: CacheBackend, C: PayloadCodec> CacheFrontend<B, C> {
    pub fn new(backend: B, codec: C) -> Self {
        Self { backend, codec }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    pub fn set<T: Serialize>(&self, identifier: &str, value: &T) -> Result<()> {
        self.set_with(identifier, value, &[], None)
    }

    pub fn set_with<T: Serialize>(
        &self,
        identifier: &str,
        value: &T,
        tags: &[String],
        lifetime: Option<Duration>,
    ) -> Result<()> {
        validate_identifier(identifier)?;
        let bytes = self.codec.encode(value)?;
        self.backend.set(identifier, &bytes, tags, lifetime)
    }

    /// A stored value that no longer decodes is [`Error::CorruptPayload`], never a miss
    pub fn get<T: DeserializeOwned>(&self, identifier: &str) -> Result<Option<T>> {
        validate_identifier(identifier)?;
        let Some(bytes) = self.backend.get(identifier)? else {
            return Ok(None);
        };
        self.codec
            .decode(&bytes)
            .map(Some)
            .map_err(|e| Error::corrupt(identifier, e.to_string()))
    }

    pub fn has(&self, identifier: &str) -> Result<bool> {
        validate_identifier(identifier)?;
        self.backend.has(identifier)
    }

    pub fn remove(&self, identifier: &str) -> Result<bool> {
        validate_identifier(identifier)?;
        self.backend.remove(identifier)
    }

    pub fn flush(&self) -> Result<()> {
        self.backend.flush()
    }

    pub fn collect_garbage(&self) {
        self.backend.collect_garbage()
    }
}

impl<C: PayloadCodec> CacheFrontend<SharedMemoryBackend, Compressed<C>> {
    /// Bind a shared memory backend, compressing values as `config` specifies
    pub fn bind(config: ShmCacheConfig, codec: C) -> Result<Self> {
        let algorithm = config.compression;
        let backend = SharedMemoryBackend::bind(config)?;
        Ok(Self::new(backend, Compressed::with_algorithm(codec, algorithm)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonCodec;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// In-process backend standing in for shared memory
    #[derive(Default)]
    struct MapBackend(RefCell<HashMap<String, Vec<u8>>>);

    impl CacheBackend for MapBackend {
        fn set(&self, id: &str, data: &[u8], _: &[String], _: Option<Duration>) -> Result<()> {
            self.0.borrow_mut().insert(id.to_string(), data.to_vec());
            Ok(())
        }
        fn get(&self, id: &str) -> Result<Option<Vec<u8>>> {
            Ok(self.0.borrow().get(id).cloned())
        }
        fn has(&self, id: &str) -> Result<bool> {
            Ok(self.0.borrow().contains_key(id))
        }
        fn remove(&self, id: &str) -> Result<bool> {
            Ok(self.0.borrow_mut().remove(id).is_some())
        }
        fn flush(&self) -> Result<()> {
            self.0.borrow_mut().clear();
            Ok(())
        }
        fn collect_garbage(&self) {}
    }

    #[test]
    fn test_identifier_rules() {
        assert!(validate_identifier("user_42%page-1&lang").is_ok());
        assert!(validate_identifier(&"a".repeat(250)).is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier(&"a".repeat(251)).is_err());
        assert!(validate_identifier("has space").is_err());
        assert!(validate_identifier("a::b").is_err());
        assert!(validate_identifier("caché").is_err());
    }

    #[test]
    fn test_typed_round_trip() {
        let cache = CacheFrontend::new(MapBackend::default(), JsonCodec);
        let value = vec![("a".to_string(), 1u32), ("b".to_string(), 2)];
        cache.set("pairs", &value).unwrap();
        assert_eq!(cache.get::<Vec<(String, u32)>>("pairs").unwrap(), Some(value));
        assert_eq!(cache.get::<u32>("absent").unwrap(), None);
    }

    #[test]
    fn test_undecodable_value_is_corrupt() {
        let cache = CacheFrontend::new(MapBackend::default(), JsonCodec);
        cache.backend().set("bad", b"{not json", &[], None).unwrap();
        let err = cache.get::<u32>("bad").unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_invalid_identifier_never_reaches_backend() {
        let cache = CacheFrontend::new(MapBackend::default(), JsonCodec);
        let err = cache.set("no/slashes", &1u8).unwrap_err();
        assert!(matches!(err, Error::InvalidIdentifier { .. }));
        assert!(cache.backend().0.borrow().is_empty());
    }
}
