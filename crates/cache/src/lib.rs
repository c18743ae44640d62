//! Cross-process cache stored in System V shared memory
//!
//! Every entry lives in its own shared memory segment, a registry segment
//! lists the live identifiers, and a semaphore-based reader-writer lock keeps
//! processes from seeing torn writes:
//!
//! - [`SharedMemoryBackend`]: byte-level [`CacheBackend`] bound to one
//!   `(scope, namespace)` pair
//! - [`MetadataRegistry`]: identifier to segment key mapping
//! - [`CacheFrontend`]: typed values through a [`PayloadCodec`]
//! - [`ConfigLoader`]: defaults, config file and `SHMCACHE_*` variables

pub mod backend;
pub mod codec;
pub mod config;
pub mod frontend;
pub mod registry;
pub mod statistics;
pub mod traits;

pub use backend::SharedMemoryBackend;
pub use codec::{BincodeCodec, Compressed, JsonCodec, PayloadCodec};
pub use config::{Compression, ConfigLoader, ConfigSource, LoadedConfig, ShmCacheConfig};
pub use frontend::{validate_identifier, CacheFrontend};
pub use registry::{MetadataRegistry, RegistryMapping};
pub use statistics::CacheStatistics;
pub use traits::CacheBackend;

pub use shmcache_core::{CacheIdentity, Error, ResourceKey, Result};
pub use shmcache_ipc::{LockState, ReleaseOutcome};
