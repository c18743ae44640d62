//! Domain types shared across the workspace

mod newtypes;

pub use newtypes::{CacheIdentity, LockKeys, ResourceKey};
