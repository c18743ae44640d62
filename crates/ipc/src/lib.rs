//! System V IPC primitives for shmcache
//!
//! This crate owns every `unsafe` call in the workspace:
//! - `semaphore`: a keyed semaphore set with bounded waits
//! - `lock`: the cross-process reader-writer lock built from two such sets
//! - `segment`: keyed shared memory segments holding one framed payload
//!
//! Nothing here knows about cache entries or the registry; callers bring the
//! keys and are responsible for holding the right lock mode.

mod sys;

pub mod lock;
pub mod segment;
pub mod semaphore;
pub mod wait;

pub use lock::{AccessMode, HeldLock, LockManager, LockState, ReadGuard, ReleaseOutcome, WriteGuard};
pub use segment::{SegmentHeader, SegmentStore, HEADER_LEN};
pub use semaphore::SemaphoreSet;
pub use wait::WaitPolicy;
