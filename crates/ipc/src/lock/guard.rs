//! RAII holds on the reader-writer lock

use super::state::{AccessMode, ReleaseOutcome};
use super::LockManager;
use shmcache_core::Result;
use tracing::warn;

mod sealed {
    pub trait Sealed {}
}

/// Proof that the caller currently holds the cache lock in some mode.
///
/// Registry and backend internals take `&impl HeldLock` (or `&WriteGuard`
/// for mutations) so touching shared state without the lock does not compile.
pub trait HeldLock: sealed::Sealed {
    fn mode(&self) -> AccessMode;
}

/// Shared hold; any number may coexist, never alongside a [`WriteGuard`]
#[must_use = "the read lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ReadGuard<'a> {
    manager: &'a LockManager,
    released: bool,
}

impl<'a> ReadGuard<'a> {
    pub(super) fn new(manager: &'a LockManager) -> Self {
        Self {
            manager,
            released: false,
        }
    }

    /// Release explicitly and learn the outcome
    pub fn release(mut self) -> Result<ReleaseOutcome> {
        self.released = true;
        self.manager.release_read()
    }
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.manager.release_read() {
                warn!(error = %e, "failed to release read lock");
            }
        }
    }
}

impl sealed::Sealed for ReadGuard<'_> {}

impl HeldLock for ReadGuard<'_> {
    fn mode(&self) -> AccessMode {
        AccessMode::Read
    }
}

/// Exclusive hold
#[must_use = "the write lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct WriteGuard<'a> {
    manager: &'a LockManager,
    released: bool,
}

impl<'a> WriteGuard<'a> {
    pub(super) fn new(manager: &'a LockManager) -> Self {
        Self {
            manager,
            released: false,
        }
    }

    /// Release explicitly and learn the outcome
    pub fn release(mut self) -> Result<ReleaseOutcome> {
        self.released = true;
        self.manager.release_write()
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.manager.release_write() {
                warn!(error = %e, "failed to release write lock");
            }
        }
    }
}

impl sealed::Sealed for WriteGuard<'_> {}

impl HeldLock for WriteGuard<'_> {
    fn mode(&self) -> AccessMode {
        AccessMode::Write
    }
}
