//! Cross-process reader-writer lock with writer preference.
//!
//! Two semaphore sets per cache instance:
//!
//! ```text
//! mutex set  [GUARD = 1, WRITERS = 0, READERS = 0]
//! gate set   [GATE = 1]
//! ```
//!
//! `GUARD` serialises updates to the tallies. The tallies are the kernel's
//! semaphore values, so every process sharing the cache sees the same counts.
//! `GATE` admits either one writer or one reader group: the first reader of
//! a group takes it and the last one gives it back. `WRITERS` counts writers
//! holding or waiting for the gate; while it is non-zero no reader enters, so
//! a stream of readers cannot starve a writer.
//!
//! `GUARD`, the tallies and a writer's gate hold use `SEM_UNDO`, so the
//! kernel rolls them back if the holding process dies. A reader group's gate
//! hold cannot: it is taken and returned by different processes. If the last
//! reader dies the gate stays closed; bounded waits then report
//! [`Error::StaleLock`] and an operator recovers with [`LockManager::reset`].

mod guard;
mod state;

pub use guard::{HeldLock, ReadGuard, WriteGuard};
pub use state::{AccessMode, LockState, ReleaseOutcome};

use crate::semaphore::SemaphoreSet;
use crate::wait::WaitPolicy;
use shmcache_core::{Error, LockKeys, Result};
use shmcache_utils::is_process_running;
use std::time::Duration;
use tracing::{debug, trace, warn};

const GUARD: u16 = 0;
const WRITERS: u16 = 1;
const READERS: u16 = 2;
const GATE: u16 = 0;

const MUTEX_INITIAL: [u16; 3] = [1, 0, 0];
const GATE_INITIAL: [u16; 1] = [1];

/// Reader-writer lock shared by every process bound to the same [`LockKeys`]
#[derive(Debug)]
pub struct LockManager {
    keys: LockKeys,
    mutex: SemaphoreSet,
    gate: SemaphoreSet,
    wait: WaitPolicy,
}

impl LockManager {
    /// Open (or create) the semaphore sets named by `keys`
    pub fn open(keys: LockKeys, permissions: u32, wait: WaitPolicy) -> Result<Self> {
        let mutex = SemaphoreSet::open_or_create(
            "guard mutex",
            keys.mutex,
            &MUTEX_INITIAL,
            permissions,
            &wait,
        )?;
        let gate =
            SemaphoreSet::open_or_create("gate semaphore", keys.gate, &GATE_INITIAL, permissions, &wait)?;
        debug!(mutex = %keys.mutex, gate = %keys.gate, "lock manager bound");
        Ok(Self {
            keys,
            mutex,
            gate,
            wait,
        })
    }

    pub fn keys(&self) -> LockKeys {
        self.keys
    }

    pub fn wait_policy(&self) -> &WaitPolicy {
        &self.wait
    }

    /// Take the lock exclusively
    pub fn acquire_write(&self) -> Result<WriteGuard<'_>> {
        self.with_guard(|| self.mutex.release(WRITERS, true))?;

        if let Err(err) = self.gate.acquire(GATE, true, &self.wait, "acquire write lock") {
            let rollback = self.with_guard(|| self.mutex.try_acquire(WRITERS, true));
            if let Err(e) = rollback {
                warn!(error = %e, "failed to withdraw pending writer after gate wait failed");
            }
            return Err(self.diagnose(err));
        }

        trace!(gate = %self.keys.gate, "write lock acquired");
        Ok(WriteGuard::new(self))
    }

    /// Take the lock in shared mode.
    ///
    /// Every attempt runs under the guard. While any writer is pending the
    /// reader keeps waiting; otherwise it joins the running group, or opens a
    /// new one by taking the gate. Between attempts the guard is dropped.
    pub fn acquire_read(&self) -> Result<ReadGuard<'_>> {
        let mut deadline = self.wait.start(self.wait.timeout.unwrap_or(Duration::MAX));
        loop {
            let admitted = self.with_guard(|| {
                let (writers, readers) = self.tallies()?;
                let first = if writers > 0 {
                    return Ok(None);
                } else if readers > 0 {
                    false
                } else if self.gate.try_acquire(GATE, false)? {
                    true
                } else {
                    return Ok(None);
                };
                if let Err(e) = self.mutex.release(READERS, true) {
                    if first {
                        self.return_gate_logged();
                    }
                    return Err(e);
                }
                Ok(Some(first))
            })?;

            if let Some(first) = admitted {
                trace!(gate = %self.keys.gate, first, "read lock acquired");
                return Ok(ReadGuard::new(self));
            }
            if !deadline.pause() {
                return Err(self.diagnose(Error::LockTimeout {
                    operation: "acquire read lock",
                    waited: deadline.elapsed(),
                }));
            }
        }
    }

    fn release_write(&self) -> Result<ReleaseOutcome> {
        self.with_guard(|| {
            if !self.mutex.try_acquire(WRITERS, true)? {
                warn!("writer tally was already zero on release");
            }
            Ok(())
        })?;

        if self.gate.value(GATE)? > 0 {
            debug!("gate already open on write release");
            return Ok(ReleaseOutcome::AlreadyFree);
        }
        self.gate.release(GATE, true)?;
        trace!(gate = %self.keys.gate, "write lock released");
        Ok(ReleaseOutcome::Released)
    }

    fn release_read(&self) -> Result<ReleaseOutcome> {
        self.with_guard(|| {
            if !self.mutex.try_acquire(READERS, true)? {
                warn!("reader tally was already zero on release");
            }
            if self.mutex.value(READERS)? > 0 {
                return Ok(ReleaseOutcome::Released);
            }
            if self.gate.value(GATE)? > 0 {
                debug!("gate already open on last reader release");
                return Ok(ReleaseOutcome::AlreadyFree);
            }
            self.gate.release(GATE, false)?;
            trace!(gate = %self.keys.gate, "reader group left the gate");
            Ok(ReleaseOutcome::Released)
        })
    }

    /// Read the current lock state without taking the guard
    pub fn snapshot(&self) -> Result<LockState> {
        Ok(LockState {
            guard: self.mutex.value(GUARD)?,
            gate: self.gate.value(GATE)?,
            writers: self.mutex.value(WRITERS)?,
            readers: self.mutex.value(READERS)?,
            gate_pid: self.gate.last_pid(GATE)?,
        })
    }

    /// Force every semaphore back to its initial value.
    ///
    /// Operator recovery after a holder died with the gate closed. Running it
    /// while live holders exist breaks mutual exclusion for those holders.
    pub fn reset(&self) -> Result<()> {
        let before = self.snapshot()?;
        warn!(state = %before, "resetting cache lock state");
        for (index, value) in MUTEX_INITIAL.iter().enumerate() {
            self.mutex.set_value(index as u16, *value)?;
        }
        self.gate.set_value(GATE, GATE_INITIAL[0])?;
        Ok(())
    }

    /// Remove both semaphore sets from the system
    pub fn remove(self) -> Result<()> {
        self.mutex.remove()?;
        self.gate.remove()?;
        Ok(())
    }

    fn tallies(&self) -> Result<(u16, u16)> {
        Ok((self.mutex.value(WRITERS)?, self.mutex.value(READERS)?))
    }

    fn lock_guard(&self) -> Result<()> {
        self.mutex.acquire(GUARD, true, &self.wait, "acquire guard mutex")
    }

    fn unlock_guard(&self) -> Result<()> {
        self.mutex.release(GUARD, true)
    }

    fn return_gate_logged(&self) {
        if let Err(e) = self.gate.release(GATE, false) {
            warn!(error = %e, "failed to return gate");
        }
    }

    /// Run `f` while holding the guard mutex; the guard is released even if `f` fails
    fn with_guard<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        self.lock_guard()?;
        let result = f();
        match self.unlock_guard() {
            Ok(()) => result,
            Err(e) => match result {
                Ok(_) => Err(e),
                Err(original) => {
                    warn!(error = %e, "failed to release guard mutex");
                    Err(original)
                }
            },
        }
    }

    /// Turn a gate timeout into `StaleLock` when the holder is provably gone
    fn diagnose(&self, err: Error) -> Error {
        if !matches!(err, Error::LockTimeout { .. }) {
            return err;
        }
        let state = match self.snapshot() {
            Ok(state) => state,
            Err(_) => return err,
        };
        debug!(state = %state, "lock wait timed out");
        if state.gate == 0
            && state.readers == 0
            && state.gate_pid > 0
            && !is_process_running(state.gate_pid)
        {
            warn!(holder_pid = state.gate_pid, "gate held by a dead process");
            return Error::StaleLock {
                resource: "gate semaphore",
                holder_pid: state.gate_pid,
            };
        }
        err
    }
}
