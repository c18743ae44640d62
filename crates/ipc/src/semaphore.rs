//! Keyed System V semaphore sets

use crate::sys::{self, SemOp};
use crate::wait::WaitPolicy;
use shmcache_core::{Error, ResourceKey, Result};
use std::io;
use tracing::{debug, trace};

/// A System V semaphore set found by key.
///
/// The set outlives the process; dropping the handle releases nothing.
/// Use [`SemaphoreSet::remove`] for explicit teardown.
#[derive(Debug)]
pub struct SemaphoreSet {
    id: libc::c_int,
    key: ResourceKey,
    len: u16,
    label: &'static str,
}

impl SemaphoreSet {
    /// Open the set for `key`, creating and initialising it if needed.
    ///
    /// The creator applies `initial` with a single `semop`, which also stamps
    /// `sem_otime`. Openers that lose the creation race wait until that stamp
    /// appears so they never observe the all-zero state of a fresh set.
    pub fn open_or_create(
        label: &'static str,
        key: ResourceKey,
        initial: &[u16],
        permissions: u32,
        wait: &WaitPolicy,
    ) -> Result<Self> {
        let len = initial.len();
        let mode = (permissions & 0o777) as libc::c_int;

        match sys::semget(
            key.as_ipc_key(),
            len,
            libc::IPC_CREAT | libc::IPC_EXCL | mode,
        ) {
            Ok(id) => {
                let set = Self {
                    id,
                    key,
                    len: len as u16,
                    label,
                };
                set.initialise(initial)?;
                debug!(key = %key, label, "created semaphore set");
                Ok(set)
            }
            Err(err) if err.raw_os_error() == Some(libc::EEXIST) => {
                let id = sys::semget(key.as_ipc_key(), len, mode)
                    .map_err(|e| Error::os(label, key.get(), "open", e))?;
                let set = Self {
                    id,
                    key,
                    len: len as u16,
                    label,
                };
                set.await_initialised(wait)?;
                trace!(key = %key, label, "opened semaphore set");
                Ok(set)
            }
            Err(err) => Err(Error::os(label, key.get(), "create", err)),
        }
    }

    fn initialise(&self, initial: &[u16]) -> Result<()> {
        let mut ops: Vec<SemOp> = initial
            .iter()
            .enumerate()
            .filter(|(_, value)| **value > 0)
            .map(|(index, value)| SemOp {
                index: index as u16,
                delta: *value as i16,
                undo: false,
                nowait: true,
            })
            .collect();
        if ops.is_empty() {
            // Still stamp sem_otime so openers see the set as ready
            ops.push(SemOp {
                index: 0,
                delta: 0,
                undo: false,
                nowait: true,
            });
        }
        sys::semop(self.id, &ops).map_err(|e| self.err("initialise", e))
    }

    fn await_initialised(&self, wait: &WaitPolicy) -> Result<()> {
        let mut deadline = wait.start(wait.bounded_timeout());
        loop {
            let otime = sys::sem_otime(self.id).map_err(|e| self.err("inspect", e))?;
            if otime != 0 {
                return Ok(());
            }
            if !deadline.pause() {
                return Err(Error::LockTimeout {
                    operation: "wait for semaphore initialisation",
                    waited: deadline.elapsed(),
                });
            }
        }
    }

    pub fn key(&self) -> ResourceKey {
        self.key
    }

    pub fn len(&self) -> u16 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Decrement semaphore `index`, waiting according to `wait`.
    ///
    /// Expiry yields [`Error::LockTimeout`] naming `operation`.
    pub fn acquire(
        &self,
        index: u16,
        undo: bool,
        wait: &WaitPolicy,
        operation: &'static str,
    ) -> Result<()> {
        let Some(timeout) = wait.timeout else {
            let op = SemOp {
                index,
                delta: -1,
                undo,
                nowait: false,
            };
            return sys::semop(self.id, &[op]).map_err(|e| self.err("acquire", e));
        };

        let mut deadline = wait.start(timeout);
        loop {
            if self.try_acquire(index, undo)? {
                return Ok(());
            }
            if !deadline.pause() {
                return Err(Error::LockTimeout {
                    operation,
                    waited: deadline.elapsed(),
                });
            }
        }
    }

    /// Decrement semaphore `index` if that does not block
    pub fn try_acquire(&self, index: u16, undo: bool) -> Result<bool> {
        let op = SemOp {
            index,
            delta: -1,
            undo,
            nowait: true,
        };
        match sys::semop(self.id, &[op]) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(false),
            Err(err) => Err(self.err("acquire", err)),
        }
    }

    /// Increment semaphore `index`
    pub fn release(&self, index: u16, undo: bool) -> Result<()> {
        let op = SemOp {
            index,
            delta: 1,
            undo,
            nowait: true,
        };
        sys::semop(self.id, &[op]).map_err(|e| self.err("release", e))
    }

    /// Current value of semaphore `index`
    pub fn value(&self, index: u16) -> Result<u16> {
        sys::semctl_get(self.id, index, libc::GETVAL)
            .map(|v| v as u16)
            .map_err(|e| self.err("read", e))
    }

    /// PID of the last process that operated on semaphore `index`
    pub fn last_pid(&self, index: u16) -> Result<i32> {
        sys::semctl_get(self.id, index, libc::GETPID)
            .map(|pid| pid as i32)
            .map_err(|e| self.err("inspect", e))
    }

    /// Overwrite semaphore `index`. Clears every process's undo adjustment for it.
    pub fn set_value(&self, index: u16, value: u16) -> Result<()> {
        sys::semctl_setval(self.id, index, value).map_err(|e| self.err("reset", e))
    }

    /// Remove the set from the system; `false` if it was already gone
    pub fn remove(&self) -> Result<bool> {
        match sys::semrm(self.id) {
            Ok(()) => {
                debug!(key = %self.key, label = self.label, "removed semaphore set");
                Ok(true)
            }
            Err(err) if sys::is_removed(&err) => Ok(false),
            Err(err) => Err(self.err("remove", err)),
        }
    }

    fn err(&self, operation: &'static str, source: io::Error) -> Error {
        Error::os(self.label, self.key.get(), operation, source)
    }
}
