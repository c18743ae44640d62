//! Value types reported by the lock manager

use serde::Serialize;
use std::fmt;

/// Lock mode held by a guard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    Read,
    Write,
}

/// Result of releasing a lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseOutcome {
    /// The hold was given back
    Released,
    /// The gate was already open, typically because an operator reset the locks
    AlreadyFree,
}

/// Point-in-time view of the shared lock state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LockState {
    /// Guard mutex value (1 = free)
    pub guard: u16,
    /// Gate value (1 = no reader group and no writer inside)
    pub gate: u16,
    /// Writers holding or waiting for the gate
    pub writers: u16,
    /// Readers inside the current reader group
    pub readers: u16,
    /// Last process that took or returned the gate
    pub gate_pid: i32,
}

impl LockState {
    pub fn is_idle(&self) -> bool {
        self.guard == 1 && self.gate == 1 && self.writers == 0 && self.readers == 0
    }
}

impl fmt::Display for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "guard={} gate={} writers={} readers={} gate_pid={}",
            self.guard, self.gate, self.writers, self.readers, self.gate_pid
        )
    }
}
