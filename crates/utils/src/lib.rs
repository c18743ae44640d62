//! Shared utilities for shmcache
//!
//! Small helpers used by the library crates and the operator CLI: tracing
//! setup and a process liveness probe for lock recovery.

pub mod process;
pub mod tracing;

pub use process::is_process_running;
