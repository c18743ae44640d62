//! Classification helpers for error handling

use super::types::Error;
use std::io::ErrorKind;

impl Error {
    /// Check if retrying the same call may succeed without intervention
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::LockTimeout { .. } => true,
            Self::ResourceAcquisition { source, .. } => matches!(
                source.kind(),
                ErrorKind::WouldBlock | ErrorKind::Interrupted | ErrorKind::OutOfMemory
            ),
            _ => false,
        }
    }

    /// Check if this error indicates data corruption
    #[must_use]
    pub const fn is_corruption(&self) -> bool {
        matches!(self, Self::CorruptPayload { .. })
    }

    /// Check if an operator has to reset the lock state before progress is possible
    #[must_use]
    pub const fn needs_lock_reset(&self) -> bool {
        matches!(self, Self::StaleLock { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_timeout_is_transient() {
        let err = Error::LockTimeout {
            operation: "acquire write lock",
            waited: Duration::from_millis(10),
        };
        assert!(err.is_transient());
        assert!(!err.is_corruption());
    }

    #[test]
    fn test_corruption_is_not_transient() {
        let err = Error::corrupt("entry", "bad magic");
        assert!(err.is_corruption());
        assert!(!err.is_transient());
        assert!(err.to_string().contains("bad magic"));
    }

    #[test]
    fn test_stale_lock_needs_reset() {
        let err = Error::StaleLock {
            resource: "gate semaphore",
            holder_pid: 4242,
        };
        assert!(err.needs_lock_reset());
        assert!(err.to_string().contains("4242"));
    }
}
