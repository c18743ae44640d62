//! Process liveness checks used when diagnosing abandoned locks

/// Check if a process with the given PID is running
pub fn is_process_running(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }

    if u32::try_from(pid).is_ok_and(|pid| pid == std::process::id()) {
        return true;
    }

    #[cfg(unix)]
    {
        // Signal 0 performs the permission and existence checks only. EPERM
        // means the process exists but belongs to somebody else.
        let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
        if rc == 0 {
            return true;
        }
        std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }

    #[cfg(not(unix))]
    {
        // Conservatively assume it's running so nothing is declared stale
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_process_is_running() {
        assert!(is_process_running(std::process::id() as i32));
    }

    #[test]
    fn test_invalid_pids_are_not_running() {
        assert!(!is_process_running(0));
        assert!(!is_process_running(-1));
    }

    #[cfg(unix)]
    #[test]
    fn test_reaped_child_is_not_running() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = child.id() as i32;
        child.wait().unwrap();
        assert!(!is_process_running(pid));
    }
}
