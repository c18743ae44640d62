//! Two real processes sharing one cache.
//!
//! The parent re-executes this test binary, filtered down to
//! `child_process_entry`, with the cache scope in the environment.
use shmcache::{CacheBackend, Error, ShmCacheConfig, SharedMemoryBackend};
use std::process::Command;
use std::time::Duration;

const CHILD_SCOPE_VAR: &str = "SHMCACHE_TEST_CHILD_SCOPE";

fn config(scope: &str) -> ShmCacheConfig {
    ShmCacheConfig::new(scope, "cross-process")
        .with_permissions(0o600)
        .with_lock_timeout(Some(Duration::from_secs(10)))
}

/// Runs only inside the child; a no-op in a normal test run
#[test]
fn child_process_entry() {
    let Ok(scope) = std::env::var(CHILD_SCOPE_VAR) else {
        return;
    };
    let cache = SharedMemoryBackend::bind(config(&scope)).unwrap();

    let from_parent = cache.get("from-parent").unwrap().expect("parent value visible");
    let mut reply = from_parent.clone();
    reply.reverse();
    cache.set("from-child", &reply, &[], None).unwrap();
    assert!(cache.remove("parent-scratch").unwrap());

    let state = cache.lock_state().unwrap();
    assert!(state.is_idle(), "child saw {state}");
}

#[test]
fn test_child_process_exchanges_values() {
    let scope = uuid::Uuid::new_v4().to_string();
    let cache = SharedMemoryBackend::bind(config(&scope)).unwrap();
    cache.set("from-parent", b"hello child", &[], None).unwrap();
    cache.set("parent-scratch", b"remove me", &[], None).unwrap();

    let status = Command::new(std::env::current_exe().unwrap())
        .args(["--exact", "child_process_entry", "--nocapture", "--test-threads=1"])
        .env(CHILD_SCOPE_VAR, &scope)
        .status()
        .unwrap();
    assert!(status.success(), "child test failed: {status}");

    assert_eq!(
        cache.get("from-child").unwrap().as_deref(),
        Some(&b"dlihc olleh"[..])
    );
    assert!(!cache.has("parent-scratch").unwrap());
    assert!(cache.lock_state().unwrap().is_idle());
    cache.destroy().unwrap();
}

#[test]
fn test_write_hold_of_exited_process_is_undone() {
    let scope = uuid::Uuid::new_v4().to_string();
    let cache = SharedMemoryBackend::bind(config(&scope)).unwrap();

    let status = Command::new(std::env::current_exe().unwrap())
        .args(["--exact", "child_holds_write_lock", "--nocapture", "--test-threads=1"])
        .env(CHILD_SCOPE_VAR, &scope)
        .status()
        .unwrap();
    assert!(status.success(), "child test failed: {status}");

    // The child exited while holding the write lock
    assert!(cache.lock_state().unwrap().is_idle());
    cache.set("after", b"ok", &[], None).unwrap();
    cache.destroy().unwrap();
}

/// Child half of `test_write_hold_of_exited_process_is_undone`
#[test]
fn child_holds_write_lock() {
    let Ok(scope) = std::env::var(CHILD_SCOPE_VAR) else {
        return;
    };
    let config = config(&scope);
    let lock = shmcache_ipc::LockManager::open(
        config.identity().unwrap().lock_keys(),
        config.permissions,
        config.wait_policy(),
    )
    .unwrap();
    // Exit with the hold taken; SEM_UNDO has to give the gate back
    let guard = lock.acquire_write().unwrap();
    std::mem::forget(guard);
    std::process::exit(0);
}

#[test]
fn test_read_hold_of_exited_process_is_stale_until_reset() {
    let scope = uuid::Uuid::new_v4().to_string();
    let cache = SharedMemoryBackend::bind(
        config(&scope).with_lock_timeout(Some(Duration::from_millis(300))),
    )
    .unwrap();
    cache.set("kept", b"1", &[], None).unwrap();

    let mut child = Command::new(std::env::current_exe().unwrap())
        .args(["--exact", "child_holds_read_lock", "--nocapture", "--test-threads=1"])
        .env(CHILD_SCOPE_VAR, &scope)
        .spawn()
        .unwrap();
    let child_pid = child.id() as i32;
    let status = child.wait().unwrap();
    assert!(status.success(), "child test failed: {status}");

    // The reader group's gate has no undo, so it stays closed
    let state = cache.lock_state().unwrap();
    assert_eq!(state.gate, 0, "unexpected state {state}");
    assert_eq!(state.readers, 0, "unexpected state {state}");

    match cache.set("blocked", b"2", &[], None).unwrap_err() {
        Error::StaleLock { holder_pid, .. } => assert_eq!(holder_pid, child_pid),
        other => panic!("expected a stale lock on set, got {other:?}"),
    }
    match cache.get("kept").unwrap_err() {
        Error::StaleLock { holder_pid, .. } => assert_eq!(holder_pid, child_pid),
        other => panic!("expected a stale lock on get, got {other:?}"),
    }

    cache.reset_locks().unwrap();
    assert!(cache.lock_state().unwrap().is_idle());
    assert_eq!(cache.get("kept").unwrap().as_deref(), Some(&b"1"[..]));
    assert!(!cache.has("blocked").unwrap());
    cache.destroy().unwrap();
}

/// Child half of `test_read_hold_of_exited_process_is_stale_until_reset`
#[test]
fn child_holds_read_lock() {
    let Ok(scope) = std::env::var(CHILD_SCOPE_VAR) else {
        return;
    };
    let config = config(&scope);
    let lock = shmcache_ipc::LockManager::open(
        config.identity().unwrap().lock_keys(),
        config.permissions,
        config.wait_policy(),
    )
    .unwrap();
    let guard = lock.acquire_read().unwrap();
    std::mem::forget(guard);
    std::process::exit(0);
}
