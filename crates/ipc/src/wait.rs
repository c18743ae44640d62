//! Bounded waiting with capped exponential back-off

use shmcache_core::{DEFAULT_LOCK_TIMEOUT, DEFAULT_POLL_INTERVAL, MAX_POLL_INTERVAL};
use std::time::{Duration, Instant};

/// How long lock acquisition may block, and how it polls while it waits.
///
/// `timeout: None` keeps the classic blocking `semop`, which waits forever
/// if a holder dies with the gate closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Option<Duration>,
    pub poll_interval: Duration,
    pub max_poll_interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_LOCK_TIMEOUT),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_interval: MAX_POLL_INTERVAL,
        }
    }
}

impl WaitPolicy {
    /// Wait forever
    pub fn blocking() -> Self {
        Self {
            timeout: None,
            ..Self::default()
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::default()
        }
    }

    /// Upper bound used for waits that must never block forever, such as
    /// waiting for another process to finish initialising a semaphore set
    pub fn bounded_timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_LOCK_TIMEOUT)
    }

    pub(crate) fn start(&self, timeout: Duration) -> Deadline {
        Deadline {
            started: Instant::now(),
            timeout,
            next_sleep: self.poll_interval.max(Duration::from_micros(50)),
            max_sleep: self.max_poll_interval.max(self.poll_interval),
        }
    }
}

/// Tracks one bounded wait
pub(crate) struct Deadline {
    started: Instant,
    timeout: Duration,
    next_sleep: Duration,
    max_sleep: Duration,
}

impl Deadline {
    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Sleep before the next attempt; `false` once the deadline has passed
    pub(crate) fn pause(&mut self) -> bool {
        let elapsed = self.started.elapsed();
        if elapsed >= self.timeout {
            return false;
        }
        let remaining = self.timeout - elapsed;
        std::thread::sleep(self.next_sleep.min(remaining));
        self.next_sleep = (self.next_sleep * 2).min(self.max_sleep);
        true
    }
}
