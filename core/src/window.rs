//! Rolling failure window
//!
//! `FailureLog` keeps the timestamps of failures observed while the circuit
//! is closed, oldest first. Stale entries are dropped from the front, so a
//! prune only ever looks at the prefix that actually expired.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Thread-safe, time-ordered log of failure timestamps (milliseconds)
#[derive(Debug)]
pub struct FailureLog {
    timestamps: Mutex<VecDeque<u64>>,
    /// Entries older than this (relative to "now") are stale
    window_millis: u64,
}

impl FailureLog {
    pub fn new(window_millis: u64) -> Self {
        Self {
            timestamps: Mutex::new(VecDeque::new()),
            window_millis,
        }
    }

    pub fn window_millis(&self) -> u64 {
        self.window_millis
    }

    /// Record a failure and drop everything that expired relative to `now`.
    ///
    /// Returns the number of failures left inside the window.
    pub fn record(&self, now: u64) -> usize {
        let mut timestamps = self.lock();

        // Clock readings are taken outside this lock, so concurrent callers
        // can arrive with an older timestamp than the newest entry.
        let at = timestamps.partition_point(|&ts| ts <= now);
        timestamps.insert(at, now);

        Self::prune_locked(&mut timestamps, now, self.window_millis);
        timestamps.len()
    }

    /// Drop stale entries. Returns how many were removed.
    pub fn prune(&self, now: u64) -> usize {
        let mut timestamps = self.lock();
        Self::prune_locked(&mut timestamps, now, self.window_millis)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Copy of the current entries, oldest first
    pub fn snapshot(&self) -> Vec<u64> {
        self.lock().iter().copied().collect()
    }

    fn prune_locked(timestamps: &mut VecDeque<u64>, now: u64, window: u64) -> usize {
        let before = timestamps.len();
        while let Some(&oldest) = timestamps.front() {
            if now.saturating_sub(oldest) < window {
                break;
            }
            timestamps.pop_front();
        }
        before - timestamps.len()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<u64>> {
        // No user code runs while this lock is held
        self.timestamps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
