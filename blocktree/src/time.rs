//! Time collaborator: millisecond timestamps for new blocks.
//!
//! Chains require timestamps that never move backwards relative to the
//! previous block, so the time source is injected; tests drive it by hand
//! with [`MockTimeSource::set_next_timestamp`].

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of 64-bit millisecond timestamps.
pub trait TimeSource: Send + Sync {
    /// The current time in milliseconds since the Unix epoch.
    fn now(&self) -> u64;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Deterministic time for tests.
///
/// Returns queued values first (in order), then falls back to a counter
/// that advances by one millisecond per call, so ordinary writes keep
/// their monotonic timestamps without per-test bookkeeping.
#[derive(Debug)]
pub struct MockTimeSource {
    queued: Mutex<VecDeque<u64>>,
    counter: AtomicU64,
}

impl MockTimeSource {
    /// Mock clock starting at `start` milliseconds.
    pub fn new(start: u64) -> Self {
        MockTimeSource {
            queued: Mutex::new(VecDeque::new()),
            counter: AtomicU64::new(start),
        }
    }

    /// Force the next `now()` call to return exactly `timestamp`.
    /// Multiple queued values are consumed in FIFO order.
    pub fn set_next_timestamp(&self, timestamp: u64) {
        self.queued.lock().push_back(timestamp);
    }
}

impl Default for MockTimeSource {
    fn default() -> Self {
        // An arbitrary fixed epoch well above zero, so "timestamp > 0"
        // style assertions hold without special-casing.
        MockTimeSource::new(1_000_000)
    }
}

impl TimeSource for MockTimeSource {
    fn now(&self) -> u64 {
        if let Some(forced) = self.queued.lock().pop_front() {
            return forced;
        }
        self.counter.fetch_add(1, Ordering::SeqCst)
    }
}
