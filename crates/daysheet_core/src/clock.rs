//! Injectable time source.
//!
//! The store stamps persisted records with wall-clock time, while the sync
//! engine's debounce arithmetic runs on monotonic milliseconds. Both come
//! from one trait so tests can drive time deterministically.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A source of wall-clock and monotonic time.
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Monotonic milliseconds since an arbitrary fixed origin.
    ///
    /// Never decreases; unaffected by wall-clock adjustments.
    fn monotonic_ms(&self) -> u64;
}

/// The production clock.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Creates a new system clock.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn monotonic_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// A manually advanced clock for tests.
#[derive(Debug)]
pub struct ManualClock {
    epoch: DateTime<Utc>,
    offset_ms: AtomicU64,
}

impl ManualClock {
    /// Creates a manual clock starting at the given wall-clock epoch.
    pub fn new(epoch: DateTime<Utc>) -> Self {
        Self {
            epoch,
            offset_ms: AtomicU64::new(0),
        }
    }

    /// Advances the clock by the given number of milliseconds.
    pub fn advance_ms(&self, ms: u64) {
        self.offset_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(DateTime::UNIX_EPOCH)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.epoch + chrono::Duration::milliseconds(self.offset_ms.load(Ordering::SeqCst) as i64)
    }

    fn monotonic_ms(&self) -> u64 {
        self.offset_ms.load(Ordering::SeqCst)
    }
}
