use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use librato_common::UnixMillis;
use tokio::time::Instant;

/// A source of wall-clock time.
///
/// Flushes are aligned to multiples of the flush period in wall-clock time. The scheduler reads
/// the time exclusively through this trait, so that tests can control it.
pub trait Clock: fmt::Debug + Send + Sync {
    /// Returns the current wall-clock time.
    fn now(&self) -> UnixMillis;
}

/// The system clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> UnixMillis {
        UnixMillis::now()
    }
}

/// A clock that starts at a fixed time and advances with the Tokio timer.
///
/// With Tokio's paused test time, this clock moves deterministically together with
/// [`tokio::time::sleep`] and [`tokio::time::advance`]. Use [`skew`](Self::skew) to simulate a
/// wall-clock jump that timers do not observe, such as a process suspension.
#[derive(Clone, Debug)]
pub struct ManualClock {
    base: UnixMillis,
    start: Instant,
    skew: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock that reads `base` now.
    pub fn new(base: UnixMillis) -> Self {
        Self {
            base,
            start: Instant::now(),
            skew: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Moves this clock and all its clones forward without advancing timers.
    pub fn skew(&self, by: Duration) {
        let millis = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.skew.fetch_add(millis, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> UnixMillis {
        let skew = Duration::from_millis(self.skew.load(Ordering::Relaxed));
        self.base + self.start.elapsed() + skew
    }
}
