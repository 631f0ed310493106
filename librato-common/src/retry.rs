use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff;

/// Backoff multiplier (1.0 means no increase).
const DEFAULT_MULTIPLIER: f64 = 2.0;
/// Randomization factor (0.0 means no randomization).
const DEFAULT_RANDOMIZATION: f64 = 0.2;
/// Initial interval for the first retry.
const INITIAL_INTERVAL: Duration = Duration::from_millis(200);

/// A retry interval generator that increases timeouts with exponential backoff.
///
/// The first call to [`next_backoff`](Self::next_backoff) returns a zero duration, so that the
/// initial attempt goes out immediately. Every subsequent call returns a randomized, growing
/// delay capped at the configured maximum interval.
#[derive(Debug)]
pub struct RetryBackoff {
    backoff: ExponentialBackoff,
    max_interval: Duration,
    attempt: usize,
}

impl RetryBackoff {
    /// Creates a new retry backoff based on configured thresholds.
    pub fn new(max_interval: Duration) -> Self {
        let backoff = backoff::ExponentialBackoffBuilder::new()
            .with_initial_interval(INITIAL_INTERVAL.min(max_interval))
            .with_randomization_factor(DEFAULT_RANDOMIZATION)
            .with_multiplier(DEFAULT_MULTIPLIER)
            .with_max_interval(max_interval)
            .with_max_elapsed_time(None)
            .build();

        RetryBackoff {
            backoff,
            max_interval,
            attempt: 0,
        }
    }

    /// Returns the number of the retry attempt.
    pub fn attempt(&self) -> usize {
        self.attempt
    }

    /// Returns the next backoff duration.
    pub fn next_backoff(&mut self) -> Duration {
        let duration = match self.attempt {
            0 => Duration::ZERO,
            // Jitter is applied after capping, so clamp again.
            _ => self
                .backoff
                .next_backoff()
                .unwrap_or(self.max_interval)
                .min(self.max_interval),
        };

        self.attempt += 1;
        duration
    }
}
