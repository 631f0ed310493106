use std::mem;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::{AggregationKey, MeasurementOptions, SingleMeasurement};

/// Accumulates counter increments per [`AggregationKey`].
///
/// The first increment of an identity seeds its value. Subsequent increments add to it and
/// back-fill `time` and `period` only while they are still unset, so the first sample that
/// carries either of them wins.
///
/// All methods take `&self`, the collector synchronizes internally and can be shared between
/// threads.
#[derive(Debug, Default)]
pub struct CounterCollector {
    entries: Mutex<IndexMap<AggregationKey, SingleMeasurement>>,
}

impl CounterCollector {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `amount` to the counter identified by name, tags and source.
    ///
    /// Never fails. Names and tags are stored as given and sanitized on [`flush`](Self::flush).
    pub fn increment(&self, name: &str, amount: f64, options: MeasurementOptions) {
        let key = AggregationKey::new(name, options.tags.as_ref(), options.source.as_deref());

        let mut entries = self.entries.lock();
        match entries.get_mut(&key) {
            Some(entry) => {
                entry.value += amount;
                entry.time = entry.time.or(options.time);
                entry.period = entry.period.or(options.period);
            }
            None => {
                let entry = SingleMeasurement::new(name.to_owned(), amount, options);
                entries.insert(key, entry);
            }
        }
    }

    /// Returns the number of distinct identities recorded since the last flush.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing has been recorded since the last flush.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drains all counters in the order their identities were first recorded.
    ///
    /// The internal map is swapped out under the lock, so every increment lands either in this
    /// flush or in the next one. Sanitization happens after the lock is released.
    pub fn flush(&self) -> Vec<SingleMeasurement> {
        let entries = mem::take(&mut *self.entries.lock());

        librato_log::trace!("flushing {} counters", entries.len());
        entries
            .into_values()
            .map(SingleMeasurement::sanitized)
            .collect()
    }
}
