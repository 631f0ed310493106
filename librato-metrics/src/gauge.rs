use std::mem;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::{
    AggregationKey, GaugeAggregate, GaugeMeasurement, MeasurementOptions, SingleMeasurement,
};

/// Running statistics over a group of gauge samples.
///
/// Unlike `f64::min` and `f64::max`, a NaN sample poisons `min` and `max`.
#[derive(Clone, Copy, Debug, PartialEq)]
struct GaugeStats {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl GaugeStats {
    fn new(value: f64) -> Self {
        Self {
            count: 1,
            sum: value,
            min: value,
            max: value,
            last: value,
        }
    }

    fn insert(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = nan_min(self.min, value);
        self.max = nan_max(self.max, value);
        self.last = value;
    }

    fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }
}

fn nan_min(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.min(b)
    }
}

fn nan_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.max(b)
    }
}

/// Population standard deviation of `values` around `mean`.
fn population_stddev(values: impl Iterator<Item = f64>, mean: f64, count: u64) -> f64 {
    let squares: f64 = values.map(|v| (v - mean).powi(2)).sum();
    (squares / count as f64).sqrt()
}

/// Reduces a group of two or more samples to an aggregate.
///
/// Name, source and tags come from the first sample. Time and period come from the first
/// sample that carries them.
fn aggregate(first: SingleMeasurement, rest: Vec<SingleMeasurement>) -> GaugeAggregate {
    let mut stats = GaugeStats::new(first.value);
    for sample in &rest {
        stats.insert(sample.value);
    }

    let values = std::iter::once(first.value).chain(rest.iter().map(|s| s.value));
    let stddev = population_stddev(values, stats.mean(), stats.count);

    GaugeAggregate {
        name: first.name,
        count: stats.count,
        sum: stats.sum,
        min: stats.min,
        max: stats.max,
        last: stats.last,
        stddev,
        time: first.time.or_else(|| rest.iter().find_map(|s| s.time)),
        period: first.period.or_else(|| rest.iter().find_map(|s| s.period)),
        source: first.source,
        tags: first.tags,
    }
}

/// Records gauge samples per [`AggregationKey`].
///
/// Every sample is kept until the next flush, since `min`, `max` and `stddev` need the full set
/// of values. On flush, identities with a single sample are emitted unchanged as
/// [`GaugeMeasurement::Single`], while identities with two or more samples are reduced to a
/// [`GaugeMeasurement::Aggregate`].
#[derive(Debug, Default)]
pub struct GaugeCollector {
    groups: Mutex<IndexMap<AggregationKey, Vec<SingleMeasurement>>>,
}

impl GaugeCollector {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sample to the group identified by name, tags and source.
    pub fn measure(&self, name: &str, value: f64, options: MeasurementOptions) {
        let key = AggregationKey::new(name, options.tags.as_ref(), options.source.as_deref());
        let sample = SingleMeasurement::new(name.to_owned(), value, options);

        self.groups.lock().entry(key).or_default().push(sample);
    }

    /// Returns the number of distinct identities recorded since the last flush.
    pub fn len(&self) -> usize {
        self.groups.lock().len()
    }

    /// Returns `true` if nothing has been recorded since the last flush.
    pub fn is_empty(&self) -> bool {
        self.groups.lock().is_empty()
    }

    /// Drains all groups in the order their identities were first recorded.
    pub fn flush(&self) -> Vec<GaugeMeasurement> {
        let groups = mem::take(&mut *self.groups.lock());

        librato_log::trace!("flushing {} gauges", groups.len());
        groups
            .into_values()
            .filter_map(|samples| {
                let mut samples = samples.into_iter();
                let first = samples.next()?;
                let rest: Vec<_> = samples.collect();

                Some(if rest.is_empty() {
                    GaugeMeasurement::Single(first.sanitized())
                } else {
                    GaugeMeasurement::Aggregate(aggregate(first, rest).sanitized())
                })
            })
            .collect()
    }
}
