use indexmap::IndexMap;
use librato_common::UnixTimestamp;
use serde::{Deserialize, Serialize};

use crate::sanitize;

/// Key/value dimensions attached to a measurement.
///
/// Tags keep their insertion order, which is also the order in which they contribute to the
/// [`AggregationKey`](crate::AggregationKey).
pub type Tags = IndexMap<String, String>;

/// Optional properties of a recorded measurement.
///
/// All fields are optional. Use the builder methods to construct options inline:
///
/// ```
/// use librato_metrics::MeasurementOptions;
///
/// let options = MeasurementOptions::new()
///     .tag("region", "us-east-1")
///     .source("web-1")
///     .period(60);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeasurementOptions {
    /// The time at which the measurement was recorded.
    pub time: Option<UnixTimestamp>,
    /// The metric period in seconds, used by the backend for service-side aggregation.
    pub period: Option<u64>,
    /// Dimensions of the data stream.
    pub tags: Option<Tags>,
    /// Legacy single-dimension label of the data stream.
    pub source: Option<String>,
}

impl MeasurementOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the time of the measurement.
    pub fn time(mut self, time: UnixTimestamp) -> Self {
        self.time = Some(time);
        self
    }

    /// Sets the metric period in seconds.
    pub fn period(mut self, period: u64) -> Self {
        self.period = Some(period);
        self
    }

    /// Adds a single tag, preserving previously added tags.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags
            .get_or_insert_with(Tags::new)
            .insert(key.into(), value.into());
        self
    }

    /// Replaces all tags.
    pub fn tags(mut self, tags: Tags) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Sets the source.
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// A single measured value.
///
/// Counters are always emitted in this shape. Gauges are emitted in this shape if exactly one
/// sample was recorded for their identity within a period.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SingleMeasurement {
    /// The name of the metric.
    pub name: String,
    /// The measured value. For counters, this is the sum of all increments.
    pub value: f64,
    /// Unix time in seconds at which the measurement was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<UnixTimestamp>,
    /// The metric period in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<u64>,
    /// Legacy single-dimension label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Dimensions of the data stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
}

impl SingleMeasurement {
    pub(crate) fn new(name: String, value: f64, options: MeasurementOptions) -> Self {
        let MeasurementOptions {
            time,
            period,
            tags,
            source,
        } = options;

        Self {
            name,
            value,
            time,
            period,
            source,
            tags,
        }
    }

    /// Returns a copy with the name, source and tags sanitized for the backend.
    pub(crate) fn sanitized(self) -> Self {
        Self {
            name: sanitize::sanitize_name(&self.name),
            source: self.source.as_deref().map(sanitize::sanitize_name),
            tags: self.tags.as_ref().map(sanitize::sanitize_tags),
            ..self
        }
    }
}

/// A statistical summary of multiple gauge samples sharing one identity.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct GaugeAggregate {
    /// The name of the metric.
    pub name: String,
    /// The number of samples.
    pub count: u64,
    /// The sum of all samples, in arrival order.
    pub sum: f64,
    /// The smallest sample.
    pub min: f64,
    /// The largest sample.
    pub max: f64,
    /// The most recently recorded sample.
    pub last: f64,
    /// The population standard deviation of all samples.
    pub stddev: f64,
    /// Unix time in seconds, taken from the first sample that carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<UnixTimestamp>,
    /// The metric period in seconds, taken from the first sample that carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<u64>,
    /// Legacy single-dimension label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Dimensions of the data stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
}

impl GaugeAggregate {
    pub(crate) fn sanitized(self) -> Self {
        Self {
            name: sanitize::sanitize_name(&self.name),
            source: self.source.as_deref().map(sanitize::sanitize_name),
            tags: self.tags.as_ref().map(sanitize::sanitize_tags),
            ..self
        }
    }
}

/// A flushed gauge, either a single sample or an aggregate of several.
///
/// Serializes without a tag: the backend distinguishes the two shapes by the presence of the
/// `value` or `count` fields.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum GaugeMeasurement {
    /// Exactly one sample was recorded in the period.
    Single(SingleMeasurement),
    /// Two or more samples were recorded in the period.
    Aggregate(GaugeAggregate),
}

impl GaugeMeasurement {
    /// Returns the sanitized name of this measurement.
    pub fn name(&self) -> &str {
        match self {
            Self::Single(single) => &single.name,
            Self::Aggregate(aggregate) => &aggregate.name,
        }
    }
}
