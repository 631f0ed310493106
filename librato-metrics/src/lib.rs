//! Measurement aggregation for the Librato metrics client.
//!
//! Application code records two kinds of metrics:
//!
//!  - **Counters** accumulate a running sum per identity within one collection period. See
//!    [`CounterCollector`].
//!  - **Gauges** record every sampled value per identity. At flush time, identities with more
//!    than one sample are reduced to a statistical summary. See [`GaugeCollector`].
//!
//! Samples are grouped by their [`AggregationKey`], which is derived from the measurement name,
//! its tags in insertion order and its source. Names, sources and tags are not validated when
//! recording. Instead, they are sanitized once when the collectors are flushed, see
//! [`sanitize`].
//!
//! # Example
//!
//! ```
//! use librato_metrics::{CounterCollector, GaugeCollector, MeasurementOptions, MetricsBatch};
//!
//! let counters = CounterCollector::new();
//! let gauges = GaugeCollector::new();
//!
//! counters.increment("requests", 1.0, MeasurementOptions::new());
//! counters.increment("requests", 2.0, MeasurementOptions::new());
//! gauges.measure("latency", 42.0, MeasurementOptions::new().tag("route", "/"));
//!
//! let batch = MetricsBatch::new(counters.flush(), gauges.flush());
//! assert_eq!(batch.counters[0].value, 3.0);
//! assert_eq!(batch.gauges.len(), 1);
//! ```
//!
//! # Wire Format
//!
//! A [`MetricsBatch`] serializes to the JSON body accepted by the metrics backend:
//!
//! ```json
//! {
//!   "counters": [{"name": "requests", "value": 3.0}],
//!   "gauges": [
//!     {"name": "latency", "value": 42.0, "tags": {"route": "/"}},
//!     {"name": "queue", "count": 2, "sum": 66.0, "min": 24.0, "max": 42.0, "last": 24.0, "stddev": 9.0}
//!   ]
//! }
//! ```

#![warn(missing_docs)]

mod batch;
mod counter;
mod gauge;
mod key;
mod measurement;
pub mod sanitize;

pub use crate::batch::*;
pub use crate::counter::*;
pub use crate::gauge::*;
pub use crate::key::*;
pub use crate::measurement::*;
