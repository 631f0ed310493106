use serde::{Deserialize, Serialize};

use crate::{GaugeMeasurement, SingleMeasurement};

/// The drained contents of both collectors, sent to the backend as one request body.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct MetricsBatch {
    /// Flushed counters.
    #[serde(default)]
    pub counters: Vec<SingleMeasurement>,
    /// Flushed gauges, either single samples or aggregates.
    #[serde(default)]
    pub gauges: Vec<GaugeMeasurement>,
}

impl MetricsBatch {
    /// Creates a batch from the output of both collectors.
    pub fn new(counters: Vec<SingleMeasurement>, gauges: Vec<GaugeMeasurement>) -> Self {
        Self { counters, gauges }
    }

    /// Returns `true` if the batch contains neither counters nor gauges.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty() && self.gauges.is_empty()
    }

    /// Returns the total number of measurements in the batch.
    pub fn len(&self) -> usize {
        self.counters.len() + self.gauges.len()
    }
}

#[cfg(test)]
mod tests {
    use librato_common::UnixTimestamp;

    use super::*;
    use crate::{CounterCollector, GaugeCollector, MeasurementOptions};

    #[test]
    fn test_batch_payload() {
        let counters = CounterCollector::new();
        let gauges = GaugeCollector::new();

        let options = MeasurementOptions::new()
            .time(UnixTimestamp::from_secs(1_700_000_000))
            .period(60);

        counters.increment("requests", 1.0, options.clone().tag("route", "/"));
        counters.increment("requests", 2.0, options.clone().tag("route", "/"));
        gauges.measure("latency", 12.5, options.clone().source("web-1"));
        gauges.measure("queue", 42.0, options.clone());
        gauges.measure("queue", 24.0, options);

        let batch = MetricsBatch::new(counters.flush(), gauges.flush());
        assert_eq!(batch.len(), 3);

        insta::assert_json_snapshot!(batch, @r#"
        {
          "counters": [
            {
              "name": "requests",
              "value": 3.0,
              "time": 1700000000,
              "period": 60,
              "tags": {
                "route": "/"
              }
            }
          ],
          "gauges": [
            {
              "name": "latency",
              "value": 12.5,
              "time": 1700000000,
              "period": 60,
              "source": "web-1"
            },
            {
              "name": "queue",
              "count": 2,
              "sum": 66.0,
              "min": 24.0,
              "max": 42.0,
              "last": 24.0,
              "stddev": 9.0,
              "time": 1700000000,
              "period": 60
            }
          ]
        }
        "#);
    }

    #[test]
    fn test_batch_parses_both_gauge_shapes() {
        let json = r#"{
            "gauges": [
                {"name": "a", "value": 1.0},
                {"name": "b", "count": 2, "sum": 3.0, "min": 1.0, "max": 2.0, "last": 2.0, "stddev": 0.5}
            ]
        }"#;

        let batch: MetricsBatch = serde_json::from_str(json).unwrap();
        assert!(batch.counters.is_empty());
        assert!(matches!(batch.gauges[0], GaugeMeasurement::Single(_)));
        assert!(matches!(batch.gauges[1], GaugeMeasurement::Aggregate(_)));
    }

    #[test]
    fn test_empty_batch() {
        let batch = MetricsBatch::default();
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
    }
}
