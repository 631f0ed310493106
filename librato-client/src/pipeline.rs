use std::sync::Arc;

use librato_config::Config;
use librato_log::LogError;
use librato_metrics::{CounterCollector, GaugeCollector, MetricsBatch};
use tokio::time::Instant;

use crate::{ClientEvent, EventPublisher, SendError, Sender};

/// Delivery capabilities of an initialized client.
#[derive(Clone, Debug)]
pub(crate) struct Setup {
    pub config: Arc<Config>,
    /// `None` in simulate mode, where nothing is ever sent.
    pub sender: Option<Arc<dyn Sender>>,
}

/// Drains both collectors and hands the result to the [`Sender`].
///
/// Flushes are serialized: a flush waits for a running flush to complete before it drains the
/// collectors. Delivery failures are logged and published, never returned.
#[derive(Debug)]
pub(crate) struct FlushPipeline {
    pub counters: CounterCollector,
    pub gauges: GaugeCollector,
    pub events: EventPublisher,
    lock: tokio::sync::Mutex<()>,
}

impl FlushPipeline {
    pub fn new() -> Self {
        Self {
            counters: CounterCollector::new(),
            gauges: GaugeCollector::new(),
            events: EventPublisher::new(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Returns the number of identities recorded since the last flush.
    pub fn pending(&self) -> usize {
        self.counters.len() + self.gauges.len()
    }

    /// Runs one drain-and-send cycle.
    ///
    /// Without a setup, nothing is drained and an error is published. In simulate mode this is a
    /// no-op and the collectors keep their contents.
    pub async fn flush(&self, setup: Option<&Setup>) {
        let Some(setup) = setup else {
            librato_log::error!("flush failed: {}", SendError::NotInitialized);
            self.events.error(SendError::NotInitialized);
            return;
        };

        let Some(ref sender) = setup.sender else {
            librato_log::trace!("simulate mode, skipping flush");
            return;
        };

        let _guard = self.lock.lock().await;

        let batch = MetricsBatch::new(self.counters.flush(), self.gauges.flush());
        if batch.is_empty() {
            librato_log::trace!("nothing to flush");
            return;
        }

        let Some(credentials) = setup.config.credentials() else {
            librato_log::error!(
                "dropping {} measurements: {}",
                batch.len(),
                SendError::NoCredentials
            );
            self.events.error(SendError::NoCredentials);
            return;
        };

        let batch = Arc::new(batch);
        self.events.publish(ClientEvent::Sending(Arc::clone(&batch)));

        let start = Instant::now();
        match sender.send_metrics(&credentials, &batch).await {
            Ok(()) => {
                let duration = start.elapsed();
                librato_log::debug!(
                    "sent {} measurements in {}ms",
                    batch.len(),
                    duration.as_millis()
                );
                self.events.publish(ClientEvent::Sent { batch, duration });
            }
            Err(error) => {
                librato_log::error!(
                    "failed to send {} measurements: {}",
                    batch.len(),
                    LogError(&error)
                );
                self.events.error(error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use librato_metrics::MeasurementOptions;
    use tokio::sync::broadcast::error::TryRecvError;

    use super::*;
    use crate::testutils::MockSender;

    fn setup(config: Config, sender: &Arc<MockSender>) -> Setup {
        let sender = (!config.simulate_enabled()).then(|| Arc::clone(sender) as Arc<dyn Sender>);
        Setup {
            config: Arc::new(config),
            sender,
        }
    }

    fn credentials() -> Config {
        Config::with_credentials("ops@example.com", "secret")
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_sends_and_publishes() {
        librato_test::setup();

        let sender = Arc::new(MockSender::new());
        sender.delay(Duration::from_millis(250));
        let setup = setup(credentials(), &sender);

        let pipeline = FlushPipeline::new();
        let mut events = pipeline.events.subscribe();
        pipeline
            .counters
            .increment("foo", 1.0, MeasurementOptions::new());
        pipeline.gauges.measure("bar", 2.0, MeasurementOptions::new());

        pipeline.flush(Some(&setup)).await;

        assert_eq!(sender.batches().len(), 1);
        assert_eq!(pipeline.pending(), 0);

        let ClientEvent::Sending(sending) = events.recv().await.unwrap() else {
            panic!("expected sending event");
        };
        assert_eq!(sending.len(), 2);

        let ClientEvent::Sent { batch, duration } = events.recv().await.unwrap() else {
            panic!("expected sent event");
        };
        assert_eq!(batch, sending);
        assert_eq!(duration, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_empty_flush_skips_send() {
        let sender = Arc::new(MockSender::new());
        let setup = setup(credentials(), &sender);

        let pipeline = FlushPipeline::new();
        let mut events = pipeline.events.subscribe();
        pipeline.flush(Some(&setup)).await;

        assert!(sender.batches().is_empty());
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_missing_credentials_drops_batch() {
        let sender = Arc::new(MockSender::new());
        let setup = setup(Config::default(), &sender);

        let pipeline = FlushPipeline::new();
        let mut events = pipeline.events.subscribe();
        pipeline
            .counters
            .increment("foo", 1.0, MeasurementOptions::new());

        pipeline.flush(Some(&setup)).await;

        assert!(sender.batches().is_empty());
        assert_eq!(pipeline.pending(), 0);
        let ClientEvent::Error(error) = events.try_recv().unwrap() else {
            panic!("expected error event");
        };
        assert!(matches!(*error, SendError::NoCredentials));
    }

    #[tokio::test]
    async fn test_simulate_keeps_collectors() {
        let sender = Arc::new(MockSender::new());
        let setup = setup(Config::simulate(), &sender);

        let pipeline = FlushPipeline::new();
        pipeline.gauges.measure("foo", 1.0, MeasurementOptions::new());

        pipeline.flush(Some(&setup)).await;
        pipeline.flush(Some(&setup)).await;

        assert!(sender.batches().is_empty());
        assert_eq!(pipeline.pending(), 1);
    }

    #[tokio::test]
    async fn test_not_initialized() {
        let pipeline = FlushPipeline::new();
        let mut events = pipeline.events.subscribe();
        pipeline.gauges.measure("foo", 1.0, MeasurementOptions::new());

        pipeline.flush(None).await;

        assert_eq!(pipeline.pending(), 1);
        let ClientEvent::Error(error) = events.try_recv().unwrap() else {
            panic!("expected error event");
        };
        assert!(matches!(*error, SendError::NotInitialized));
    }

    #[tokio::test]
    async fn test_send_failure_publishes_error() {
        let sender = Arc::new(MockSender::new());
        sender.fail_next(crate::StatusCode::BAD_REQUEST);
        let setup = setup(credentials(), &sender);

        let pipeline = FlushPipeline::new();
        let mut events = pipeline.events.subscribe();
        pipeline
            .counters
            .increment("foo", 1.0, MeasurementOptions::new());

        pipeline.flush(Some(&setup)).await;

        assert!(matches!(
            events.try_recv().unwrap(),
            ClientEvent::Sending(_)
        ));
        let ClientEvent::Error(error) = events.try_recv().unwrap() else {
            panic!("expected error event");
        };
        assert_eq!(error.to_string(), "request failed with status 400 Bad Request");

        // The failed batch is not requeued.
        pipeline.flush(Some(&setup)).await;
        assert_eq!(sender.batches().len(), 1);
    }
}
