use std::sync::Arc;

use librato_config::Config;
use librato_log::LogError;
use librato_metrics::MeasurementOptions;
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::pipeline::{FlushPipeline, Setup};
use crate::scheduler::Scheduler;
use crate::{Annotation, ClientEvent, Clock, HttpSender, SendError, Sender, SystemClock};

/// Configures the collaborators of a [`Librato`] client.
///
/// Most applications use [`Librato::new`]. The builder allows replacing the wall clock and the
/// transport, for example in tests.
#[derive(Debug)]
pub struct LibratoBuilder {
    clock: Arc<dyn Clock>,
    sender: Option<Arc<dyn Sender>>,
}

impl LibratoBuilder {
    /// Reads the time from the given clock instead of the system clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Delivers data through the given sender instead of [`HttpSender`].
    pub fn sender(mut self, sender: Arc<dyn Sender>) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Creates the client.
    pub fn build(self) -> Librato {
        Librato {
            inner: Arc::new(Inner {
                pipeline: Arc::new(FlushPipeline::new()),
                scheduler: Scheduler::new(),
                clock: self.clock,
                sender: self.sender,
                setup: RwLock::new(None),
            }),
        }
    }
}

#[derive(Debug)]
struct Inner {
    pipeline: Arc<FlushPipeline>,
    scheduler: Scheduler,
    clock: Arc<dyn Clock>,
    sender: Option<Arc<dyn Sender>>,
    setup: RwLock<Option<Setup>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let pending = self.pipeline.pending();
        if pending > 0 {
            librato_log::warn!("dropping {pending} measurements that were never flushed");
        }
    }
}

/// A buffering metrics client.
///
/// Measurements are recorded synchronously into in-memory collectors and delivered in batches
/// at multiples of the configured flush period. Call [`init`](Self::init) to start periodic
/// delivery and [`end`](Self::end) to stop it and deliver the remaining data.
///
/// The client is cheap to clone. All clones share the same collectors and schedule.
///
/// Delivery never fails from the caller's point of view. Outcomes are logged and published as
/// [`ClientEvent`]s, see [`subscribe`](Self::subscribe).
///
/// # Example
///
/// ```no_run
/// use librato_client::{Config, Librato, MeasurementOptions};
///
/// # async fn run() {
/// let client = Librato::new();
/// client.init(Config::with_credentials("ops@example.com", "token"));
///
/// client.increment("requests");
/// client.measure_with("latency", 42.0, MeasurementOptions::new().tag("route", "/"));
///
/// client.end().await;
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Librato {
    inner: Arc<Inner>,
}

impl Librato {
    /// Creates a client that reads the system clock and sends over HTTP.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Returns a builder to replace the clock or the sender.
    pub fn builder() -> LibratoBuilder {
        LibratoBuilder {
            clock: Arc::new(SystemClock),
            sender: None,
        }
    }

    /// Applies the configuration and starts periodic delivery.
    ///
    /// Calling this again replaces the configuration and restarts the schedule. Measurements
    /// recorded before initialization are kept and sent with the first flush. In simulate mode,
    /// no schedule is started and nothing is ever sent.
    ///
    /// Unless simulate mode is enabled, this must be called from within a Tokio runtime.
    pub fn init(&self, config: Config) {
        if config.simulate_enabled() {
            librato_log::debug!("simulate mode enabled, metrics will not be sent");
            *self.inner.setup.write() = Some(Setup {
                config: Arc::new(config),
                sender: None,
            });
            // The flush task completes an in-progress send and publishes its outcome.
            self.inner.scheduler.stop();
            return;
        }

        let sender = match self.inner.sender {
            Some(ref sender) => Arc::clone(sender),
            None => match HttpSender::new(&config) {
                Ok(sender) => Arc::new(sender),
                Err(error) => {
                    librato_log::error!("failed to create http sender: {}", LogError(&error));
                    self.inner.pipeline.events.error(error);
                    return;
                }
            },
        };

        if config.credentials().is_none() {
            librato_log::warn!("{}", SendError::NoCredentials);
        }

        let setup = Setup {
            config: Arc::new(config),
            sender: Some(sender),
        };
        *self.inner.setup.write() = Some(setup.clone());

        librato_log::debug!(
            "sending metrics every {}ms",
            setup.config.flush_period().as_millis()
        );
        self.inner.scheduler.start(
            Arc::clone(&self.inner.pipeline),
            Arc::clone(&self.inner.clock),
            setup,
        );
    }

    /// Increments a counter by one.
    pub fn increment(&self, name: &str) {
        self.increment_with(name, 1.0, MeasurementOptions::new());
    }

    /// Increments a counter by the given amount.
    pub fn increment_by(&self, name: &str, amount: f64) {
        self.increment_with(name, amount, MeasurementOptions::new());
    }

    /// Increments a counter by the given amount with explicit options.
    ///
    /// All increments with the same name, tags and source within one period are summed up.
    pub fn increment_with(&self, name: &str, amount: f64, options: MeasurementOptions) {
        let (name, options) = self.resolve(name, options);
        self.inner.pipeline.counters.increment(&name, amount, options);
    }

    /// Records a gauge sample.
    pub fn measure(&self, name: &str, value: f64) {
        self.measure_with(name, value, MeasurementOptions::new());
    }

    /// Records a gauge sample with explicit options.
    ///
    /// All samples with the same name, tags and source within one period are summarized into
    /// count, sum, min, max, last and standard deviation.
    pub fn measure_with(&self, name: &str, value: f64, options: MeasurementOptions) {
        let (name, options) = self.resolve(name, options);
        self.inner.pipeline.gauges.measure(&name, value, options);
    }

    /// Applies the configured prefix and defaults to a measurement.
    fn resolve(&self, name: &str, mut options: MeasurementOptions) -> (String, MeasurementOptions) {
        let setup = self.inner.setup.read();
        let config = setup.as_ref().map(|setup| &setup.config);

        if options.source.is_none() {
            options.source = config.and_then(|c| c.source()).map(str::to_owned);
        }
        if options.time.is_none() {
            options.time = Some(self.inner.clock.now().as_timestamp());
        }

        let name = match config.and_then(|c| c.prefix()) {
            Some(prefix) => format!("{prefix}{name}"),
            None => name.to_owned(),
        };

        (name, options)
    }

    fn setup(&self) -> Option<Setup> {
        self.inner.setup.read().clone()
    }

    /// Sends all pending measurements now.
    ///
    /// Waits for a running flush to complete first. Resolves once the batch has been delivered or
    /// discarded.
    pub async fn flush(&self) {
        self.inner.pipeline.flush(self.setup().as_ref()).await;
    }

    /// Stops periodic delivery and sends all pending measurements.
    ///
    /// Waits for an in-progress flush to complete, then flushes exactly once. The client can be
    /// started again with [`init`](Self::init).
    pub async fn end(&self) {
        if let Some(handle) = self.inner.scheduler.stop() {
            if let Err(error) = handle.await {
                librato_log::error!("flush task failed: {}", LogError(&error));
            }
        }

        self.flush().await;
    }

    /// Files an annotation for an out-of-band event, such as a deployment.
    ///
    /// Annotations are sent immediately and are not affected by the flush schedule.
    pub async fn annotate(&self, title: &str, annotation: Annotation) {
        let Some(setup) = self.setup() else {
            librato_log::error!("annotation failed: {}", SendError::NotInitialized);
            self.inner.pipeline.events.error(SendError::NotInitialized);
            return;
        };

        let Some(sender) = setup.sender else {
            librato_log::trace!("simulate mode, skipping annotation");
            return;
        };

        let Some(credentials) = setup.config.credentials() else {
            librato_log::error!("annotation failed: {}", SendError::NoCredentials);
            self.inner.pipeline.events.error(SendError::NoCredentials);
            return;
        };

        let request = annotation.into_request(title, self.inner.clock.now().as_timestamp());
        let result = sender
            .send_annotation(&credentials, &request.stream, &request.payload)
            .await;

        if let Err(error) = result {
            librato_log::error!(
                "failed to send annotation to stream {}: {}",
                request.stream,
                LogError(&error)
            );
            self.inner.pipeline.events.error(error);
        }
    }

    /// Subscribes to [`ClientEvent`]s published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.pipeline.events.subscribe()
    }

    /// Returns the number of counter and gauge identities waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.inner.pipeline.pending()
    }

    /// Returns `true` if periodic delivery is active.
    pub fn is_running(&self) -> bool {
        self.inner.scheduler.is_running()
    }
}

impl Default for Librato {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use librato_common::{UnixMillis, UnixTimestamp};
    use librato_metrics::{GaugeMeasurement, MetricsBatch};
    use tokio::sync::broadcast::error::TryRecvError;

    use super::*;
    use crate::testutils::{MockSender, config_with_period};
    use crate::{AnnotationLink, ManualClock, StatusCode};

    const PERIOD: Duration = Duration::from_secs(60);

    fn client() -> (Librato, Arc<MockSender>, ManualClock) {
        librato_test::setup();

        let clock = ManualClock::new(UnixMillis::from_millis(1_700_000_010_000));
        let sender = Arc::new(MockSender::with_clock(Arc::new(clock.clone())));
        let client = Librato::builder()
            .clock(Arc::new(clock.clone()))
            .sender(Arc::clone(&sender) as Arc<dyn Sender>)
            .build();

        (client, sender, clock)
    }

    fn config(json: serde_json::Value) -> Config {
        Config::from_json_value(json).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_records_before_init() {
        let (client, sender, _) = client();

        client.increment("early");
        client.measure("early.gauge", 1.0);
        assert_eq!(client.pending(), 2);

        client.init(config_with_period(PERIOD));
        tokio::time::sleep(Duration::from_secs(50)).await;

        assert_eq!(
            sender.sent_at(),
            vec![UnixMillis::from_millis(1_700_000_040_000)]
        );
        assert_eq!(sender.batches()[0].len(), 2);
        assert_eq!(client.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_defaults_applied_at_record_time() {
        let (client, sender, clock) = client();
        client.init(config(serde_json::json!({
            "credentials": {"email": "ops@example.com", "token": "secret"},
            "metrics": {"prefix": "app.", "source": "web-1"},
        })));

        client.increment("requests");
        clock.skew(Duration::from_secs(5));
        client.increment_with(
            "requests",
            2.0,
            MeasurementOptions::new().source("web-2"),
        );
        client.measure_with(
            "latency",
            20.0,
            MeasurementOptions::new().time(UnixTimestamp::from_secs(42)),
        );
        client.end().await;

        insta::assert_json_snapshot!(sender.batches(), @r#"
        [
          {
            "counters": [
              {
                "name": "app.requests",
                "value": 1.0,
                "time": 1700000010,
                "source": "web-1"
              },
              {
                "name": "app.requests",
                "value": 2.0,
                "time": 1700000015,
                "source": "web-2"
              }
            ],
            "gauges": [
              {
                "name": "app.latency",
                "value": 20.0,
                "time": 42,
                "source": "web-1"
              }
            ]
          }
        ]
        "#);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gauge_aggregation_end_to_end() {
        let (client, sender, _) = client();
        client.init(Config::with_credentials("ops@example.com", "secret"));

        client.measure("queue", 42.0);
        client.measure("queue", 24.0);
        client.measure("single", 7.0);
        client.flush().await;

        let batches = sender.batches();
        let MetricsBatch { gauges, .. } = &batches[0];
        let GaugeMeasurement::Aggregate(ref queue) = gauges[0] else {
            panic!("expected aggregate");
        };
        assert_eq!(queue.count, 2);
        assert_eq!(queue.stddev, 9.0);
        assert!(matches!(gauges[1], GaugeMeasurement::Single(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_flushes_once_and_stops() {
        let (client, sender, _) = client();
        client.init(config_with_period(PERIOD));
        assert!(client.is_running());

        client.increment("requests");
        client.end().await;
        assert!(!client.is_running());
        assert_eq!(sender.batches().len(), 1);

        client.increment("requests");
        tokio::time::sleep(PERIOD * 3).await;

        assert_eq!(sender.batches().len(), 1);
        assert_eq!(client.pending(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_end() {
        let (client, sender, _) = client();
        client.init(config_with_period(PERIOD));
        client.end().await;

        client.init(config_with_period(PERIOD));
        client.increment("requests");
        tokio::time::sleep(PERIOD).await;

        assert_eq!(
            sender.sent_at(),
            vec![UnixMillis::from_millis(1_700_000_040_000)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulate_never_sends() {
        let (client, sender, _) = client();
        client.init(Config::simulate());
        assert!(!client.is_running());

        client.increment("requests");
        client
            .annotate("deploy", Annotation::new().description("v2"))
            .await;
        tokio::time::sleep(PERIOD * 2).await;
        client.end().await;

        assert!(sender.batches().is_empty());
        assert!(sender.annotations().is_empty());
        assert_eq!(client.pending(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_to_simulate_during_send() {
        let (client, sender, _) = client();
        sender.delay(Duration::from_secs(5));
        client.init(config_with_period(PERIOD));
        let mut events = client.subscribe();

        client.increment("requests");
        // The flush starts at +50s and completes at +55s.
        tokio::time::sleep(Duration::from_secs(52)).await;
        client.init(Config::simulate());
        assert!(!client.is_running());

        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(matches!(events.try_recv(), Ok(ClientEvent::Sending(_))));
        let Ok(ClientEvent::Sent { batch, .. }) = events.try_recv() else {
            panic!("expected sent event");
        };
        assert_eq!(batch.len(), 1);
        assert_eq!(sender.batches().len(), 1);

        client.increment("requests");
        client.end().await;
        assert_eq!(sender.batches().len(), 1);
        assert_eq!(client.pending(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_events() {
        let (client, sender, _) = client();
        sender.fail_next(StatusCode::UNAUTHORIZED);
        client.init(Config::with_credentials("ops@example.com", "wrong"));
        let mut events = client.subscribe();

        client.increment("requests");
        client.flush().await;

        assert!(matches!(events.try_recv(), Ok(ClientEvent::Sending(_))));
        let Ok(ClientEvent::Error(error)) = events.try_recv() else {
            panic!("expected error event");
        };
        assert!(matches!(*error, SendError::Status(StatusCode::UNAUTHORIZED)));
        assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_not_initialized() {
        let (client, sender, _) = client();
        let mut events = client.subscribe();

        client.increment("requests");
        client.flush().await;
        client.annotate("deploy", Annotation::new()).await;

        for _ in 0..2 {
            let Ok(ClientEvent::Error(error)) = events.try_recv() else {
                panic!("expected error event");
            };
            assert!(matches!(*error, SendError::NotInitialized));
        }
        assert!(sender.batches().is_empty());
        assert_eq!(client.pending(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_annotate() {
        let (client, sender, _) = client();
        client.init(Config::with_credentials("ops@example.com", "secret"));

        client
            .annotate(
                "Deploy API",
                Annotation::new()
                    .description("v2")
                    .link(AnnotationLink::new("https://ci.example.com/1")),
            )
            .await;
        client
            .annotate("Deploy API", Annotation::new().stream_name("deployments"))
            .await;

        let annotations = sender.annotations();
        assert_eq!(annotations[0].0, "deploy_api");
        assert_eq!(annotations[1].0, "deployments");
        insta::assert_json_snapshot!(annotations[0].1, @r#"
        {
          "title": "Deploy API",
          "description": "v2",
          "start_time": 1700000010,
          "links": [
            {
              "href": "https://ci.example.com/1"
            }
          ]
        }
        "#);
    }

    #[tokio::test(start_paused = true)]
    async fn test_annotate_failure_publishes_error() {
        let (client, sender, _) = client();
        sender.fail_next(StatusCode::BAD_REQUEST);
        client.init(Config::with_credentials("ops@example.com", "secret"));
        let mut events = client.subscribe();

        client.annotate("deploy", Annotation::new()).await;

        let Ok(ClientEvent::Error(error)) = events.try_recv() else {
            panic!("expected error event");
        };
        assert!(matches!(*error, SendError::Status(StatusCode::BAD_REQUEST)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_state() {
        let (client, sender, _) = client();
        client.init(Config::with_credentials("ops@example.com", "secret"));

        let other = client.clone();
        other.increment("requests");
        client.increment("requests");
        client.end().await;

        let batches = sender.batches();
        assert_eq!(batches[0].counters[0].value, 2.0);
    }
}
