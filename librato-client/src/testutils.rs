use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use librato_common::UnixMillis;
use librato_config::{Config, Credentials};
use librato_metrics::MetricsBatch;
use parking_lot::Mutex;

use crate::{AnnotationPayload, Clock, SendError, Sender, StatusCode};

/// A [`Sender`] that records everything it is asked to send.
#[derive(Debug, Default)]
pub struct MockSender {
    clock: Option<Arc<dyn Clock>>,
    delay: Mutex<Duration>,
    failures: Mutex<VecDeque<StatusCode>>,
    batches: Mutex<Vec<MetricsBatch>>,
    sent_at: Mutex<Vec<UnixMillis>>,
    annotations: Mutex<Vec<(String, AnnotationPayload)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the clock time at which each batch send starts.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock: Some(clock),
            ..Self::default()
        }
    }

    pub fn delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn fail_next(&self, status: StatusCode) {
        self.failures.lock().push_back(status);
    }

    pub fn batches(&self) -> Vec<MetricsBatch> {
        self.batches.lock().clone()
    }

    pub fn sent_at(&self) -> Vec<UnixMillis> {
        self.sent_at.lock().clone()
    }

    pub fn annotations(&self) -> Vec<(String, AnnotationPayload)> {
        self.annotations.lock().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn respond(&self) -> Result<(), SendError> {
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match self.failures.lock().pop_front() {
            Some(status) => Err(SendError::Status(status)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Sender for MockSender {
    async fn send_metrics(
        &self,
        _credentials: &Credentials,
        batch: &MetricsBatch,
    ) -> Result<(), SendError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        if let Some(ref clock) = self.clock {
            self.sent_at.lock().push(clock.now());
        }
        self.batches.lock().push(batch.clone());

        let result = self.respond().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn send_annotation(
        &self,
        _credentials: &Credentials,
        stream: &str,
        annotation: &AnnotationPayload,
    ) -> Result<(), SendError> {
        self.annotations
            .lock()
            .push((stream.to_owned(), annotation.clone()));
        self.respond().await
    }
}

/// Creates a config with credentials and the given flush period.
pub fn config_with_period(period: Duration) -> Config {
    Config::from_json_value(serde_json::json!({
        "credentials": {"email": "ops@example.com", "token": "secret"},
        "metrics": {"period": period.as_millis() as u64},
    }))
    .unwrap()
}
