use std::sync::Arc;
use std::time::Duration;

use librato_metrics::MetricsBatch;
use tokio::sync::broadcast;

use crate::SendError;

/// Number of events buffered per subscriber before the oldest are dropped.
const EVENT_CAPACITY: usize = 64;

/// The outcome of asynchronous client operations.
///
/// Subscribe with [`Librato::subscribe`](crate::Librato::subscribe). Events are only delivered
/// to subscribers that exist when the event is published.
#[derive(Clone, Debug)]
pub enum ClientEvent {
    /// A non-empty batch is about to be sent.
    Sending(Arc<MetricsBatch>),
    /// A batch was accepted by the backend.
    Sent {
        /// The batch that was sent.
        batch: Arc<MetricsBatch>,
        /// Time spent sending, including all retries.
        duration: Duration,
    },
    /// Measurements or an annotation could not be delivered and were discarded.
    Error(Arc<SendError>),
}

/// Publishes [`ClientEvent`]s to all current subscribers.
#[derive(Debug)]
pub(crate) struct EventPublisher {
    tx: broadcast::Sender<ClientEvent>,
}

impl EventPublisher {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: ClientEvent) {
        // Fails only if there are no subscribers.
        self.tx.send(event).ok();
    }

    pub fn error(&self, error: SendError) {
        self.publish(ClientEvent::Error(Arc::new(error)));
    }
}
