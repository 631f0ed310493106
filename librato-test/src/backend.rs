use std::collections::VecDeque;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A request received by the [`MockBackend`].
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    /// The HTTP method, such as `POST`.
    pub method: Method,
    /// The request path, including the API version prefix.
    pub path: String,
    /// The raw `Authorization` header.
    pub authorization: Option<String>,
    /// The raw `User-Agent` header.
    pub user_agent: Option<String>,
    /// The parsed JSON body, or [`Value::Null`] if the body was not JSON.
    pub body: Value,
}

#[derive(Debug, Default)]
struct BackendState {
    requests: Mutex<Vec<RecordedRequest>>,
    responses: Mutex<VecDeque<StatusCode>>,
    delay: Mutex<Option<Duration>>,
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

async fn record(
    State(state): State<Arc<BackendState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let request = RecordedRequest {
        method,
        path: uri.path().to_owned(),
        authorization: header_str(&headers, header::AUTHORIZATION),
        user_agent: header_str(&headers, header::USER_AGENT),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    };

    state.requests.lock().push(request);

    let delay = *state.delay.lock();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    state
        .responses
        .lock()
        .pop_front()
        .unwrap_or(StatusCode::OK)
}

/// An HTTP server standing in for the metrics API.
///
/// The backend records every request and answers with scripted status codes. Once the script is
/// exhausted, it answers `200 OK`. The server shuts down when the backend is dropped.
#[derive(Debug)]
pub struct MockBackend {
    address: SocketAddr,
    state: Arc<BackendState>,
    handle: JoinHandle<()>,
}

impl MockBackend {
    /// Binds to a random local port and starts serving.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn start() -> Self {
        let state = Arc::new(BackendState::default());
        let router = Router::new()
            .fallback(record)
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
            .await
            .expect("failed to bind mock backend");
        let address = listener
            .local_addr()
            .expect("mock backend has no local address");

        let handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .await
                .expect("mock backend failed");
        });

        Self {
            address,
            state,
            handle,
        }
    }

    /// Returns the API base URL of this backend, including a trailing slash.
    pub fn url(&self) -> String {
        format!("http://{}/v1/", self.address)
    }

    /// Queues status codes for the next responses, in order.
    pub fn respond_with(&self, statuses: impl IntoIterator<Item = u16>) {
        let mut responses = self.state.responses.lock();
        for status in statuses {
            let status = StatusCode::from_u16(status).expect("invalid status code");
            responses.push_back(status);
        }
    }

    /// Delays every response by the given duration.
    pub fn delay_responses(&self, delay: Duration) {
        *self.state.delay.lock() = Some(delay);
    }

    /// Returns all requests received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().clone()
    }

    /// Returns the number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.state.requests.lock().len()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
