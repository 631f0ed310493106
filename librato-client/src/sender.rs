use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use librato_common::RetryBackoff;
use librato_config::{Config, Credentials, UpstreamUrl};
use librato_metrics::MetricsBatch;
use reqwest::{Url, header};
use serde::Serialize;

use crate::{AnnotationPayload, SendError};

/// The `User-Agent` header sent with every request.
pub const USER_AGENT: &str = concat!("librato-rs/", env!("CARGO_PKG_VERSION"));

/// Delivers batches and annotations to the metrics backend.
///
/// Implementations are responsible for authentication and retries. Callers only ever observe a
/// single resolved outcome per call.
#[async_trait]
pub trait Sender: fmt::Debug + Send + Sync {
    /// Sends a batch of flushed measurements.
    async fn send_metrics(
        &self,
        credentials: &Credentials,
        batch: &MetricsBatch,
    ) -> Result<(), SendError>;

    /// Files an annotation under the given stream.
    async fn send_annotation(
        &self,
        credentials: &Credentials,
        stream: &str,
        annotation: &AnnotationPayload,
    ) -> Result<(), SendError>;
}

/// Sends requests to the metrics API over HTTP.
///
/// Failed attempts are retried with exponential backoff if [`SendError::is_retryable`]. Every
/// attempt is bounded by the configured HTTP timeout, and all attempts together by
/// [`Config::request_deadline`].
#[derive(Debug)]
pub struct HttpSender {
    client: reqwest::Client,
    upstream: UpstreamUrl,
    retry_count: u32,
    max_retry_interval: Duration,
    deadline: Duration,
}

impl HttpSender {
    /// Creates a sender from the HTTP section of the config.
    pub fn new(config: &Config) -> Result<Self, SendError> {
        let client = reqwest::ClientBuilder::new()
            .user_agent(USER_AGENT)
            .timeout(config.http_timeout())
            .build()?;

        Ok(Self {
            client,
            upstream: config.upstream().clone(),
            retry_count: config.http_retry_count(),
            max_retry_interval: config.http_max_retry_interval(),
            deadline: config.request_deadline(),
        })
    }

    async fn post_once(
        &self,
        credentials: &Credentials,
        url: &Url,
        body: &[u8],
    ) -> Result<(), SendError> {
        let response = self
            .client
            .post(url.clone())
            .basic_auth(&credentials.email, Some(&credentials.token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.to_vec())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(SendError::Status(status))
        }
    }

    async fn post_with_retry(
        &self,
        credentials: &Credentials,
        url: &Url,
        body: &[u8],
    ) -> Result<(), SendError> {
        let mut backoff = RetryBackoff::new(self.max_retry_interval);
        let max_attempts = self.retry_count as usize + 1;

        loop {
            let delay = backoff.next_backoff();
            if !delay.is_zero() {
                librato_log::debug!(
                    "retrying request to {} in {}ms",
                    url.path(),
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            match self.post_once(credentials, url, body).await {
                Ok(()) => return Ok(()),
                Err(error) if error.is_retryable() && backoff.attempt() < max_attempts => {
                    librato_log::warn!(
                        "attempt {} to {} failed: {}",
                        backoff.attempt(),
                        url.path(),
                        librato_log::LogError(&error)
                    );
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        credentials: &Credentials,
        path: &str,
        body: &T,
    ) -> Result<(), SendError> {
        let body = serde_json::to_vec(body)?;
        let url = self.upstream.join(path);

        tokio::time::timeout(
            self.deadline,
            self.post_with_retry(credentials, &url, &body),
        )
        .await
        .map_err(|_| SendError::Timeout(self.deadline))?
    }
}

#[async_trait]
impl Sender for HttpSender {
    async fn send_metrics(
        &self,
        credentials: &Credentials,
        batch: &MetricsBatch,
    ) -> Result<(), SendError> {
        self.post(credentials, "metrics", batch).await
    }

    async fn send_annotation(
        &self,
        credentials: &Credentials,
        stream: &str,
        annotation: &AnnotationPayload,
    ) -> Result<(), SendError> {
        self.post(credentials, &format!("annotations/{stream}"), annotation)
            .await
    }
}
