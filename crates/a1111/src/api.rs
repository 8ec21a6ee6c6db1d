//! REST client for the Automatic1111 HTTP API.
//!
//! Forwards validated requests verbatim to `<base-uri>/<endpoint>` and
//! returns the parsed JSON body. Every attempt is bounded by the request
//! timeout; GET and POST each have their own retry layer (see
//! [`crate::retry`]).

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use sdrelay_core::endpoints::Method;

use crate::retry::{FixedRetry, TransportRetry};
use crate::sleep::{Sleeper, TokioSleeper};

/// Default per-attempt request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// HTTP client for the backing Automatic1111 instance.
///
/// Cheap to clone: the underlying [`reqwest::Client`] pool is shared.
#[derive(Clone)]
pub struct A1111Api {
    client: reqwest::Client,
    base_uri: String,
    timeout: Duration,
    transport: TransportRetry,
    post_retry: FixedRetry,
    sleeper: Arc<dyn Sleeper>,
}

/// Errors from the forwarding layer.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    /// The HTTP request itself failed (connect, timeout, body read) after
    /// the applicable retries.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Every transport-level attempt returned a transient status.
    #[error("A1111 API returned HTTP {status} after {attempts} attempts")]
    RetriesExhausted { status: u16, attempts: u32 },

    /// The response body was not JSON.
    #[error("Invalid response received from A1111 API: {body}")]
    InvalidResponse { body: String },
}

impl A1111Api {
    /// Create a client reusing an existing [`reqwest::Client`] pool.
    ///
    /// * `base_uri` - e.g. `http://127.0.0.1:3000`; a trailing `/` is trimmed.
    pub fn with_client(client: reqwest::Client, base_uri: impl Into<String>) -> Self {
        let base_uri = base_uri.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_uri,
            timeout: DEFAULT_TIMEOUT,
            transport: TransportRetry::default(),
            post_retry: FixedRetry::default(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_transport_retry(mut self, transport: TransportRetry) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_post_retry(mut self, post_retry: FixedRetry) -> Self {
        self.post_retry = post_retry;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Full URL for an endpoint path (no leading `/`).
    pub fn url_for(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_uri, endpoint)
    }

    /// Forward a request and parse the JSON response.
    ///
    /// The payload is sent as the JSON body for POST and ignored for GET.
    /// Any HTTP status is accepted as long as the body is JSON.
    pub async fn forward(
        &self,
        method: Method,
        endpoint: &str,
        payload: &Map<String, Value>,
    ) -> Result<Value, ForwardError> {
        let url = self.url_for(endpoint);
        let response = match method {
            Method::Get => self.get(&url).await?,
            Method::Post => self.post(&url, payload).await?,
        };
        Self::parse_response(response).await
    }

    /// GET with the transport retry layer.
    pub async fn get(&self, url: &str) -> Result<reqwest::Response, ForwardError> {
        let max_attempts = self.transport.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let delay = self.transport.delay_for(attempt);
            match self.client.get(url).timeout(self.timeout).send().await {
                Ok(response) if TransportRetry::is_retryable_status(response.status().as_u16()) => {
                    let status = response.status().as_u16();
                    if attempt >= max_attempts {
                        return Err(ForwardError::RetriesExhausted {
                            status,
                            attempts: attempt,
                        });
                    }
                    tracing::warn!(url, status, attempt, ?delay, "Transient status from A1111, retrying");
                }
                Ok(response) => return Ok(response),
                Err(e) if e.is_connect() && attempt < max_attempts => {
                    tracing::warn!(url, attempt, ?delay, error = %e, "Connection to A1111 failed, retrying");
                }
                Err(e) => return Err(e.into()),
            }

            self.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }

    /// POST with the fixed retry layer. Retries on any request error.
    pub async fn post(
        &self,
        url: &str,
        payload: &Map<String, Value>,
    ) -> Result<reqwest::Response, ForwardError> {
        let response = self
            .post_retry
            .run(self.sleeper.as_ref(), |_| {
                self.client
                    .post(url)
                    .json(payload)
                    .timeout(self.timeout)
                    .send()
            })
            .await?;
        Ok(response)
    }

    // ---- private helpers ----

    /// Read the body and parse it as JSON, keeping the raw text on failure.
    async fn parse_response(response: reqwest::Response) -> Result<Value, ForwardError> {
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(error = %e, "Failed to parse A1111 response as JSON");
            ForwardError::InvalidResponse { body }
        })
    }
}
