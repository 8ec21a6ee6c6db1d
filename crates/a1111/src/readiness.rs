//! Readiness polling for the backing service.
//!
//! Before a request is forwarded, [`ReadinessProber::wait_until_ready`]
//! polls a fixed URL until anything answers. There is no upper bound: the
//! call returns once the service responds or never.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::sleep::{Sleeper, TokioSleeper};

/// Default delay between probes.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(2);

/// Default number of failed probes between progress notices.
pub const DEFAULT_LOG_EVERY: u64 = 15;

/// A single readiness check.
#[async_trait]
pub trait Probe: Send + Sync {
    /// `true` once the target responds at all.
    async fn probe(&self) -> bool;
}

/// Probes a URL with GET. Any HTTP response, including an error status,
/// counts as ready; only a transport failure counts as not ready.
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(url = %self.url, error = %e, "Readiness probe failed");
                false
            }
        }
    }
}

/// Polls a [`Probe`] until it succeeds.
#[derive(Clone)]
pub struct ReadinessProber {
    probe: Arc<dyn Probe>,
    sleeper: Arc<dyn Sleeper>,
    interval: Duration,
    log_every: u64,
}

impl ReadinessProber {
    pub fn new(probe: Arc<dyn Probe>) -> Self {
        Self {
            probe,
            sleeper: Arc::new(TokioSleeper),
            interval: DEFAULT_PROBE_INTERVAL,
            log_every: DEFAULT_LOG_EVERY,
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Emit a progress notice every `log_every` failures (minimum 1).
    pub fn with_log_every(mut self, log_every: u64) -> Self {
        self.log_every = log_every.max(1);
        self
    }

    /// Block until the probe succeeds. Returns the number of failed probes
    /// that preceded success.
    pub async fn wait_until_ready(&self) -> u64 {
        let mut failures = 0u64;

        loop {
            if self.probe.probe().await {
                if failures > 0 {
                    tracing::info!(failures, "Service is ready");
                }
                return failures;
            }

            failures += 1;
            if failures % self.log_every == 0 {
                tracing::info!(failures, "Service not ready yet. Retrying...");
            }

            self.sleeper.sleep(self.interval).await;
        }
    }
}
