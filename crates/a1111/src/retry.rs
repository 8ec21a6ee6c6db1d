//! Retry policies for calls to the backing service.
//!
//! Two independent layers exist and are never stacked:
//!
//! * [`TransportRetry`] re-sends GET requests that hit a connection failure
//!   or a 502/503/504 status, with exponential backoff.
//! * [`FixedRetry`] re-sends POST requests on any error with a fixed pause.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use crate::sleep::Sleeper;

/// Status codes the transport layer treats as transient.
pub const RETRY_STATUSES: [u16; 3] = [502, 503, 504];

/// Upper bound on a single transport backoff delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(120);

/// Exponential backoff for the GET transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportRetry {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub backoff_factor: Duration,
}

impl Default for TransportRetry {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            backoff_factor: Duration::from_millis(100),
        }
    }
}

impl TransportRetry {
    /// Delay before retry number `retry` (1-based).
    ///
    /// The first retry is immediate; after that the delay is
    /// `factor * 2^(retry - 1)`, clamped to [`MAX_BACKOFF`].
    pub fn delay_for(&self, retry: u32) -> Duration {
        if retry <= 1 {
            return Duration::ZERO;
        }
        let exp = 2u32.saturating_pow(retry - 1);
        self.backoff_factor.saturating_mul(exp).min(MAX_BACKOFF)
    }

    pub fn is_retryable_status(status: u16) -> bool {
        RETRY_STATUSES.contains(&status)
    }
}

/// Fixed-delay retry for the POST layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedRetry {
    /// Total attempts including the first one.
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for FixedRetry {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

impl FixedRetry {
    /// Run `op` until it succeeds or the attempts run out, sleeping
    /// `delay` between attempts. Returns the last error on exhaustion.
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, sleeper: &dyn Sleeper, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;

        loop {
            match op(attempt).await {
                Ok(v) => return Ok(v),
                Err(e) if attempt < attempts => {
                    tracing::warn!(attempt, error = %e, "Request failed, retrying");
                    sleeper.sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
