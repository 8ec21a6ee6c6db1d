use std::str::FromStr;
use std::time::Duration;

use sdrelay_core::sampler::DEFAULT_SCHEDULER_KEYWORDS;

/// Worker configuration loaded from environment variables.
///
/// Every field has a default suitable for a worker sitting next to a local
/// A1111 instance. Read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Backing service base URI, without a trailing `/`.
    pub a1111_base_uri: String,
    /// Path probed for readiness, relative to the base URI.
    pub ready_path: String,
    /// Per-attempt timeout for forwarded requests.
    pub request_timeout: Duration,
    /// POST-layer attempts.
    pub post_retries: u32,
    pub post_retry_delay: Duration,
    /// Transport-layer attempts for GET.
    pub transport_retries: u32,
    pub transport_backoff: Duration,
    pub probe_interval: Duration,
    pub probe_log_every: u64,
    pub scheduler_keywords: Vec<String>,
    /// Model registry base URL.
    pub registry_url: String,
    pub download_chunk_bytes: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                                      |
    /// |-------------------------|----------------------------------------------|
    /// | `A1111_BASE_URI`        | `http://127.0.0.1:3000`                      |
    /// | `A1111_READY_PATH`      | `sdapi/v1/options`                           |
    /// | `REQUEST_TIMEOUT_SECS`  | `600`                                        |
    /// | `POST_RETRIES`          | `3`                                          |
    /// | `POST_RETRY_DELAY_SECS` | `1`                                          |
    /// | `TRANSPORT_RETRIES`     | `10`                                         |
    /// | `TRANSPORT_BACKOFF_MS`  | `100`                                        |
    /// | `PROBE_INTERVAL_SECS`   | `2`                                          |
    /// | `PROBE_LOG_EVERY`       | `15`                                         |
    /// | `SCHEDULER_KEYWORDS`    | `karras,exponential,uniform,polyexponential` |
    /// | `HF_API_URL`            | `https://huggingface.co`                     |
    /// | `DOWNLOAD_CHUNK_BYTES`  | `8192`                                       |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let a1111_base_uri = lookup("A1111_BASE_URI")
            .unwrap_or_else(|| "http://127.0.0.1:3000".into())
            .trim_end_matches('/')
            .to_string();

        let ready_path = lookup("A1111_READY_PATH")
            .unwrap_or_else(|| "sdapi/v1/options".into())
            .trim_start_matches('/')
            .to_string();

        let request_timeout = Duration::from_secs(parse_var(
            &lookup,
            "REQUEST_TIMEOUT_SECS",
            600,
            "a whole number of seconds",
        )?);

        let post_retries: u32 = parse_var(&lookup, "POST_RETRIES", 3, "a positive integer")?;
        let post_retry_delay = Duration::from_secs(parse_var(
            &lookup,
            "POST_RETRY_DELAY_SECS",
            1,
            "a whole number of seconds",
        )?);

        let transport_retries: u32 =
            parse_var(&lookup, "TRANSPORT_RETRIES", 10, "a positive integer")?;
        let transport_backoff = Duration::from_millis(parse_var(
            &lookup,
            "TRANSPORT_BACKOFF_MS",
            100,
            "a whole number of milliseconds",
        )?);

        let probe_interval = Duration::from_secs(parse_var(
            &lookup,
            "PROBE_INTERVAL_SECS",
            2,
            "a whole number of seconds",
        )?);
        let probe_log_every: u64 = parse_var(&lookup, "PROBE_LOG_EVERY", 15, "a positive integer")?;

        let scheduler_keywords: Vec<String> = match lookup("SCHEDULER_KEYWORDS") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            None => DEFAULT_SCHEDULER_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };

        let registry_url = lookup("HF_API_URL")
            .unwrap_or_else(|| "https://huggingface.co".into())
            .trim_end_matches('/')
            .to_string();

        let download_chunk_bytes: usize =
            parse_var(&lookup, "DOWNLOAD_CHUNK_BYTES", 8192, "a positive integer")?;

        Ok(Self {
            a1111_base_uri,
            ready_path,
            request_timeout,
            post_retries: post_retries.max(1),
            post_retry_delay,
            transport_retries: transport_retries.max(1),
            transport_backoff,
            probe_interval,
            probe_log_every: probe_log_every.max(1),
            scheduler_keywords,
            registry_url,
            download_chunk_bytes: download_chunk_bytes.max(1),
        })
    }

    /// Full readiness probe URL.
    pub fn ready_url(&self) -> String {
        format!("{}/{}", self.a1111_base_uri, self.ready_path)
    }
}

fn parse_var<F, T>(
    lookup: &F,
    var: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            var,
            value: raw,
            expected,
        }),
    }
}
