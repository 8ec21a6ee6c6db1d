//! Streamed file download to a caller-chosen directory.
//!
//! The body is written chunk by chunk as it arrives, so large model files
//! never sit in memory. Failures come back as a `status=error` outcome;
//! nothing propagates out of [`Downloader::download`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncWriteExt, BufWriter};

/// Default write buffer size.
pub const DEFAULT_CHUNK_BYTES: usize = 8192;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Payload of the `v1/download` helper.
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadRequest {
    pub file_url: String,
    pub file_name: String,
    /// Destination directory, created if absent.
    pub file_path: String,
}

/// Result reported to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DownloadOutcome {
    Success {
        message: String,
        file_path: String,
        file_size_mb: f64,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("{0}")]
    Request(#[from] reqwest::Error),

    #[error("server returned HTTP {0}")]
    HttpStatus(u16),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("invalid file name '{0}'")]
    InvalidFileName(String),
}

/// Downloads files over the shared HTTP client.
#[derive(Clone)]
pub struct Downloader {
    client: reqwest::Client,
    chunk_bytes: usize,
}

impl Downloader {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            chunk_bytes: DEFAULT_CHUNK_BYTES,
        }
    }

    pub fn with_chunk_bytes(mut self, chunk_bytes: usize) -> Self {
        self.chunk_bytes = chunk_bytes.max(1);
        self
    }

    pub async fn download(&self, request: &DownloadRequest) -> DownloadOutcome {
        match self.try_download(request).await {
            Ok((location, bytes)) => {
                let file_size_mb = size_in_mib(bytes);
                tracing::info!(
                    file_name = %request.file_name,
                    file_size_mb,
                    "Downloaded: {} ({file_size_mb} MB)",
                    request.file_name,
                );
                DownloadOutcome::Success {
                    message: format!("File {} downloaded successfully", request.file_name),
                    file_path: location.to_string_lossy().into_owned(),
                    file_size_mb,
                }
            }
            Err(e) => {
                tracing::error!(url = %request.file_url, error = %e, "Error downloading file");
                DownloadOutcome::Error {
                    message: format!("Failed to download file: {e}"),
                }
            }
        }
    }

    async fn try_download(&self, request: &DownloadRequest) -> Result<(PathBuf, u64), DownloadError> {
        validate_file_name(&request.file_name)?;

        let response = self.client.get(&request.file_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpStatus(status.as_u16()));
        }

        tokio::fs::create_dir_all(&request.file_path).await?;
        let location = Path::new(&request.file_path).join(&request.file_name);

        if let Err(e) = self.write_body(response, &location).await {
            // Best effort: a partial file must not be mistaken for a download.
            let _ = tokio::fs::remove_file(&location).await;
            return Err(e);
        }

        let bytes = tokio::fs::metadata(&location).await?.len();
        let resolved = tokio::fs::canonicalize(&location).await.unwrap_or(location);
        Ok((resolved, bytes))
    }

    async fn write_body(
        &self,
        mut response: reqwest::Response,
        location: &Path,
    ) -> Result<(), DownloadError> {
        let file = tokio::fs::File::create(location).await?;
        let mut writer = BufWriter::with_capacity(self.chunk_bytes, file);

        while let Some(chunk) = response.chunk().await? {
            writer.write_all(&chunk).await?;
        }
        writer.flush().await?;
        Ok(())
    }
}

/// File names must be a single, ordinary path component.
pub fn validate_file_name(name: &str) -> Result<(), DownloadError> {
    let bad = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\');
    if bad {
        Err(DownloadError::InvalidFileName(name.to_string()))
    } else {
        Ok(())
    }
}

/// Bytes to mebibytes, rounded to two decimals.
pub fn size_in_mib(bytes: u64) -> f64 {
    (bytes as f64 / BYTES_PER_MIB * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn size_rounds_to_two_decimals() {
        assert_eq!(size_in_mib(0), 0.0);
        assert_eq!(size_in_mib(1024 * 1024), 1.0);
        assert_eq!(size_in_mib(1_572_864), 1.5);
        assert_eq!(size_in_mib(2_000_000), 1.91);
    }

    #[test]
    fn plain_file_names_accepted() {
        assert!(validate_file_name("model.safetensors").is_ok());
        assert!(validate_file_name("lora v2.pt").is_ok());
    }

    #[test]
    fn path_like_file_names_rejected() {
        for name in ["", "  ", ".", "..", "../etc/passwd", "sub/dir.bin", "a\\b"] {
            assert_matches!(
                validate_file_name(name),
                Err(DownloadError::InvalidFileName(_)),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let ok = DownloadOutcome::Success {
            message: "File a.bin downloaded successfully".into(),
            file_path: "/models/a.bin".into(),
            file_size_mb: 1.5,
        };
        let v = serde_json::to_value(&ok).unwrap();
        assert_eq!(v["status"], "success");
        assert_eq!(v["file_size_mb"], 1.5);

        let err = DownloadOutcome::Error {
            message: "Failed to download file: boom".into(),
        };
        assert_eq!(serde_json::to_value(&err).unwrap()["status"], "error");
    }
}
