//! Local helper operations served without the backing service.
//!
//! [`HelperRouter`] maps a [`HelperKind`] to the matching operation. Every
//! operation reports failure as a `status=error` outcome instead of an error.

pub mod download;
pub mod registry;

use serde::Serialize;
use serde_json::{Map, Value};
use sdrelay_core::endpoints::HelperKind;

use crate::download::{DownloadOutcome, DownloadRequest, Downloader};
use crate::registry::{ModelRegistry, SyncOutcome, SyncRequest};

/// Outcome of any helper, serialized as the job's `output`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum HelperOutcome {
    Download(DownloadOutcome),
    Sync(SyncOutcome),
}

impl HelperOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::Download(DownloadOutcome::Success { .. }) | Self::Sync(SyncOutcome::Success { .. })
        )
    }
}

#[derive(Clone)]
pub struct HelperRouter {
    downloader: Downloader,
    registry: ModelRegistry,
}

impl HelperRouter {
    pub fn new(downloader: Downloader, registry: ModelRegistry) -> Self {
        Self {
            downloader,
            registry,
        }
    }

    /// Run the helper for `kind` on an already-validated payload.
    pub async fn run(&self, kind: HelperKind, payload: &Map<String, Value>) -> HelperOutcome {
        let payload = Value::Object(payload.clone());
        match kind {
            HelperKind::Download => HelperOutcome::Download(
                match serde_json::from_value::<DownloadRequest>(payload) {
                    Ok(request) => self.downloader.download(&request).await,
                    Err(e) => DownloadOutcome::Error {
                        message: format!("Failed to download file: invalid request: {e}"),
                    },
                },
            ),
            HelperKind::Sync => HelperOutcome::Sync(
                match serde_json::from_value::<SyncRequest>(payload) {
                    Ok(request) => self.registry.sync(&request).await,
                    Err(e) => SyncOutcome::Error {
                        message: format!("Failed to sync model: invalid request: {e}"),
                    },
                },
            ),
        }
    }
}
