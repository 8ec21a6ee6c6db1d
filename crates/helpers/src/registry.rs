//! Model-registry lookup (`v1/sync`).
//!
//! Queries the Hugging Face model API for a repository's metadata and
//! reports whether it is reachable with the supplied credential.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default registry base URL.
pub const DEFAULT_REGISTRY_URL: &str = "https://huggingface.co";

/// Payload of the `v1/sync` helper.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncRequest {
    pub model_id: String,
    /// Absent, `null` and `""` all mean no credential.
    #[serde(default)]
    pub access_token: Option<String>,
}

impl SyncRequest {
    /// The credential, if a non-empty one was supplied.
    pub fn token(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// The subset of registry metadata reported back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub downloads: u64,
    pub likes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SyncOutcome {
    Success { message: String, model_info: ModelInfo },
    Error { message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("{0}")]
    Request(#[from] reqwest::Error),

    #[error("registry returned HTTP {status}")]
    HttpStatus { status: u16 },
}

/// Registry response body. Counts may be absent for some repositories.
#[derive(Debug, Deserialize)]
struct RepoInfo {
    id: String,
    #[serde(default)]
    private: bool,
    /// `false`, or the gating mode (`"auto"` / `"manual"`).
    #[serde(default)]
    gated: Value,
    #[serde(default)]
    downloads: u64,
    #[serde(default)]
    likes: u64,
}

impl RepoInfo {
    fn is_gated(&self) -> bool {
        !matches!(self.gated, Value::Null | Value::Bool(false))
    }
}

/// Client for the model registry's metadata API.
#[derive(Clone)]
pub struct ModelRegistry {
    client: reqwest::Client,
    base_url: String,
}

impl ModelRegistry {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn sync(&self, request: &SyncRequest) -> SyncOutcome {
        let model_id = &request.model_id;
        let token = request.token();

        let info = match self.repo_info(model_id, token).await {
            Ok(info) => info,
            Err(e) => {
                tracing::error!(model_id = %model_id, error = %e, "Error syncing model");
                return SyncOutcome::Error {
                    message: format!("Failed to sync model: {e}"),
                };
            }
        };

        if info.private {
            tracing::error!(model_id = %model_id, "Model is private and requires authentication");
            return SyncOutcome::Error {
                message: format!("Model {model_id} is private"),
            };
        }
        if info.is_gated() && token.is_none() {
            tracing::error!(model_id = %model_id, "Model is gated and no access token was given");
            return SyncOutcome::Error {
                message: format!("Model {model_id} is gated and requires an access token"),
            };
        }

        tracing::info!(model_id = %model_id, "Successfully accessed model");
        SyncOutcome::Success {
            message: format!("Model {model_id} synced successfully"),
            model_info: ModelInfo {
                id: info.id,
                downloads: info.downloads,
                likes: info.likes,
            },
        }
    }

    async fn repo_info(
        &self,
        model_id: &str,
        token: Option<&str>,
    ) -> Result<RepoInfo, RegistryError> {
        let mut request = self
            .client
            .get(format!("{}/api/models/{}", self.base_url, model_id));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::HttpStatus {
                status: status.as_u16(),
            });
        }
        Ok(response.json::<RepoInfo>().await?)
    }
}
