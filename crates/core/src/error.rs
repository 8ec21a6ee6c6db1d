use crate::validation::ValidationErrors;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Unsupported endpoint: {method} {endpoint}")]
    UnknownEndpoint { method: String, endpoint: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}
