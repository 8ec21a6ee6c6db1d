use sdrelay_a1111::api::ForwardError;
use sdrelay_core::error::CoreError;
use sdrelay_core::validation::ValidationErrors;

/// Everything that can end a dispatch early. Converted into the job's
/// `error` field at the dispatch boundary.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Validation or routing failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The backing service could not be reached or answered garbage.
    #[error(transparent)]
    Forward(#[from] ForwardError),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl From<ValidationErrors> for DispatchError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Core(CoreError::Validation(errors))
    }
}

impl DispatchError {
    /// Short label used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Core(CoreError::Validation(_)) => "validation",
            Self::Core(CoreError::UnknownEndpoint { .. }) => "routing",
            Self::Core(CoreError::Config(_)) => "config",
            Self::Forward(ForwardError::InvalidResponse { .. }) => "upstream_format",
            Self::Forward(_) => "network",
            Self::Unexpected(_) => "unexpected",
        }
    }
}
