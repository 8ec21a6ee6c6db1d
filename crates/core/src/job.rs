//! Job and result documents exchanged with the host.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::endpoints::ApiDescriptor;

/// A job whose envelope and API descriptor have been validated.
#[derive(Debug, Clone)]
pub struct Job {
    /// Host-assigned identifier, used only for log correlation.
    pub id: Option<String>,
    pub api: ApiDescriptor,
    pub payload: Map<String, Value>,
}

/// Outcome of one dispatch. Serializes to exactly one of
/// `{"output": ...}` or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchResult {
    Output(Value),
    Error(String),
}

impl DispatchResult {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Output(v) => serde_json::json!({ "output": v }),
            Self::Error(e) => serde_json::json!({ "error": e }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn output_serializes_with_single_key() {
        let r = DispatchResult::Output(json!({"images": []}));
        assert_eq!(serde_json::to_value(&r).unwrap(), json!({"output": {"images": []}}));
        assert_eq!(r.to_json(), json!({"output": {"images": []}}));
    }

    #[test]
    fn error_serializes_with_single_key() {
        let r = DispatchResult::error("boom");
        assert!(r.is_error());
        assert_eq!(serde_json::to_value(&r).unwrap(), json!({"error": "boom"}));
    }
}
