//! Endpoint descriptors, the allow-list entry type, and routing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Paths starting with this prefix are served by the local helpers.
pub const HELPER_PREFIX: &str = "v1/";

/// HTTP method of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            _ => Err(format!("Invalid method '{s}'. Must be one of: GET, POST")),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated `(method, endpoint)` pair with the leading `/` removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiDescriptor {
    pub method: Method,
    pub endpoint: String,
}

/// One allow-list row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointEntry {
    pub method: Method,
    pub path: String,
    /// Name of the payload schema, if the endpoint has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

/// Local helper operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelperKind {
    Download,
    Sync,
}

impl HelperKind {
    fn from_path(path: &str) -> Option<Self> {
        match path {
            "v1/download" => Some(Self::Download),
            "v1/sync" => Some(Self::Sync),
            _ => None,
        }
    }
}

/// Where a request goes once validated. The two are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Forward,
    Helper(HelperKind),
}

/// Route an endpoint path by its prefix.
pub fn route_for(method: Method, path: &str) -> Result<Route, CoreError> {
    if path.starts_with(HELPER_PREFIX) {
        HelperKind::from_path(path)
            .map(Route::Helper)
            .ok_or_else(|| CoreError::UnknownEndpoint {
                method: method.to_string(),
                endpoint: path.to_string(),
            })
    } else {
        Ok(Route::Forward)
    }
}

/// Strip one leading `/` from an endpoint path.
pub fn normalize_endpoint(endpoint: &str) -> &str {
    endpoint.strip_prefix('/').unwrap_or(endpoint)
}
