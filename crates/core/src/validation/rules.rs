//! Schema, rule, and violation types.
//!
//! Schemas are plain data: they deserialize from the JSON documents in
//! `schemas/` and carry no behaviour of their own.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A declarative schema for one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    /// When set, fields not declared in `fields` are violations.
    #[serde(default)]
    pub closed: bool,
    /// Field the sampler normalizer reads to derive a `scheduler`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampler_field: Option<String>,
    pub fields: Vec<FieldRule>,
}

/// Rules for a single top-level field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRule {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

/// JSON value kinds a field may be constrained to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// Whether `value` is of this kind. Integers must have no fractional part
    /// in their JSON representation (`20.0` is a number, not an integer).
    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which rule a field violated.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    Missing,
    WrongType { expected: FieldType },
    NotAllowed { allowed: Vec<Value> },
    BelowMinimum { min: f64 },
    AboveMaximum { max: f64 },
    UnknownField,
}

/// A single field-level rule violation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldViolation {
    pub field: String,
    #[serde(flatten)]
    pub kind: ViolationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = &self.field;
        match &self.kind {
            ViolationKind::Missing => write!(f, "{field}: is required"),
            ViolationKind::WrongType { expected } => {
                write!(f, "{field}: expected {expected}")?;
                if let Some(v) = &self.value {
                    write!(f, ", got {}", json_kind(v))?;
                }
                Ok(())
            }
            ViolationKind::NotAllowed { allowed } => {
                let options: Vec<String> = allowed.iter().map(Value::to_string).collect();
                write!(f, "{field}: must be one of {}", options.join(", "))
            }
            ViolationKind::BelowMinimum { min } => write!(f, "{field}: must be at least {min}"),
            ViolationKind::AboveMaximum { max } => write!(f, "{field}: must be at most {max}"),
            ViolationKind::UnknownField => write!(f, "{field}: is not a recognised field"),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Non-empty, ordered list of violations produced by one validation pass.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{}", join_violations(.0))]
pub struct ValidationErrors(pub Vec<FieldViolation>);

impl ValidationErrors {
    pub fn violations(&self) -> &[FieldViolation] {
        &self.0
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
