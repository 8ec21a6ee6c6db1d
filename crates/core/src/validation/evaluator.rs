//! Schema evaluator. Pure logic, no I/O.

use serde_json::{Map, Value};

use super::rules::{FieldRule, FieldViolation, Schema, ValidationErrors, ViolationKind};

/// Validate `document` against `schema`.
///
/// On success returns a copy of the document with absent optional fields
/// filled from their defaults. On failure returns every violation, in
/// schema-declaration order followed by unknown fields of a closed schema.
pub fn validate(
    schema: &Schema,
    document: &Map<String, Value>,
) -> Result<Map<String, Value>, ValidationErrors> {
    let mut normalized = document.clone();
    let mut violations = Vec::new();

    for rule in &schema.fields {
        match evaluate_field(rule, document.get(&rule.name)) {
            Some(v) => violations.push(v),
            None => apply_default(rule, &mut normalized),
        }
    }

    if schema.closed {
        for (key, value) in document {
            if !schema.fields.iter().any(|r| &r.name == key) {
                violations.push(FieldViolation {
                    field: key.clone(),
                    kind: ViolationKind::UnknownField,
                    value: Some(value.clone()),
                });
            }
        }
    }

    if violations.is_empty() {
        Ok(normalized)
    } else {
        Err(ValidationErrors(violations))
    }
}

/// Check one field. Rules run presence -> type -> allowed set -> range, and
/// only the first failing rule is reported.
fn evaluate_field(rule: &FieldRule, value: Option<&Value>) -> Option<FieldViolation> {
    let value = match value {
        None | Some(Value::Null) if rule.required => {
            return Some(violation(rule, ViolationKind::Missing, value));
        }
        None | Some(Value::Null) => return None,
        Some(v) => v,
    };

    evaluate_type(rule, value)
        .or_else(|| evaluate_allowed(rule, value))
        .or_else(|| evaluate_min(rule, value))
        .or_else(|| evaluate_max(rule, value))
}

fn violation(rule: &FieldRule, kind: ViolationKind, value: Option<&Value>) -> FieldViolation {
    FieldViolation {
        field: rule.name.clone(),
        kind,
        value: value.cloned(),
    }
}

fn evaluate_type(rule: &FieldRule, value: &Value) -> Option<FieldViolation> {
    if rule.kind.matches(value) {
        None
    } else {
        Some(violation(
            rule,
            ViolationKind::WrongType { expected: rule.kind },
            Some(value),
        ))
    }
}

fn evaluate_allowed(rule: &FieldRule, value: &Value) -> Option<FieldViolation> {
    let allowed = rule.allowed.as_ref()?;
    if allowed.contains(value) {
        None
    } else {
        Some(violation(
            rule,
            ViolationKind::NotAllowed {
                allowed: allowed.clone(),
            },
            Some(value),
        ))
    }
}

fn evaluate_min(rule: &FieldRule, value: &Value) -> Option<FieldViolation> {
    let min = rule.min?;
    let num = value.as_f64()?;
    if num < min {
        Some(violation(rule, ViolationKind::BelowMinimum { min }, Some(value)))
    } else {
        None
    }
}

fn evaluate_max(rule: &FieldRule, value: &Value) -> Option<FieldViolation> {
    let max = rule.max?;
    let num = value.as_f64()?;
    if num > max {
        Some(violation(rule, ViolationKind::AboveMaximum { max }, Some(value)))
    } else {
        None
    }
}

fn apply_default(rule: &FieldRule, normalized: &mut Map<String, Value>) {
    if let Some(default) = &rule.default {
        if !normalized.contains_key(&rule.name) {
            normalized.insert(rule.name.clone(), default.clone());
        }
    }
}
