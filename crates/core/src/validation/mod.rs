//! Schema-driven document validation.
//!
//! Provides the rule and violation types plus a pure-logic evaluator. Schemas
//! themselves are data (see [`crate::catalog`]).

pub mod evaluator;
pub mod rules;

pub use evaluator::validate;
pub use rules::{FieldRule, FieldType, FieldViolation, Schema, ValidationErrors, ViolationKind};
