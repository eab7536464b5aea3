//! Module validation framework
//!
//! Cheap, string-level structural checks run before any build or load.

pub mod structure_validator;

pub use structure_validator::{StructureValidator, ValidationIssue, ValidationResult};
