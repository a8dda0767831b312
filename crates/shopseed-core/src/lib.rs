//! Core contracts and helpers for shopseed.
//!
//! This crate defines the record schema descriptor used to validate
//! generated data, the cleaning and repair steps applied to raw model
//! output, and the error type shared by the other crates.

pub mod error;
pub mod repair;
pub mod schema;
pub mod validation;

pub use error::{CoreError, Result};
pub use repair::{ParsedOutput, clean_response, parse_record_array, repair_json};
pub use schema::{FieldKind, FieldSpec, RecordSchema};
pub use validation::{BatchValidation, Rejection, ValidatedRecord, validate_batch, validate_record};
