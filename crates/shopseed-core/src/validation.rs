use std::fmt;

use serde_json::{Map, Value};

use crate::schema::{FieldKind, FieldSpec, RecordSchema};

/// Reason a single generated element was discarded.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    NotAnObject,
    MissingField(String),
    WrongType {
        field: String,
        expected: &'static str,
    },
    Blank(String),
    NotAnEmail(String),
    TooShort {
        field: String,
        min_chars: usize,
    },
    OutOfRange {
        field: String,
        min: i64,
        max: i64,
    },
    NotAllowed {
        field: String,
        value: String,
    },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NotAnObject => write!(f, "element is not an object"),
            Rejection::MissingField(field) => write!(f, "missing field '{field}'"),
            Rejection::WrongType { field, expected } => {
                write!(f, "field '{field}' is not a valid {expected}")
            }
            Rejection::Blank(field) => write!(f, "field '{field}' is blank"),
            Rejection::NotAnEmail(field) => write!(f, "field '{field}' has no '@'"),
            Rejection::TooShort { field, min_chars } => {
                write!(f, "field '{field}' is shorter than {min_chars} characters")
            }
            Rejection::OutOfRange { field, min, max } => {
                write!(f, "field '{field}' is outside {min}..={max}")
            }
            Rejection::NotAllowed { field, value } => {
                write!(f, "field '{field}' has disallowed value {value}")
            }
        }
    }
}

/// An element that passed validation, plus the number of defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRecord {
    pub fields: Map<String, Value>,
    pub defaults_applied: usize,
}

/// Outcome of validating a raw array against a schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchValidation {
    /// Accepted records, in input order.
    pub accepted: Vec<ValidatedRecord>,
    /// Rejected elements as `(input index, reason)`.
    pub rejected: Vec<(usize, Rejection)>,
}

impl BatchValidation {
    pub fn defaults_applied(&self) -> usize {
        self.accepted
            .iter()
            .map(|record| record.defaults_applied)
            .sum()
    }
}

/// Validate every element of a parsed array, keeping the ones that fit.
///
/// Broken elements are rejected individually; the batch never fails as a
/// whole here. Callers decide what an empty `accepted` list means.
pub fn validate_batch(schema: &RecordSchema, values: Vec<Value>) -> BatchValidation {
    let mut outcome = BatchValidation::default();
    for (index, value) in values.into_iter().enumerate() {
        match validate_record(schema, value) {
            Ok(record) => outcome.accepted.push(record),
            Err(rejection) => outcome.rejected.push((index, rejection)),
        }
    }
    outcome
}

/// Validate one element. Fields not named by the schema are kept untouched.
pub fn validate_record(
    schema: &RecordSchema,
    value: Value,
) -> Result<ValidatedRecord, Rejection> {
    let Value::Object(mut fields) = value else {
        return Err(Rejection::NotAnObject);
    };

    for spec in schema.fields() {
        if spec.required && !fields.contains_key(&spec.name) {
            return Err(Rejection::MissingField(spec.name.clone()));
        }
    }

    let mut defaults_applied = 0;
    for spec in schema.fields() {
        if let FieldKind::Defaulted { default } = &spec.kind {
            let usable = matches!(
                fields.get(&spec.name),
                Some(Value::String(text)) if !text.trim().is_empty()
            );
            let already_default =
                fields.get(&spec.name).and_then(Value::as_str) == Some(default.as_str());
            if !usable && !already_default {
                fields.insert(spec.name.clone(), Value::String(default.clone()));
                defaults_applied += 1;
            }
            continue;
        }
        check_field(spec, fields.get(&spec.name))?;
    }

    Ok(ValidatedRecord {
        fields,
        defaults_applied,
    })
}

fn check_field(spec: &FieldSpec, value: Option<&Value>) -> Result<(), Rejection> {
    let Some(value) = value else {
        return Err(Rejection::MissingField(spec.name.clone()));
    };
    let wrong_type = || Rejection::WrongType {
        field: spec.name.clone(),
        expected: spec.kind.label(),
    };

    match &spec.kind {
        FieldKind::Text { min_chars } => {
            let text = value.as_str().ok_or_else(wrong_type)?;
            if text.trim().is_empty() {
                return Err(Rejection::Blank(spec.name.clone()));
            }
            if text.chars().count() < *min_chars {
                return Err(Rejection::TooShort {
                    field: spec.name.clone(),
                    min_chars: *min_chars,
                });
            }
        }
        FieldKind::Email => {
            let text = value.as_str().ok_or_else(wrong_type)?;
            if text.trim().is_empty() {
                return Err(Rejection::Blank(spec.name.clone()));
            }
            if !text.contains('@') {
                return Err(Rejection::NotAnEmail(spec.name.clone()));
            }
        }
        FieldKind::Number => {
            if !value.is_number() {
                return Err(wrong_type());
            }
        }
        FieldKind::Integer { min, max } => {
            let number = value.as_i64().ok_or_else(wrong_type)?;
            if number < *min || number > *max {
                return Err(Rejection::OutOfRange {
                    field: spec.name.clone(),
                    min: *min,
                    max: *max,
                });
            }
        }
        FieldKind::OneOf(allowed) => {
            let text = value.as_str().ok_or_else(wrong_type)?;
            if !allowed.iter().any(|candidate| candidate == text) {
                return Err(Rejection::NotAllowed {
                    field: spec.name.clone(),
                    value: value.to_string(),
                });
            }
        }
        FieldKind::Defaulted { .. } => {}
    }

    Ok(())
}
