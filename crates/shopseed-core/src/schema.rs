use std::collections::BTreeSet;

use crate::error::{CoreError, Result};

/// Expected shape of a single record field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// String that is non-empty after trimming and at least `min_chars` long.
    Text { min_chars: usize },
    /// Non-empty string containing `@`.
    Email,
    /// Any JSON number.
    Number,
    /// Integral JSON number inside an inclusive range.
    Integer { min: i64, max: i64 },
    /// String drawn from a fixed set of values.
    OneOf(Vec<String>),
    /// String that is replaced by `default` when absent, not a string, or blank.
    Defaulted { default: String },
}

impl FieldKind {
    /// Short label used in rejection messages and prompts.
    pub fn label(&self) -> &'static str {
        match self {
            FieldKind::Text { .. } | FieldKind::Defaulted { .. } => "string",
            FieldKind::Email => "email",
            FieldKind::Number => "number",
            FieldKind::Integer { .. } => "integer",
            FieldKind::OneOf(_) => "enum",
        }
    }
}

/// One field of a record schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    /// Reject records where the key is missing entirely.
    pub required: bool,
}

impl FieldSpec {
    pub fn text(name: impl Into<String>) -> Self {
        Self::required(name, FieldKind::Text { min_chars: 1 })
    }

    pub fn text_min(name: impl Into<String>, min_chars: usize) -> Self {
        Self::required(name, FieldKind::Text { min_chars })
    }

    pub fn email(name: impl Into<String>) -> Self {
        Self::required(name, FieldKind::Email)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::required(name, FieldKind::Number)
    }

    pub fn integer(name: impl Into<String>, min: i64, max: i64) -> Self {
        Self::required(name, FieldKind::Integer { min, max })
    }

    pub fn one_of(name: impl Into<String>, values: &[&str]) -> Self {
        Self::required(
            name,
            FieldKind::OneOf(values.iter().map(|value| value.to_string()).collect()),
        )
    }

    /// Key must be present, but a mistyped value becomes the empty string.
    pub fn lenient(name: impl Into<String>) -> Self {
        Self::required(
            name,
            FieldKind::Defaulted {
                default: String::new(),
            },
        )
    }

    /// Key may be absent; absent, mistyped, or blank values become `default`.
    pub fn defaulted(name: impl Into<String>, default: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Defaulted {
                default: default.into(),
            },
            required: false,
        }
    }

    fn required(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
        }
    }
}

/// Ordered field list describing one entity kind.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    entity: String,
    fields: Vec<FieldSpec>,
}

impl RecordSchema {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Names of every field, in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }

    /// Check the schema itself for duplicate names and impossible constraints.
    pub fn check(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(CoreError::InvalidSchema(format!(
                    "{}: empty field name",
                    self.entity
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(CoreError::InvalidSchema(format!(
                    "{}: duplicate field '{}'",
                    self.entity, field.name
                )));
            }
            match &field.kind {
                FieldKind::OneOf(values) if values.is_empty() => {
                    return Err(CoreError::InvalidSchema(format!(
                        "{}.{}: enum has no allowed values",
                        self.entity, field.name
                    )));
                }
                FieldKind::Integer { min, max } if min > max => {
                    return Err(CoreError::InvalidSchema(format!(
                        "{}.{}: integer range {min}..={max} is empty",
                        self.entity, field.name
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}
