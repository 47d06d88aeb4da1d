use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::spec::field::FieldId;

/// Machine-readable reason attached to a field-level error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MissingRequired,
    InvalidFormat,
    InvalidOption,
    PatternMismatch,
    TooShort,
    TooLong,
    BelowMinimum,
    AboveMaximum,
    UnknownField,
    DuplicateValue,
    BlankLabel,
    BlankName,
    DuplicateName,
    UnknownType,
    InvalidRule,
    NoFields,
    FormInactive,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MissingRequired => "missing_required",
            ErrorKind::InvalidFormat => "invalid_format",
            ErrorKind::InvalidOption => "invalid_option",
            ErrorKind::PatternMismatch => "pattern_mismatch",
            ErrorKind::TooShort => "too_short",
            ErrorKind::TooLong => "too_long",
            ErrorKind::BelowMinimum => "below_minimum",
            ErrorKind::AboveMaximum => "above_maximum",
            ErrorKind::UnknownField => "unknown_field",
            ErrorKind::DuplicateValue => "duplicate_value",
            ErrorKind::BlankLabel => "blank_label",
            ErrorKind::BlankName => "blank_name",
            ErrorKind::DuplicateName => "duplicate_name",
            ErrorKind::UnknownType => "unknown_type",
            ErrorKind::InvalidRule => "invalid_rule",
            ErrorKind::NoFields => "no_fields",
            ErrorKind::FormInactive => "form_inactive",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One offending field (or top-level attribute) in a validation failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_id: Option<FieldId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    pub code: ErrorKind,
    pub message: String,
}

impl FieldError {
    pub fn new(code: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            field_id: None,
            field_name: None,
            code,
            message: message.into(),
        }
    }

    pub fn for_field(mut self, field_id: FieldId, field_name: impl Into<String>) -> Self {
        self.field_id = Some(field_id);
        self.field_name = Some(field_name.into());
        self
    }
}

/// Input rejected before anything was persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        for error in &self.errors {
            match &error.field_name {
                Some(name) => write!(f, "; {}: {}", name, error.code)?,
                None => write!(f, "; {}", error.message)?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum FormError {
    #[error("validation failed: {0}")]
    Validation(ValidationFailure),
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },
    #[error("form '{form_id}' was modified concurrently (expected version {expected}, found {actual})")]
    Conflict {
        form_id: String,
        expected: u64,
        actual: u64,
    },
    #[error("persistence failure: {message}")]
    Persistence {
        message: String,
        transient: bool,
        #[source]
        source: Option<std::io::Error>,
    },
    #[error("not authorized: {0}")]
    Authorization(String),
}

impl FormError {
    pub fn invalid(message: impl Into<String>, errors: Vec<FieldError>) -> Self {
        FormError::Validation(ValidationFailure {
            message: message.into(),
            errors,
        })
    }

    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        FormError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        let transient = matches!(
            source.kind(),
            std::io::ErrorKind::Interrupted
                | std::io::ErrorKind::WouldBlock
                | std::io::ErrorKind::TimedOut
        );
        FormError::Persistence {
            message: format!("{}: {}", context.into(), source),
            transient,
            source: Some(source),
        }
    }

    /// Only transient persistence failures may be retried.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FormError::Persistence {
                transient: true,
                ..
            }
        )
    }

    pub fn validation_failure(&self) -> Option<&ValidationFailure> {
        match self {
            FormError::Validation(failure) => Some(failure),
            _ => None,
        }
    }
}
