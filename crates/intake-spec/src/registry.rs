use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, FieldError, FormError};

/// Supported field kinds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
    Default,
)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Textarea,
    Email,
    Number,
    Date,
    Select,
    Radio,
    Checkbox,
    File,
}

/// How a raw submitted value is coerced and checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Text,
    Email,
    Number,
    Date,
    Choice,
    Flag,
    File,
}

/// Editing affordances and validation branch for one field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FieldCapabilities {
    pub has_options: bool,
    pub has_placeholder: bool,
    pub value_kind: ValueKind,
}

impl FieldType {
    pub const ALL: [FieldType; 9] = [
        FieldType::Text,
        FieldType::Textarea,
        FieldType::Email,
        FieldType::Number,
        FieldType::Date,
        FieldType::Select,
        FieldType::Radio,
        FieldType::Checkbox,
        FieldType::File,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Textarea => "textarea",
            FieldType::Email => "email",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Select => "select",
            FieldType::Radio => "radio",
            FieldType::Checkbox => "checkbox",
            FieldType::File => "file",
        }
    }

    pub fn capabilities(&self) -> FieldCapabilities {
        describe(*self)
    }
}

/// Capability lookup for a field type.
pub fn describe(field_type: FieldType) -> FieldCapabilities {
    let (has_options, has_placeholder, value_kind) = match field_type {
        FieldType::Text | FieldType::Textarea => (false, true, ValueKind::Text),
        FieldType::Email => (false, true, ValueKind::Email),
        FieldType::Number => (false, true, ValueKind::Number),
        FieldType::Date => (false, false, ValueKind::Date),
        FieldType::Select => (true, true, ValueKind::Choice),
        FieldType::Radio => (true, false, ValueKind::Choice),
        FieldType::Checkbox => (false, false, ValueKind::Flag),
        FieldType::File => (false, false, ValueKind::File),
    };
    FieldCapabilities {
        has_options,
        has_placeholder,
        value_kind,
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = FormError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        FieldType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| {
                FormError::invalid(
                    format!("unknown field type '{}'", value),
                    vec![FieldError::new(
                        ErrorKind::UnknownType,
                        format!("'{}' is not a supported field type", value),
                    )],
                )
            })
    }
}
