use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorKind, FieldError};
use crate::registry::ValueKind;
use crate::spec::field::{FieldDefinition, FieldId, ValidationRules};

/// Raw end-user values keyed by field identity.
pub type RawValues = BTreeMap<FieldId, Value>;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles")
});

/// Outcome of checking a value set against a field list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ValidationReport {
    pub valid: bool,
    /// At most one error per field, in `display_order`.
    pub errors: Vec<FieldError>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unknown_fields: Vec<FieldId>,
}

impl ValidationReport {
    pub fn error_kinds(&self) -> BTreeMap<FieldId, ErrorKind> {
        self.errors
            .iter()
            .filter_map(|error| error.field_id.map(|id| (id, error.code)))
            .collect()
    }

    pub fn kind_for(&self, field_id: FieldId) -> Option<ErrorKind> {
        self.errors
            .iter()
            .find(|error| error.field_id == Some(field_id))
            .map(|error| error.code)
    }

    /// Field errors plus one `unknown_field` entry per stray value.
    pub fn into_field_errors(self) -> Vec<FieldError> {
        let mut errors = self.errors;
        errors.extend(self.unknown_fields.into_iter().map(|id| FieldError {
            field_id: Some(id),
            field_name: None,
            code: ErrorKind::UnknownField,
            message: format!("field {} does not belong to this form", id),
        }));
        errors
    }
}

pub fn validate(fields: &[FieldDefinition], values: &RawValues) -> ValidationReport {
    let mut ordered: Vec<&FieldDefinition> = fields.iter().collect();
    ordered.sort_by_key(|field| field.display_order);

    let mut errors = Vec::new();
    for field in ordered {
        if let Some((code, message)) = check_field(field, values.get(&field.field_id)) {
            errors.push(
                FieldError::new(code, message).for_field(field.field_id, field.field_name.clone()),
            );
        }
    }

    let unknown_fields: Vec<FieldId> = values
        .keys()
        .filter(|id| !fields.iter().any(|field| field.field_id == **id))
        .copied()
        .collect();

    ValidationReport {
        valid: errors.is_empty() && unknown_fields.is_empty(),
        errors,
        unknown_fields,
    }
}

/// Whether a value counts as "not supplied" for the given kind. An
/// unchecked checkbox is blank.
pub fn is_blank(value: &Value, kind: ValueKind) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) if text.trim().is_empty() => true,
        Value::Array(items) => items.is_empty(),
        _ => kind == ValueKind::Flag && flag_value(value) == Some(false),
    }
}

/// Reads a checkbox value as posted by browsers and JSON clients alike.
pub fn flag_value(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(checked) => Some(*checked),
        Value::Number(number) => match number.as_u64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "on" | "1" | "yes" => Some(true),
            "false" | "off" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn check_field(field: &FieldDefinition, value: Option<&Value>) -> Option<(ErrorKind, String)> {
    let kind = field.field_type.capabilities().value_kind;
    let value = match value {
        Some(value) if !is_blank(value, kind) => value,
        _ => {
            return field.is_required.then(|| {
                (
                    ErrorKind::MissingRequired,
                    format!("{} is required", field.field_label),
                )
            });
        }
    };

    if let Some(error) = check_kind(field, kind, value) {
        return Some(error);
    }

    match field.rules() {
        Ok(Some(rules)) => check_rules(field, kind, value, &rules),
        _ => None,
    }
}

fn check_kind(
    field: &FieldDefinition,
    kind: ValueKind,
    value: &Value,
) -> Option<(ErrorKind, String)> {
    let invalid = |message: &str| Some((ErrorKind::InvalidFormat, message.to_string()));
    match kind {
        ValueKind::Text | ValueKind::File => match value {
            Value::Array(_) | Value::Object(_) => invalid("expected a single value"),
            _ => None,
        },
        ValueKind::Email => match value.as_str() {
            Some(text) if EMAIL.is_match(text.trim()) => None,
            _ => invalid("please enter a valid email address"),
        },
        ValueKind::Number => match numeric_value(value) {
            Some(_) => None,
            None => invalid("expected a numeric value"),
        },
        ValueKind::Date => match value.as_str() {
            Some(text) if NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").is_ok() => None,
            _ => invalid("expected a date formatted as YYYY-MM-DD"),
        },
        ValueKind::Flag => match flag_value(value) {
            Some(_) => None,
            None => invalid("expected a checked/unchecked value"),
        },
        ValueKind::Choice => match value.as_str() {
            Some(_) if field.options.is_empty() => None,
            Some(text) if field.options.iter().any(|option| option == text) => None,
            Some(_) => Some((
                ErrorKind::InvalidOption,
                format!("choose one of: {}", field.options.join(", ")),
            )),
            None => invalid("expected one of the listed options"),
        },
    }
}

fn check_rules(
    field: &FieldDefinition,
    kind: ValueKind,
    value: &Value,
    rules: &ValidationRules,
) -> Option<(ErrorKind, String)> {
    if kind == ValueKind::Number {
        let number = numeric_value(value)?;
        if let Some(min) = rules.min
            && number < min
        {
            return Some((
                ErrorKind::BelowMinimum,
                format!("{} must be at least {}", field.field_label, min),
            ));
        }
        if let Some(max) = rules.max
            && number > max
        {
            return Some((
                ErrorKind::AboveMaximum,
                format!("{} must be at most {}", field.field_label, max),
            ));
        }
    }

    let text = match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        _ => return None,
    };

    if let Some(regex) = rules.compiled_pattern()
        && !regex.is_match(&text)
    {
        return Some((
            ErrorKind::PatternMismatch,
            format!("{} does not match the expected format", field.field_label),
        ));
    }

    let length = text.chars().count();
    if let Some(min_length) = rules.min_length
        && length < min_length
    {
        return Some((
            ErrorKind::TooShort,
            format!(
                "{} must be at least {} characters",
                field.field_label, min_length
            ),
        ));
    }
    if let Some(max_length) = rules.max_length
        && length > max_length
    {
        return Some((
            ErrorKind::TooLong,
            format!(
                "{} must be at most {} characters",
                field.field_label, max_length
            ),
        ));
    }

    None
}

fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|number| number.is_finite()),
        _ => None,
    }
}
