use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, FieldError};
use crate::naming::derive_field_name;
use crate::registry::FieldType;
use crate::spec::form::normalize_optional;

/// Field identity. Positive ids come from the store, negative ids are
/// editor drafts, and zero means "not assigned yet".
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    JsonSchema,
    Default,
)]
#[serde(transparent)]
pub struct FieldId(pub i64);

impl FieldId {
    pub const UNASSIGNED: FieldId = FieldId(0);

    pub fn is_persisted(&self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One typed, ordered input slot of a form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldDefinition {
    #[serde(default)]
    pub field_id: FieldId,
    /// Machine key, unique within the form.
    #[serde(default)]
    pub field_name: String,
    pub field_label: String,
    #[serde(default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_rules: Option<String>,
    #[serde(default)]
    pub display_order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
}

impl FieldDefinition {
    pub fn new(label: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            field_id: FieldId::UNASSIGNED,
            field_name: String::new(),
            field_label: label.into(),
            field_type,
            is_required: false,
            placeholder: None,
            default_value: None,
            options: Vec::new(),
            validation_rules: None,
            display_order: 0,
            help_text: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.field_name = name.into();
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_rules(mut self, rules: impl Into<String>) -> Self {
        self.validation_rules = Some(rules.into());
        self
    }

    /// Drops type-specific metadata the registry says this type cannot carry.
    pub fn strip_unsupported(&mut self) {
        let caps = self.field_type.capabilities();
        if !caps.has_options {
            self.options.clear();
        }
        if !caps.has_placeholder {
            self.placeholder = None;
        }
    }

    /// Parsed `validation_rules`, if any.
    pub fn rules(&self) -> Result<Option<ValidationRules>, String> {
        match self.validation_rules.as_deref() {
            Some(raw) => ValidationRules::parse(raw),
            None => Ok(None),
        }
    }
}

/// Staged edit applied by the editor. Empty strings clear optional text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FieldPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_rules: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
}

impl FieldPatch {
    pub fn apply(self, field: &mut FieldDefinition) {
        if let Some(name) = self.field_name {
            field.field_name = name;
        }
        if let Some(label) = self.field_label {
            field.field_label = label;
        }
        if let Some(field_type) = self.field_type {
            field.field_type = field_type;
        }
        if let Some(required) = self.is_required {
            field.is_required = required;
        }
        if let Some(placeholder) = self.placeholder {
            field.placeholder = normalize_optional(Some(placeholder));
        }
        if let Some(default_value) = self.default_value {
            field.default_value = normalize_optional(Some(default_value));
        }
        if let Some(options) = self.options {
            field.options = options;
        }
        if let Some(rules) = self.validation_rules {
            field.validation_rules = normalize_optional(Some(rules));
        }
        if let Some(help_text) = self.help_text {
            field.help_text = normalize_optional(Some(help_text));
        }
        field.strip_unsupported();
    }
}

/// Structured form of `validation_rules`.
///
/// Accepts either a JSON object with any of the keys below, or a bare
/// regular expression which is treated as `pattern`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct ValidationRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl ValidationRules {
    pub fn parse(raw: &str) -> Result<Option<Self>, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let rules = if trimmed.starts_with('{') {
            serde_json::from_str::<ValidationRules>(trimmed)
                .map_err(|err| format!("validation rules are not valid JSON: {}", err))?
        } else {
            ValidationRules {
                pattern: Some(trimmed.to_string()),
                ..Default::default()
            }
        };
        if let Some(pattern) = &rules.pattern {
            Regex::new(pattern).map_err(|err| format!("invalid pattern: {}", err))?;
        }
        if let (Some(min), Some(max)) = (rules.min_length, rules.max_length)
            && min > max
        {
            return Err("min_length cannot exceed max_length".into());
        }
        if let (Some(min), Some(max)) = (rules.min, rules.max)
            && min > max
        {
            return Err("min cannot exceed max".into());
        }
        Ok(Some(rules))
    }

    pub fn compiled_pattern(&self) -> Option<Regex> {
        self.pattern
            .as_deref()
            .and_then(|pattern| Regex::new(pattern).ok())
    }
}

/// Normalises one field for saving: trims text, derives a blank name from the
/// label, strips unsupported metadata, and checks the rule syntax.
pub fn prepare_field(mut field: FieldDefinition) -> Result<FieldDefinition, FieldError> {
    field.field_label = field.field_label.trim().to_string();
    if field.field_label.is_empty() {
        return Err(FieldError {
            field_id: Some(field.field_id),
            field_name: normalize_optional(Some(field.field_name.clone())),
            code: ErrorKind::BlankLabel,
            message: "field label is required".into(),
        });
    }

    field.field_name = field.field_name.trim().to_string();
    if field.field_name.is_empty() {
        field.field_name = derive_field_name(&field.field_label);
    }
    if field.field_name.is_empty() {
        return Err(FieldError {
            field_id: Some(field.field_id),
            field_name: None,
            code: ErrorKind::BlankName,
            message: format!(
                "cannot derive a field name from label '{}'",
                field.field_label
            ),
        });
    }

    field.placeholder = normalize_optional(field.placeholder);
    field.default_value = normalize_optional(field.default_value);
    field.help_text = normalize_optional(field.help_text);
    field.validation_rules = normalize_optional(field.validation_rules);
    field.options = field
        .options
        .into_iter()
        .map(|option| option.trim().to_string())
        .filter(|option| !option.is_empty())
        .collect();
    field.strip_unsupported();

    if let Err(reason) = field.rules() {
        return Err(FieldError::new(ErrorKind::InvalidRule, reason)
            .for_field(field.field_id, field.field_name.clone()));
    }

    Ok(field)
}

/// Reports every field whose name is already used by an earlier field.
pub fn duplicate_names(fields: &[FieldDefinition]) -> Vec<FieldError> {
    let mut seen: BTreeMap<&str, FieldId> = BTreeMap::new();
    let mut errors = Vec::new();
    for field in fields {
        if seen.insert(&field.field_name, field.field_id).is_some() {
            errors.push(
                FieldError::new(
                    ErrorKind::DuplicateName,
                    format!("field name '{}' is already used", field.field_name),
                )
                .for_field(field.field_id, field.field_name.clone()),
            );
        }
    }
    errors
}

/// Rewrites `display_order` to match list positions.
pub fn renumber(fields: &mut [FieldDefinition]) {
    for (index, field) in fields.iter_mut().enumerate() {
        field.display_order = index as u32;
    }
}
