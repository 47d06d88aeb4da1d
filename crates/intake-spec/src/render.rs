use serde_json::{Map, Value, json};

use crate::registry::{FieldCapabilities, FieldType};
use crate::spec::form::FormDocument;
use crate::validate::{RawValues, ValidationReport, is_blank};

/// Status labels returned by the renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewStatus {
    /// At least one required field has no value yet.
    NeedInput,
    /// Every required field has a value.
    Complete,
    /// Supplied values failed validation.
    Invalid,
}

impl ViewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewStatus::NeedInput => "need_input",
            ViewStatus::Complete => "complete",
            ViewStatus::Invalid => "invalid",
        }
    }
}

/// Progress counters exposed to renderers.
#[derive(Debug, Clone)]
pub struct ViewProgress {
    pub answered: usize,
    pub total: usize,
}

/// Describes a single field for render outputs.
#[derive(Debug, Clone)]
pub struct FieldView {
    pub field_id: i64,
    pub name: String,
    pub label: String,
    pub kind: FieldType,
    pub capabilities: FieldCapabilities,
    pub required: bool,
    pub placeholder: Option<String>,
    pub default: Option<String>,
    pub help: Option<String>,
    pub options: Vec<String>,
    pub current_value: Option<Value>,
    pub error: Option<String>,
}

/// Ordered, typed field list handed to a UI layer.
#[derive(Debug, Clone)]
pub struct FormView {
    pub form_id: u64,
    pub name: String,
    pub description: Option<String>,
    pub status: ViewStatus,
    pub progress: ViewProgress,
    pub fields: Vec<FieldView>,
}

/// Build the view from a form, the values entered so far, and an optional
/// validation report for those values.
pub fn build_form_view(
    document: &FormDocument,
    values: &RawValues,
    report: Option<&ValidationReport>,
) -> FormView {
    let mut ordered: Vec<_> = document.fields.iter().collect();
    ordered.sort_by_key(|field| field.display_order);

    let fields = ordered
        .into_iter()
        .map(|field| {
            let capabilities = field.field_type.capabilities();
            let current_value = values
                .get(&field.field_id)
                .filter(|value| !is_blank(value, capabilities.value_kind))
                .cloned();
            let error = report.and_then(|report| {
                report
                    .errors
                    .iter()
                    .find(|error| error.field_id == Some(field.field_id))
                    .map(|error| error.message.clone())
            });
            FieldView {
                field_id: field.field_id.0,
                name: field.field_name.clone(),
                label: field.field_label.clone(),
                kind: field.field_type,
                capabilities,
                required: field.is_required,
                placeholder: field.placeholder.clone(),
                default: field.default_value.clone(),
                help: field.help_text.clone(),
                options: field.options.clone(),
                current_value,
                error,
            }
        })
        .collect::<Vec<_>>();

    let answered = fields
        .iter()
        .filter(|field| field.current_value.is_some())
        .count();
    let missing_required = fields
        .iter()
        .any(|field| field.required && field.current_value.is_none());

    let status = match report {
        Some(report) if !report.valid => ViewStatus::Invalid,
        _ if missing_required => ViewStatus::NeedInput,
        _ => ViewStatus::Complete,
    };

    FormView {
        form_id: document.form.id.0,
        name: document.form.name.clone(),
        description: document.form.description.clone(),
        status,
        progress: ViewProgress {
            answered,
            total: fields.len(),
        },
        fields,
    }
}

/// Render the view as a structured JSON-friendly value.
pub fn render_json_ui(view: &FormView) -> Value {
    let fields = view
        .fields
        .iter()
        .map(|field| {
            let mut map = Map::new();
            map.insert("field_id".into(), json!(field.field_id));
            map.insert("name".into(), Value::String(field.name.clone()));
            map.insert("label".into(), Value::String(field.label.clone()));
            map.insert("type".into(), Value::String(field.kind.as_str().to_string()));
            map.insert("required".into(), Value::Bool(field.required));
            if field.capabilities.has_placeholder
                && let Some(placeholder) = &field.placeholder
            {
                map.insert("placeholder".into(), Value::String(placeholder.clone()));
            }
            if let Some(default) = &field.default {
                map.insert("default".into(), Value::String(default.clone()));
            }
            if let Some(help) = &field.help {
                map.insert("help".into(), Value::String(help.clone()));
            }
            if field.capabilities.has_options {
                map.insert(
                    "options".into(),
                    Value::Array(
                        field
                            .options
                            .iter()
                            .map(|option| Value::String(option.clone()))
                            .collect(),
                    ),
                );
            }
            if let Some(current_value) = &field.current_value {
                map.insert("current_value".into(), current_value.clone());
            }
            if let Some(error) = &field.error {
                map.insert("error".into(), Value::String(error.clone()));
            }
            Value::Object(map)
        })
        .collect::<Vec<_>>();

    json!({
        "form_id": view.form_id,
        "name": view.name,
        "description": view.description,
        "status": view.status.as_str(),
        "progress": {
            "answered": view.progress.answered,
            "total": view.progress.total,
        },
        "fields": fields,
    })
}

/// Render the view as human-friendly text.
pub fn render_text(view: &FormView) -> String {
    let mut lines = Vec::new();
    lines.push(format!("Form: {} ({})", view.name, view.form_id));
    lines.push(format!(
        "Status: {} ({}/{})",
        view.status.as_str(),
        view.progress.answered,
        view.progress.total
    ));
    if let Some(description) = &view.description {
        lines.push(format!("Description: {}", description));
    }

    lines.push("Fields:".to_string());
    for field in &view.fields {
        let mut entry = format!(" - {} ({}, {})", field.label, field.name, field.kind);
        if field.required {
            entry.push_str(" [required]");
        }
        if let Some(value) = &field.current_value {
            entry.push_str(&format!(" = {}", value_to_display(value)));
        }
        lines.push(entry);
        if !field.options.is_empty() {
            lines.push(format!("     options: {}", field.options.join(" | ")));
        }
        if let Some(error) = &field.error {
            lines.push(format!("     error: {}", error));
        }
    }

    lines.join("\n")
}

fn value_to_display(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(num) => num.to_string(),
        other => other.to_string(),
    }
}
