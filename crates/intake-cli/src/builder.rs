use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use uuid::Uuid;

use intake_spec::{
    FieldDefinition, FieldId, FormDocument, FormError, InstitutionId, MemoryStore, NewForm,
    RawValues, SchemaEditor, ValidationRules, ValueKind, derive_field_name, validate,
};

/// Input shape describing the form to build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildInput {
    pub institution_id: Uuid,
    #[serde(flatten)]
    pub form: NewForm,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

/// All derived artifacts for a form.
#[derive(Debug, Clone)]
pub struct GeneratedBundle {
    pub document: FormDocument,
    pub values_schema: Value,
    pub example_values: Value,
}

/// Runs the input through the schema editor and a scratch store so the
/// written document carries normalised names, ids, and ordering.
pub fn build_bundle(input: &BuildInput) -> Result<GeneratedBundle, FormError> {
    let mut editor = SchemaEditor::new(InstitutionId(input.institution_id), input.form.clone());

    let mut fields = input.fields.clone();
    fields.sort_by_key(|field| field.display_order);
    for mut field in fields {
        field.field_id = FieldId::UNASSIGNED;
        editor.save_field(field)?;
    }

    let document = editor.commit(&MemoryStore::new())?;
    Ok(GeneratedBundle {
        values_schema: values_schema(&document),
        example_values: example_values(&document),
        document,
    })
}

/// JSON Schema for a submission given as an object keyed by field name.
pub fn values_schema(document: &FormDocument) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for field in &document.fields {
        if field.is_required {
            required.push(Value::String(field.field_name.clone()));
        }
        properties.insert(field.field_name.clone(), field_schema(field));
    }
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": document.form.name,
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

fn field_schema(field: &FieldDefinition) -> Value {
    let mut schema = Map::new();
    let (json_type, format) = match field.field_type.capabilities().value_kind {
        ValueKind::Text | ValueKind::File | ValueKind::Choice => ("string", None),
        ValueKind::Email => ("string", Some("email")),
        ValueKind::Number => ("number", None),
        ValueKind::Date => ("string", Some("date")),
        ValueKind::Flag => ("boolean", None),
    };
    schema.insert("type".into(), json!(json_type));
    if let Some(format) = format {
        schema.insert("format".into(), json!(format));
    }
    if !field.options.is_empty() {
        schema.insert("enum".into(), json!(field.options));
    }
    schema.insert("title".into(), json!(field.field_label));
    if let Some(help) = &field.help_text {
        schema.insert("description".into(), json!(help));
    }
    if let Ok(Some(rules)) = field.rules() {
        apply_rules(&mut schema, &rules);
    }
    Value::Object(schema)
}

fn apply_rules(schema: &mut Map<String, Value>, rules: &ValidationRules) {
    if let Some(pattern) = &rules.pattern {
        schema.insert("pattern".into(), Value::String(pattern.clone()));
    }
    if let Some(min) = rules.min_length {
        schema.insert("minLength".into(), json!(min));
    }
    if let Some(max) = rules.max_length {
        schema.insert("maxLength".into(), json!(max));
    }
    if let Some(min) = rules.min {
        schema.insert("minimum".into(), json!(min));
    }
    if let Some(max) = rules.max {
        schema.insert("maximum".into(), json!(max));
    }
}

/// Example values keyed by field name. Defaults win over generated samples.
/// A field whose sample its own rules reject (a `pattern` with no default)
/// is left out.
pub fn example_values(document: &FormDocument) -> Value {
    let mut values = Map::new();
    for field in &document.fields {
        let sample = example_for(field);
        if accepts(field, &sample) {
            values.insert(field.field_name.clone(), sample);
        }
    }
    Value::Object(values)
}

fn accepts(field: &FieldDefinition, sample: &Value) -> bool {
    let values = RawValues::from([(field.field_id, sample.clone())]);
    validate(std::slice::from_ref(field), &values).valid
}

fn example_for(field: &FieldDefinition) -> Value {
    let kind = field.field_type.capabilities().value_kind;
    let rules = field.rules().ok().flatten().unwrap_or_default();
    if let Some(default) = &field.default_value {
        return match kind {
            ValueKind::Flag => Value::Bool(matches!(default.as_str(), "true" | "1" | "on")),
            _ => Value::String(default.clone()),
        };
    }
    match kind {
        ValueKind::Text => {
            let mut text = String::from("example");
            if let Some(min) = rules.min_length {
                while text.chars().count() < min {
                    text.push('x');
                }
            }
            if let Some(max) = rules.max_length {
                text = text.chars().take(max.max(1)).collect();
            }
            Value::String(text)
        }
        ValueKind::Email => Value::String("student@example.com".into()),
        ValueKind::Number => {
            let floor = rules.min.unwrap_or(0.0).max(0.0);
            json!(rules.max.map_or(floor, |max| floor.min(max)))
        }
        ValueKind::Date => Value::String("2026-09-01".into()),
        ValueKind::Choice => field
            .options
            .first()
            .map(|option| Value::String(option.clone()))
            .unwrap_or_else(|| Value::String("option".into())),
        ValueKind::Flag => Value::Bool(true),
        ValueKind::File => Value::String("upload.pdf".into()),
    }
}

/// Writes the bundle under `out_root/<form slug>/` and returns that directory.
pub fn write_bundle(bundle: &GeneratedBundle, out_root: &Path) -> io::Result<PathBuf> {
    let bundle_dir = out_root.join(bundle_dir_name(&bundle.document));
    fs::create_dir_all(&bundle_dir)?;

    write_json(&bundle_dir.join("form.json"), &bundle.document)?;
    write_json(&bundle_dir.join("values.schema.json"), &bundle.values_schema)?;
    write_json(&bundle_dir.join("values.example.json"), &bundle.example_values)?;
    fs::write(bundle_dir.join("README.md"), build_readme(bundle))?;

    Ok(bundle_dir)
}

pub fn bundle_dir_name(document: &FormDocument) -> String {
    let slug = derive_field_name(&document.form.name).replace('_', "-");
    if slug.is_empty() {
        "form".into()
    } else {
        slug
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    fs::write(path, format!("{json}\n"))
}

fn build_readme(bundle: &GeneratedBundle) -> String {
    let form = &bundle.document.form;
    let mut lines = vec![format!("# {}", form.name), String::new()];
    if let Some(description) = &form.description {
        lines.push(description.clone());
        lines.push(String::new());
    }
    lines.push(format!("Type: `{}`", form.form_type));
    lines.push(String::new());
    lines.push("| # | Name | Label | Type | Required |".into());
    lines.push("|---|---|---|---|---|".into());
    for field in &bundle.document.fields {
        lines.push(format!(
            "| {} | `{}` | {} | {} | {} |",
            field.display_order + 1,
            field.field_name,
            field.field_label,
            field.field_type,
            if field.is_required { "yes" } else { "no" }
        ));
    }
    lines.push(String::new());
    lines.push("Files: `form.json`, `values.schema.json`, `values.example.json`.".into());
    let example = bundle.example_values.as_object();
    let omitted: Vec<String> = bundle
        .document
        .fields
        .iter()
        .filter(|field| example.is_none_or(|values| !values.contains_key(&field.field_name)))
        .map(|field| format!("`{}`", field.field_name))
        .collect();
    if !omitted.is_empty() {
        lines.push(String::new());
        lines.push(format!(
            "No example could be generated for: {}.",
            omitted.join(", ")
        ));
    }
    lines.join("\n") + "\n"
}
