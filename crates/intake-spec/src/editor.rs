//! Schema Editor: in-memory draft of a form and its fields.
//!
//! Nothing here touches the store until [`SchemaEditor::commit`]. After a
//! commit the draft is replaced by the store's response, so the draft never
//! drifts from what was persisted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, FieldError, FormError};
use crate::naming::unique_name;
use crate::registry::FieldType;
use crate::spec::field::{FieldDefinition, FieldId, FieldPatch, prepare_field, renumber};
use crate::spec::form::{FormDocument, FormId, FormPatch, FormType, InstitutionId, NewForm};
use crate::store::FormStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

#[derive(Debug, Clone)]
pub struct SchemaEditor {
    institution: InstitutionId,
    form_id: Option<FormId>,
    /// Version of the form as last read from the store.
    version: Option<u64>,
    header: NewForm,
    fields: Vec<FieldDefinition>,
    staged: BTreeMap<FieldId, FieldDefinition>,
    next_draft_id: i64,
}

impl SchemaEditor {
    /// Starts a draft for a form that does not exist yet.
    pub fn new(institution: InstitutionId, header: NewForm) -> Self {
        Self {
            institution,
            form_id: None,
            version: None,
            header,
            fields: Vec::new(),
            staged: BTreeMap::new(),
            next_draft_id: -1,
        }
    }

    /// Starts a draft from a persisted form.
    pub fn open(document: FormDocument) -> Self {
        let FormDocument { form, mut fields } = document;
        fields.sort_by_key(|field| field.display_order);
        renumber(&mut fields);
        Self {
            institution: form.institution_id,
            form_id: Some(form.id),
            version: Some(form.version),
            header: NewForm {
                name: form.name,
                description: form.description,
                form_type: form.form_type,
            },
            fields,
            staged: BTreeMap::new(),
            next_draft_id: -1,
        }
    }

    pub fn institution(&self) -> InstitutionId {
        self.institution
    }

    pub fn form_id(&self) -> Option<FormId> {
        self.form_id
    }

    pub fn version(&self) -> Option<u64> {
        self.version
    }

    pub fn header(&self) -> &NewForm {
        &self.header
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.header.name = name.into();
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.header.description = description;
    }

    pub fn set_form_type(&mut self, form_type: FormType) {
        self.header.form_type = form_type;
    }

    /// Fields in `display_order`.
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn field(&self, field_id: FieldId) -> Option<&FieldDefinition> {
        self.fields.iter().find(|field| field.field_id == field_id)
    }

    pub fn staged(&self, field_id: FieldId) -> Option<&FieldDefinition> {
        self.staged.get(&field_id)
    }

    pub fn discard_edit(&mut self, field_id: FieldId) -> Option<FieldDefinition> {
        self.staged.remove(&field_id)
    }

    /// Appends a blank text field named `field_<n+1>`.
    pub fn add_field(&mut self) -> FieldId {
        let mut n = self.fields.len() + 1;
        while self.name_taken(&format!("field_{}", n), None) {
            n += 1;
        }
        let mut field = FieldDefinition::new(format!("Field {}", n), FieldType::Text)
            .named(format!("field_{}", n));
        field.field_id = self.allocate_draft_id();
        field.display_order = self.fields.len() as u32;
        let id = field.field_id;
        self.fields.push(field);
        id
    }

    /// Stages a patched copy of a field without committing it.
    pub fn edit_field(
        &mut self,
        field_id: FieldId,
        patch: FieldPatch,
    ) -> Result<FieldDefinition, FormError> {
        let mut draft = match self.staged.get(&field_id) {
            Some(staged) => staged.clone(),
            None => self
                .field(field_id)
                .cloned()
                .ok_or_else(|| FormError::not_found("field", field_id))?,
        };
        patch.apply(&mut draft);
        self.staged.insert(field_id, draft.clone());
        Ok(draft)
    }

    /// Validates a field and commits it into the draft list, replacing by id
    /// or appending.
    pub fn save_field(&mut self, draft: FieldDefinition) -> Result<FieldId, FormError> {
        let position = self.position(draft.field_id);
        if position.is_none() && draft.field_id.is_persisted() {
            return Err(FormError::not_found("field", draft.field_id));
        }

        let mut field = prepare_field(draft)
            .map_err(|error| FormError::invalid("field rejected", vec![error]))?;

        let own_id = position.map(|_| field.field_id);
        if self.name_taken(&field.field_name, own_id) {
            return Err(FormError::invalid(
                "field rejected",
                vec![
                    FieldError::new(
                        ErrorKind::DuplicateName,
                        format!("field name '{}' is already used", field.field_name),
                    )
                    .for_field(field.field_id, field.field_name.clone()),
                ],
            ));
        }

        match position {
            Some(index) => {
                self.staged.remove(&field.field_id);
                field.display_order = index as u32;
                let id = field.field_id;
                self.fields[index] = field;
                Ok(id)
            }
            None => {
                field.field_id = self.allocate_draft_id();
                field.display_order = self.fields.len() as u32;
                let id = field.field_id;
                self.fields.push(field);
                Ok(id)
            }
        }
    }

    pub fn delete_field(&mut self, field_id: FieldId) -> Result<FieldDefinition, FormError> {
        let index = self
            .position(field_id)
            .ok_or_else(|| FormError::not_found("field", field_id))?;
        let removed = self.fields.remove(index);
        self.staged.remove(&field_id);
        renumber(&mut self.fields);
        Ok(removed)
    }

    /// Swaps a field with its neighbour. Returns `false` at either boundary.
    pub fn move_field(&mut self, field_id: FieldId, direction: Direction) -> Result<bool, FormError> {
        let index = self
            .position(field_id)
            .ok_or_else(|| FormError::not_found("field", field_id))?;
        let target = match direction {
            Direction::Up if index > 0 => index - 1,
            Direction::Down if index + 1 < self.fields.len() => index + 1,
            _ => return Ok(false),
        };
        self.fields.swap(index, target);
        renumber(&mut self.fields);
        Ok(true)
    }

    pub fn duplicate_field(&mut self, field_id: FieldId) -> Result<FieldId, FormError> {
        let source = self
            .field(field_id)
            .cloned()
            .ok_or_else(|| FormError::not_found("field", field_id))?;
        let mut copy = source;
        copy.field_name = unique_name(&format!("{}_copy", copy.field_name), |name| {
            self.name_taken(name, None)
        });
        copy.field_label = format!("{} (Copy)", copy.field_label);
        copy.field_id = self.allocate_draft_id();
        copy.display_order = self.fields.len() as u32;
        let id = copy.field_id;
        self.fields.push(copy);
        Ok(id)
    }

    /// Persists the draft: create or update the form, then replace its fields.
    pub fn commit<S>(&mut self, store: &S) -> Result<FormDocument, FormError>
    where
        S: FormStore + ?Sized,
    {
        let mut errors = Vec::new();
        if self.header.name.trim().is_empty() {
            errors.push(FieldError::new(
                ErrorKind::BlankName,
                "form name cannot be blank",
            ));
        }
        if self.fields.is_empty() {
            errors.push(FieldError::new(
                ErrorKind::NoFields,
                "a form needs at least one field",
            ));
        }
        if !errors.is_empty() {
            return Err(FormError::invalid("form cannot be saved", errors));
        }

        let form = match self.form_id {
            None => store.create_form(self.institution, self.header.clone())?,
            Some(form_id) => store.update_form(
                self.institution,
                form_id,
                FormPatch {
                    name: Some(self.header.name.clone()),
                    description: Some(self.header.description.clone().unwrap_or_default()),
                    form_type: Some(self.header.form_type),
                    is_active: None,
                },
                self.version,
            )?,
        };
        // A create succeeded even if the field replace below fails; keep the id.
        // Both writes are version-checked against what this draft last saw.
        self.form_id = Some(form.id);
        self.version = Some(form.version);

        store.replace_fields(
            self.institution,
            form.id,
            self.fields.clone(),
            Some(form.version),
        )?;
        let document = store.get_form(self.institution, form.id)?;

        self.version = Some(document.form.version);
        self.header = NewForm {
            name: document.form.name.clone(),
            description: document.form.description.clone(),
            form_type: document.form.form_type,
        };
        self.fields = document.fields.clone();
        self.staged.clear();
        tracing::debug!(
            institution = %self.institution,
            form_id = %form.id,
            fields = self.fields.len(),
            "draft committed"
        );
        Ok(document)
    }

    fn position(&self, field_id: FieldId) -> Option<usize> {
        self.fields
            .iter()
            .position(|field| field.field_id == field_id)
    }

    fn name_taken(&self, name: &str, except: Option<FieldId>) -> bool {
        self.fields
            .iter()
            .any(|field| field.field_name == name && Some(field.field_id) != except)
    }

    fn allocate_draft_id(&mut self) -> FieldId {
        let id = FieldId(self.next_draft_id);
        self.next_draft_id -= 1;
        id
    }
}
