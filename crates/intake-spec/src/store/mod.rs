//! Schema Store: forms, their ordered fields, and their submissions.
//!
//! Both stores share [`StoreState`], which owns the id sequences and every
//! invariant check. A mutation either applies completely or not at all.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, FieldError, FormError};
use crate::spec::field::{FieldDefinition, FieldId, duplicate_names, prepare_field, renumber};
use crate::spec::form::{
    Form, FormDocument, FormId, FormPatch, InstitutionId, NewForm, normalize_optional,
};
use crate::spec::submission::{NewSubmission, Submission, SubmissionId};

/// Persistence boundary consumed by the editor, the submission processor,
/// and the HTTP layer.
pub trait FormStore: Send + Sync {
    fn list_forms(
        &self,
        institution: InstitutionId,
        include_inactive: bool,
    ) -> Result<Vec<Form>, FormError>;

    fn create_form(&self, institution: InstitutionId, input: NewForm) -> Result<Form, FormError>;

    fn get_form(&self, institution: InstitutionId, form: FormId)
    -> Result<FormDocument, FormError>;

    /// Applies a partial header update. `expected_version`, when given, must
    /// equal the form's current version. An empty patch changes nothing.
    fn update_form(
        &self,
        institution: InstitutionId,
        form: FormId,
        patch: FormPatch,
        expected_version: Option<u64>,
    ) -> Result<Form, FormError>;

    /// Atomically swaps the whole field list. `expected_version`, when given,
    /// must equal the form's current version.
    fn replace_fields(
        &self,
        institution: InstitutionId,
        form: FormId,
        fields: Vec<FieldDefinition>,
        expected_version: Option<u64>,
    ) -> Result<Vec<FieldDefinition>, FormError>;

    fn delete_form(&self, institution: InstitutionId, form: FormId) -> Result<(), FormError>;

    fn insert_submission(
        &self,
        institution: InstitutionId,
        form: FormId,
        submission: NewSubmission,
    ) -> Result<Submission, FormError>;

    fn list_submissions(
        &self,
        institution: InstitutionId,
        form: FormId,
    ) -> Result<Vec<Submission>, FormError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredForm {
    form: Form,
    fields: Vec<FieldDefinition>,
    #[serde(default)]
    submissions: Vec<Submission>,
}

/// Serialisable store contents with store-owned id sequences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreState {
    next_form_id: u64,
    next_field_id: i64,
    next_submission_id: u64,
    #[serde(default)]
    forms: Vec<StoredForm>,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            next_form_id: 1,
            next_field_id: 1,
            next_submission_id: 1,
            forms: Vec::new(),
        }
    }
}

impl StoredForm {
    fn check_version(&self, expected_version: Option<u64>) -> Result<(), FormError> {
        match expected_version {
            Some(expected) if expected != self.form.version => Err(FormError::Conflict {
                form_id: self.form.id.to_string(),
                expected,
                actual: self.form.version,
            }),
            _ => Ok(()),
        }
    }
}

impl StoreState {
    fn find(&self, institution: InstitutionId, form: FormId) -> Result<&StoredForm, FormError> {
        self.forms
            .iter()
            .find(|stored| stored.form.id == form && stored.form.institution_id == institution)
            .ok_or_else(|| FormError::not_found("form", form))
    }

    fn find_mut(
        &mut self,
        institution: InstitutionId,
        form: FormId,
    ) -> Result<&mut StoredForm, FormError> {
        self.forms
            .iter_mut()
            .find(|stored| stored.form.id == form && stored.form.institution_id == institution)
            .ok_or_else(|| FormError::not_found("form", form))
    }

    pub fn list_forms(&self, institution: InstitutionId, include_inactive: bool) -> Vec<Form> {
        let mut forms: Vec<Form> = self
            .forms
            .iter()
            .map(|stored| &stored.form)
            .filter(|form| form.institution_id == institution)
            .filter(|form| include_inactive || form.is_active)
            .cloned()
            .collect();
        forms.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        forms
    }

    pub fn create_form(
        &mut self,
        institution: InstitutionId,
        input: NewForm,
    ) -> Result<Form, FormError> {
        let name = require_name(&input.name)?;
        let form = Form {
            id: FormId(self.next_form_id),
            institution_id: institution,
            name,
            description: normalize_optional(input.description),
            form_type: input.form_type,
            is_active: true,
            version: 0,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.next_form_id += 1;
        self.forms.push(StoredForm {
            form: form.clone(),
            fields: Vec::new(),
            submissions: Vec::new(),
        });
        tracing::info!(%institution, form_id = %form.id, name = %form.name, "form created");
        Ok(form)
    }

    pub fn get_form(
        &self,
        institution: InstitutionId,
        form: FormId,
    ) -> Result<FormDocument, FormError> {
        let stored = self.find(institution, form)?;
        let mut fields = stored.fields.clone();
        fields.sort_by_key(|field| field.display_order);
        Ok(FormDocument {
            form: stored.form.clone(),
            fields,
        })
    }

    pub fn update_form(
        &mut self,
        institution: InstitutionId,
        form: FormId,
        patch: FormPatch,
        expected_version: Option<u64>,
    ) -> Result<Form, FormError> {
        let name = patch.name.as_deref().map(require_name).transpose()?;
        let stored = self.find_mut(institution, form)?;
        stored.check_version(expected_version)?;
        if patch.is_empty() {
            return Ok(stored.form.clone());
        }
        if let Some(name) = name {
            stored.form.name = name;
        }
        if let Some(description) = patch.description {
            stored.form.description = normalize_optional(Some(description));
        }
        if let Some(form_type) = patch.form_type {
            stored.form.form_type = form_type;
        }
        if let Some(is_active) = patch.is_active {
            stored.form.is_active = is_active;
        }
        stored.form.version += 1;
        stored.form.updated_at = Some(Utc::now());
        tracing::info!(%institution, form_id = %form, version = stored.form.version, "form updated");
        Ok(stored.form.clone())
    }

    pub fn replace_fields(
        &mut self,
        institution: InstitutionId,
        form: FormId,
        fields: Vec<FieldDefinition>,
        expected_version: Option<u64>,
    ) -> Result<Vec<FieldDefinition>, FormError> {
        let stored = self.find(institution, form)?;
        stored.check_version(expected_version)?;

        let mut seen_ids = Vec::new();
        for field in &fields {
            if !field.field_id.is_persisted() {
                continue;
            }
            if !stored
                .fields
                .iter()
                .any(|existing| existing.field_id == field.field_id)
            {
                return Err(FormError::not_found("field", field.field_id));
            }
            if seen_ids.contains(&field.field_id) {
                return Err(FormError::invalid(
                    "field list contains the same field twice",
                    vec![
                        FieldError::new(
                            ErrorKind::DuplicateValue,
                            format!("field {} appears more than once", field.field_id),
                        )
                        .for_field(field.field_id, field.field_name.clone()),
                    ],
                ));
            }
            seen_ids.push(field.field_id);
        }

        let mut prepared = Vec::with_capacity(fields.len());
        let mut errors = Vec::new();
        for field in fields {
            match prepare_field(field) {
                Ok(field) => prepared.push(field),
                Err(error) => errors.push(error),
            }
        }
        errors.extend(duplicate_names(&prepared));
        if !errors.is_empty() {
            return Err(FormError::invalid("field list rejected", errors));
        }

        prepared.sort_by_key(|field| field.display_order);
        renumber(&mut prepared);
        for field in prepared.iter_mut() {
            if !field.field_id.is_persisted() {
                field.field_id = FieldId(self.next_field_id);
                self.next_field_id += 1;
            }
        }

        let stored = self.find_mut(institution, form)?;
        stored.fields = prepared.clone();
        stored.form.version += 1;
        stored.form.updated_at = Some(Utc::now());
        tracing::info!(
            %institution,
            form_id = %form,
            fields = prepared.len(),
            version = stored.form.version,
            "form fields replaced"
        );
        Ok(prepared)
    }

    pub fn delete_form(&mut self, institution: InstitutionId, form: FormId) -> Result<(), FormError> {
        let index = self
            .forms
            .iter()
            .position(|stored| stored.form.id == form && stored.form.institution_id == institution)
            .ok_or_else(|| FormError::not_found("form", form))?;
        let removed = self.forms.remove(index);
        tracing::info!(
            %institution,
            form_id = %form,
            fields = removed.fields.len(),
            submissions = removed.submissions.len(),
            "form deleted"
        );
        Ok(())
    }

    pub fn insert_submission(
        &mut self,
        institution: InstitutionId,
        form: FormId,
        submission: NewSubmission,
    ) -> Result<Submission, FormError> {
        let next_id = self.next_submission_id;
        let stored = self.find_mut(institution, form)?;
        if let Some(key) = &submission.idempotency_key
            && let Some(existing) = stored
                .submissions
                .iter()
                .find(|existing| existing.idempotency_key.as_ref() == Some(key))
        {
            tracing::debug!(form_id = %form, submission_id = %existing.id, "idempotent resubmission");
            return Ok(existing.clone());
        }

        let record = Submission {
            id: SubmissionId(next_id),
            form_id: form,
            institution_id: institution,
            submitted_by: submission.submitted_by,
            submitted_at: submission.submitted_at,
            idempotency_key: submission.idempotency_key,
            values: submission.values,
        };
        stored.submissions.push(record.clone());
        self.next_submission_id += 1;
        tracing::info!(%institution, form_id = %form, submission_id = %record.id, "submission stored");
        Ok(record)
    }

    pub fn list_submissions(
        &self,
        institution: InstitutionId,
        form: FormId,
    ) -> Result<Vec<Submission>, FormError> {
        Ok(self.find(institution, form)?.submissions.clone())
    }
}

fn require_name(name: &str) -> Result<String, FormError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(FormError::invalid(
            "form name is required",
            vec![FieldError::new(ErrorKind::BlankName, "form name cannot be blank")],
        ));
    }
    Ok(trimmed.to_string())
}
