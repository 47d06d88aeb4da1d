use parking_lot::RwLock;

use super::{FormStore, StoreState};
use crate::error::FormError;
use crate::spec::field::FieldDefinition;
use crate::spec::form::{Form, FormDocument, FormId, FormPatch, InstitutionId, NewForm};
use crate::spec::submission::{NewSubmission, Submission};

/// Process-local store. Each call holds the lock for its whole duration.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: StoreState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    pub fn snapshot(&self) -> StoreState {
        self.state.read().clone()
    }
}

impl FormStore for MemoryStore {
    fn list_forms(
        &self,
        institution: InstitutionId,
        include_inactive: bool,
    ) -> Result<Vec<Form>, FormError> {
        Ok(self.state.read().list_forms(institution, include_inactive))
    }

    fn create_form(&self, institution: InstitutionId, input: NewForm) -> Result<Form, FormError> {
        self.state.write().create_form(institution, input)
    }

    fn get_form(
        &self,
        institution: InstitutionId,
        form: FormId,
    ) -> Result<FormDocument, FormError> {
        self.state.read().get_form(institution, form)
    }

    fn update_form(
        &self,
        institution: InstitutionId,
        form: FormId,
        patch: FormPatch,
        expected_version: Option<u64>,
    ) -> Result<Form, FormError> {
        self.state.write().update_form(institution, form, patch, expected_version)
    }

    fn replace_fields(
        &self,
        institution: InstitutionId,
        form: FormId,
        fields: Vec<FieldDefinition>,
        expected_version: Option<u64>,
    ) -> Result<Vec<FieldDefinition>, FormError> {
        self.state
            .write()
            .replace_fields(institution, form, fields, expected_version)
    }

    fn delete_form(&self, institution: InstitutionId, form: FormId) -> Result<(), FormError> {
        self.state.write().delete_form(institution, form)
    }

    fn insert_submission(
        &self,
        institution: InstitutionId,
        form: FormId,
        submission: NewSubmission,
    ) -> Result<Submission, FormError> {
        self.state
            .write()
            .insert_submission(institution, form, submission)
    }

    fn list_submissions(
        &self,
        institution: InstitutionId,
        form: FormId,
    ) -> Result<Vec<Submission>, FormError> {
        self.state.read().list_submissions(institution, form)
    }
}
