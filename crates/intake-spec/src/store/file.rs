use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use super::{FormStore, StoreState};
use crate::error::FormError;
use crate::spec::field::FieldDefinition;
use crate::spec::form::{Form, FormDocument, FormId, FormPatch, InstitutionId, NewForm};
use crate::spec::submission::{NewSubmission, Submission};

/// Store persisted as a single JSON snapshot file.
///
/// Mutations run against a copy of the state. The copy is written to a
/// sibling temp file and renamed over the snapshot; only then does it
/// replace the in-memory state, so a failed write leaves both untouched.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: RwLock<StoreState>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, FormError> {
        let path = path.into();
        let state = if path.exists() {
            let contents = fs::read_to_string(&path)
                .map_err(|err| FormError::io(format!("read {}", path.display()), err))?;
            serde_json::from_str(&contents).map_err(|err| FormError::Persistence {
                message: format!("corrupt snapshot {}: {}", path.display(), err),
                transient: false,
                source: None,
            })?
        } else {
            StoreState::default()
        };
        tracing::info!(path = %path.display(), "file store opened");
        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mutate<T>(
        &self,
        apply: impl FnOnce(&mut StoreState) -> Result<T, FormError>,
    ) -> Result<T, FormError> {
        let mut guard = self.state.write();
        let mut next = guard.clone();
        let output = apply(&mut next)?;
        write_snapshot(&self.path, &next)?;
        *guard = next;
        Ok(output)
    }
}

fn write_snapshot(path: &Path, state: &StoreState) -> Result<(), FormError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .map_err(|err| FormError::io(format!("create {}", parent.display()), err))?;
    }
    let contents = serde_json::to_vec_pretty(state).map_err(|err| FormError::Persistence {
        message: format!("encode snapshot: {}", err),
        transient: false,
        source: None,
    })?;
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);
    fs::write(&temp, contents)
        .map_err(|err| FormError::io(format!("write {}", temp.display()), err))?;
    fs::rename(&temp, path)
        .map_err(|err| FormError::io(format!("replace {}", path.display()), err))
}

impl FormStore for FileStore {
    fn list_forms(
        &self,
        institution: InstitutionId,
        include_inactive: bool,
    ) -> Result<Vec<Form>, FormError> {
        Ok(self.state.read().list_forms(institution, include_inactive))
    }

    fn create_form(&self, institution: InstitutionId, input: NewForm) -> Result<Form, FormError> {
        self.mutate(|state| state.create_form(institution, input))
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
        self.mutate(|state| state.update_form(institution, form, patch, expected_version))
    }

    fn replace_fields(
        &self,
        institution: InstitutionId,
        form: FormId,
        fields: Vec<FieldDefinition>,
        expected_version: Option<u64>,
    ) -> Result<Vec<FieldDefinition>, FormError> {
        self.mutate(|state| state.replace_fields(institution, form, fields, expected_version))
    }

    fn delete_form(&self, institution: InstitutionId, form: FormId) -> Result<(), FormError> {
        self.mutate(|state| state.delete_form(institution, form))
    }

    fn insert_submission(
        &self,
        institution: InstitutionId,
        form: FormId,
        submission: NewSubmission,
    ) -> Result<Submission, FormError> {
        self.mutate(|state| state.insert_submission(institution, form, submission))
    }

    fn list_submissions(
        &self,
        institution: InstitutionId,
        form: FormId,
    ) -> Result<Vec<Submission>, FormError> {
        self.state.read().list_submissions(institution, form)
    }
}
