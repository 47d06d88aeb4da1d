use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorKind, FieldError, FormError};
use crate::retry::RetryPolicy;
use crate::spec::field::FieldId;
use crate::spec::form::{FormId, InstitutionId};
use crate::spec::submission::{NewSubmission, Submission, SubmittedValue};
use crate::store::FormStore;
use crate::validate::{RawValues, is_blank, validate};

/// One `{field_id, value}` pair as it arrives on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueEntry {
    pub field_id: FieldId,
    #[serde(default)]
    pub value: Value,
}

/// Builds the value map, rejecting ids that appear more than once.
pub fn values_from_entries(entries: Vec<ValueEntry>) -> Result<RawValues, FormError> {
    let mut values = RawValues::new();
    let mut errors = Vec::new();
    for entry in entries {
        if values.contains_key(&entry.field_id) {
            errors.push(FieldError {
                field_id: Some(entry.field_id),
                field_name: None,
                code: ErrorKind::DuplicateValue,
                message: format!("field {} was supplied more than once", entry.field_id),
            });
            continue;
        }
        values.insert(entry.field_id, entry.value);
    }
    if errors.is_empty() {
        Ok(values)
    } else {
        Err(FormError::invalid("submission rejected", errors))
    }
}

#[derive(Debug, Clone, Default)]
pub struct SubmitRequest {
    pub values: RawValues,
    pub submitted_by: Option<String>,
    /// Repeating a key for the same form returns the original submission.
    pub idempotency_key: Option<String>,
}

impl SubmitRequest {
    pub fn new(values: RawValues) -> Self {
        Self {
            values,
            ..Default::default()
        }
    }

    pub fn submitted_by(mut self, principal: impl Into<String>) -> Self {
        self.submitted_by = Some(principal.into());
        self
    }

    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Validates raw values against a form's current fields and persists the
/// resulting submission.
pub struct SubmissionProcessor<'a, S: FormStore + ?Sized> {
    store: &'a S,
    retry: RetryPolicy,
}

impl<'a, S: FormStore + ?Sized> SubmissionProcessor<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn submit(
        &self,
        institution: InstitutionId,
        form_id: FormId,
        request: SubmitRequest,
    ) -> Result<Submission, FormError> {
        let document = self
            .retry
            .run("load form", || self.store.get_form(institution, form_id))?;

        if !document.form.is_active {
            return Err(FormError::invalid(
                "form is not accepting submissions",
                vec![FieldError::new(
                    ErrorKind::FormInactive,
                    format!("form '{}' is inactive", document.form.name),
                )],
            ));
        }

        let report = validate(&document.fields, &request.values);
        if !report.valid {
            tracing::debug!(
                %institution,
                %form_id,
                errors = report.errors.len() + report.unknown_fields.len(),
                "submission rejected"
            );
            return Err(FormError::invalid(
                "submission rejected",
                report.into_field_errors(),
            ));
        }

        let values = document
            .fields
            .iter()
            .filter_map(|field| {
                let value = request.values.get(&field.field_id)?;
                let kind = field.field_type.capabilities().value_kind;
                (!is_blank(value, kind)).then(|| SubmittedValue {
                    field_id: field.field_id,
                    field_name: field.field_name.clone(),
                    field_label: field.field_label.clone(),
                    value: value.clone(),
                })
            })
            .collect::<Vec<_>>();

        let submission = NewSubmission {
            submitted_by: request.submitted_by,
            submitted_at: Utc::now(),
            idempotency_key: request.idempotency_key,
            values,
        };
        self.retry.run("store submission", || {
            self.store
                .insert_submission(institution, form_id, submission.clone())
        })
    }
}
