use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::spec::field::FieldId;
use crate::spec::form::{FormId, InstitutionId};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct SubmissionId(pub u64);

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A submitted value plus the field's name and label at submission time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SubmittedValue {
    pub field_id: FieldId,
    pub field_name: String,
    pub field_label: String,
    pub value: Value,
}

/// Immutable record of one end-user submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Submission {
    pub id: SubmissionId,
    pub form_id: FormId,
    pub institution_id: InstitutionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_by: Option<String>,
    pub submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    pub values: Vec<SubmittedValue>,
}

impl Submission {
    pub fn value(&self, field_id: FieldId) -> Option<&Value> {
        self.values
            .iter()
            .find(|entry| entry.field_id == field_id)
            .map(|entry| &entry.value)
    }

    pub fn value_by_name(&self, field_name: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|entry| entry.field_name == field_name)
            .map(|entry| &entry.value)
    }
}

/// Validated submission handed to the store for persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSubmission {
    pub submitted_by: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub idempotency_key: Option<String>,
    pub values: Vec<SubmittedValue>,
}
