pub mod field;
pub mod form;
pub mod submission;

pub use field::{
    FieldDefinition, FieldId, FieldPatch, ValidationRules, duplicate_names, prepare_field,
    renumber,
};
pub use form::{Form, FormDocument, FormId, FormPatch, FormType, InstitutionId, NewForm};
pub use submission::{NewSubmission, Submission, SubmissionId, SubmittedValue};
