#![allow(missing_docs)]

pub mod editor;
pub mod error;
pub mod naming;
pub mod registry;
pub mod render;
pub mod retry;
pub mod spec;
pub mod store;
pub mod submit;
pub mod validate;

pub use editor::{Direction, SchemaEditor};
pub use error::{ErrorKind, FieldError, FormError, ValidationFailure};
pub use naming::derive_field_name;
pub use registry::{FieldCapabilities, FieldType, ValueKind, describe};
pub use render::{FieldView, FormView, ViewStatus, build_form_view, render_json_ui, render_text};
pub use retry::RetryPolicy;
pub use spec::{
    FieldDefinition, FieldId, FieldPatch, Form, FormDocument, FormId, FormPatch, FormType,
    InstitutionId, NewForm, NewSubmission, Submission, SubmissionId, SubmittedValue,
    ValidationRules,
};
pub use store::{FileStore, FormStore, MemoryStore, StoreState};
pub use submit::{SubmissionProcessor, SubmitRequest, ValueEntry, values_from_entries};
pub use validate::{RawValues, ValidationReport, validate};
