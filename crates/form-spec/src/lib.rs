#![allow(missing_docs)]

pub mod errors;
pub mod expr;
pub mod forms;
pub mod render;
pub mod session;
pub mod spec;
pub mod store;
pub mod supplier;
pub mod validate;
pub mod visibility;

pub use errors::{ErrorMap, ValidationError};
pub use expr::Expr;
pub use forms::{BUILTIN_IDS, FormError, builtin, load_spec};
pub use render::{
    RenderError, RenderField, RenderPayload, RenderStatus, build_render_payload, render_json_ui,
    render_snapshot, render_text,
};
pub use session::{FormSession, QuestionsApplied, SubmitOutcome, SubmittedSnapshot};
pub use spec::{FieldKind, FieldSpec, FormSpec, Rule, SectionSpec};
pub use store::{FieldStore, FieldValue, StoreError};
pub use supplier::{
    HttpQuestionSupplier, QuestionDescriptor, QuestionRequest, QuestionResponse, QuestionSet,
    QuestionSupplier, StaticQuestionSupplier, SupplierConfig, SupplierError, fetch_questions,
    spawn_fetch,
};
pub use validate::{validate, validate_with};
pub use visibility::{ActiveSections, resolve_sections};

/// JSON Schema describing the form spec format.
pub fn spec_schema() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(FormSpec)).unwrap_or(serde_json::Value::Null)
}
