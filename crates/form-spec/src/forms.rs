//! Built-in form definitions and spec loading.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::spec::form::ADDITIONAL_QUESTIONS_SECTION;
use crate::spec::{FieldKind, FormSpec};

const EVENT_REGISTRATION: &str = include_str!("../forms/event_registration.json");
const JOB_APPLICATION: &str = include_str!("../forms/job_application.json");
const SURVEY: &str = include_str!("../forms/survey.json");

/// Ids of the forms shipped with the crate.
pub const BUILTIN_IDS: [&str; 3] = ["event-registration", "job-application", "survey"];

#[derive(Debug, Error)]
pub enum FormError {
    #[error("form '{0}' is not available")]
    Unknown(String),
    #[error("failed to parse form spec: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("form spec '{form}' is inconsistent: {reason}")]
    Invalid { form: String, reason: String },
}

/// Parses and checks a form spec.
pub fn load_spec(json: &str) -> Result<FormSpec, FormError> {
    let spec: FormSpec = serde_json::from_str(json)?;
    check_spec(&spec)?;
    Ok(spec)
}

/// Looks up a built-in form by id.
pub fn builtin(id: &str) -> Result<FormSpec, FormError> {
    let json = match id {
        "event-registration" => EVENT_REGISTRATION,
        "job-application" => JOB_APPLICATION,
        "survey" => SURVEY,
        other => return Err(FormError::Unknown(other.to_string())),
    };
    load_spec(json)
}

pub fn event_registration() -> FormSpec {
    builtin("event-registration").expect("embedded event registration spec is valid")
}

pub fn job_application() -> FormSpec {
    builtin("job-application").expect("embedded job application spec is valid")
}

pub fn survey() -> FormSpec {
    builtin("survey").expect("embedded survey spec is valid")
}

/// Rejects specs whose references do not line up: duplicate field names,
/// fields in undeclared sections, predicates over unknown fields, flags
/// without keys or a topic field that does not exist.
pub fn check_spec(spec: &FormSpec) -> Result<(), FormError> {
    let invalid = |reason: String| FormError::Invalid {
        form: spec.id.clone(),
        reason,
    };

    let mut names = BTreeSet::new();
    for field in &spec.fields {
        if !names.insert(field.name.as_str()) {
            return Err(invalid(format!("field '{}' is declared twice", field.name)));
        }
    }

    let sections: BTreeSet<&str> = spec.sections.iter().map(|s| s.id.as_str()).collect();
    for field in &spec.fields {
        if let Some(section) = &field.section
            && !sections.contains(section.as_str())
        {
            return Err(invalid(format!(
                "field '{}' uses undeclared section '{}'",
                field.name, section
            )));
        }
        if field.kind == FieldKind::Flags && field.flag_keys().is_empty() {
            return Err(invalid(format!("flags field '{}' has no keys", field.name)));
        }
    }

    for section in &spec.sections {
        if section.id == ADDITIONAL_QUESTIONS_SECTION {
            return Err(invalid(format!("section id '{}' is reserved", section.id)));
        }
        if let Some(unknown) = section
            .active_if
            .fields()
            .into_iter()
            .find(|name| !names.contains(name))
        {
            return Err(invalid(format!(
                "section '{}' refers to unknown field '{}'",
                section.id, unknown
            )));
        }
    }

    if let Some(topic) = spec.topic_field()
        && !names.contains(topic)
    {
        return Err(invalid(format!("topic field '{}' is not declared", topic)));
    }

    Ok(())
}
