use handlebars::Handlebars;
use serde::Serialize;
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::errors::ErrorMap;
use crate::session::{FormSession, SubmittedSnapshot};
use crate::spec::{FieldKind, FieldSpec, FormSpec};
use crate::store::FieldValue;

const SUMMARY_TEMPLATE: &str = "{{title}}\n{{#each entries}}\n{{label}}: {{value}}\n{{/each}}\n";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("summary template failed: {0}")]
    Template(#[from] handlebars::RenderError),
}

/// Status labels returned by the renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// Nothing has been accepted yet and the last attempt, if any, did not fail.
    Editing,
    /// The last submission attempt was rejected.
    Invalid,
    /// A snapshot has been accepted.
    Submitted,
}

impl RenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStatus::Editing => "editing",
            RenderStatus::Invalid => "invalid",
            RenderStatus::Submitted => "submitted",
        }
    }
}

/// Describes a single field for render outputs.
#[derive(Debug, Clone)]
pub struct RenderField {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    pub required: bool,
    pub visible: bool,
    pub current_value: Value,
    pub choices: Option<Vec<String>>,
    pub error: Option<String>,
}

/// Collected payload used by both text and JSON renderers.
#[derive(Debug, Clone)]
pub struct RenderPayload {
    pub form_id: String,
    pub form_title: String,
    pub form_version: String,
    pub status: RenderStatus,
    pub help: Option<String>,
    pub active_sections: Vec<String>,
    pub fields: Vec<RenderField>,
    pub summary: Option<String>,
}

/// Build the renderer payload from a session's current state.
pub fn build_render_payload(session: &FormSession) -> Result<RenderPayload, RenderError> {
    let spec = session.spec();
    let store = session.store();
    let active = session.active_sections();
    let errors = session.errors();

    let fields = spec
        .fields
        .iter()
        .chain(store.dynamic_fields().iter())
        .map(|field| RenderField {
            name: field.name.clone(),
            label: field.label.clone(),
            kind: field.kind,
            required: field.is_required(),
            visible: active.includes(field),
            current_value: store
                .get(&field.name)
                .map(FieldValue::to_json)
                .unwrap_or(Value::Null),
            choices: field.choices.clone(),
            error: errors.message(&field.name).map(str::to_string),
        })
        .collect();

    let summary = session
        .snapshot()
        .map(|snapshot| render_snapshot(spec, snapshot))
        .transpose()?;

    let status = if !errors.is_empty() {
        RenderStatus::Invalid
    } else if session.snapshot().is_some() {
        RenderStatus::Submitted
    } else {
        RenderStatus::Editing
    };

    Ok(RenderPayload {
        form_id: spec.id.clone(),
        form_title: spec.title.clone(),
        form_version: spec.version.clone(),
        status,
        help: spec
            .presentation
            .as_ref()
            .and_then(|presentation| presentation.intro.clone())
            .or_else(|| spec.description.clone()),
        active_sections: active.iter().map(str::to_string).collect(),
        fields,
        summary,
    })
}

/// Render the payload as a structured JSON-friendly value.
pub fn render_json_ui(payload: &RenderPayload) -> Value {
    let fields = payload
        .fields
        .iter()
        .map(|field| {
            let mut map = Map::new();
            map.insert("name".into(), Value::String(field.name.clone()));
            map.insert("label".into(), Value::String(field.label.clone()));
            map.insert("type".into(), Value::String(field.kind.label().to_string()));
            map.insert("required".into(), Value::Bool(field.required));
            map.insert("visible".into(), Value::Bool(field.visible));
            map.insert("current_value".into(), field.current_value.clone());
            if let Some(choices) = &field.choices {
                map.insert(
                    "choices".into(),
                    Value::Array(choices.iter().cloned().map(Value::String).collect()),
                );
            }
            if let Some(error) = &field.error {
                map.insert("error".into(), Value::String(error.clone()));
            }
            Value::Object(map)
        })
        .collect::<Vec<_>>();

    json!({
        "form_id": payload.form_id,
        "form_title": payload.form_title,
        "form_version": payload.form_version,
        "status": payload.status.as_str(),
        "help": payload.help,
        "active_sections": payload.active_sections,
        "fields": fields,
        "summary": payload.summary,
    })
}

/// Render the payload as human-friendly text.
pub fn render_text(payload: &RenderPayload) -> String {
    let mut lines = Vec::new();
    lines.push(format!("Form: {} ({})", payload.form_title, payload.form_id));
    lines.push(format!("Status: {}", payload.status.as_str()));
    if let Some(help) = &payload.help {
        lines.push(format!("Help: {}", help));
    }

    lines.push("Visible fields:".to_string());
    for field in payload.fields.iter().filter(|field| field.visible) {
        let mut entry = format!(" - {} ({})", field.name, field.label);
        if field.required {
            entry.push_str(" [required]");
        }
        let shown = value_to_display(&field.current_value);
        if !shown.is_empty() {
            entry.push_str(&format!(" = {}", shown));
        }
        if let Some(error) = &field.error {
            entry.push_str(&format!(" ! {}", error));
        }
        lines.push(entry);
    }

    if let Some(summary) = &payload.summary {
        lines.push(String::new());
        lines.push(summary.clone());
    }

    lines.join("\n")
}

#[derive(Serialize)]
struct SummaryEntry {
    name: String,
    label: String,
    value: String,
}

/// Text summary of a snapshot listing only fields that were active when it was taken.
pub fn render_snapshot(spec: &FormSpec, snapshot: &SubmittedSnapshot) -> Result<String, RenderError> {
    let dynamic: Vec<FieldSpec> = snapshot
        .questions
        .iter()
        .map(|question| {
            FieldSpec::dynamic(
                &question.name,
                &question.label,
                crate::spec::form::ADDITIONAL_QUESTIONS_SECTION,
            )
        })
        .collect();

    let entries = spec
        .fields
        .iter()
        .chain(dynamic.iter())
        .filter(|field| snapshot.active_sections.includes(field))
        .filter_map(|field| {
            snapshot.value(&field.name).map(|value| SummaryEntry {
                name: field.name.clone(),
                label: field.label.clone(),
                value: display_value(field, value),
            })
        })
        .collect::<Vec<_>>();

    let values: Map<String, Value> = entries
        .iter()
        .map(|entry| (entry.name.clone(), Value::String(entry.value.clone())))
        .collect();

    let template = spec
        .presentation
        .as_ref()
        .and_then(|presentation| presentation.summary_template.as_deref())
        .unwrap_or(SUMMARY_TEMPLATE);

    let mut engine = Handlebars::new();
    engine.register_escape_fn(handlebars::no_escape);
    let rendered = engine.render_template(
        template,
        &json!({
            "title": spec.success_title(),
            "entries": entries,
            "values": values,
        }),
    )?;
    Ok(rendered.trim_end().to_string())
}

/// Formats a stored value for display next to its label.
pub fn display_value(field: &FieldSpec, value: &FieldValue) -> String {
    let shown = match value {
        FieldValue::Text(text) => text.clone(),
        FieldValue::Bool(true) => "Yes".to_string(),
        FieldValue::Bool(false) => "No".to_string(),
        FieldValue::DateTime(Some(when)) => when.format("%m/%d/%Y, %I:%M %p").to_string(),
        FieldValue::DateTime(None) => String::new(),
        FieldValue::Flags(_) => value.selected_flags().join(", "),
    };
    match &field.display_suffix {
        Some(suffix) if !shown.is_empty() => format!("{}{}", shown, suffix),
        _ => shown,
    }
}

/// Field-name to message lines, sorted by field name.
pub fn render_errors(errors: &ErrorMap) -> Vec<String> {
    errors
        .iter()
        .map(|error| format!("{}: {}", error.field, error.message))
        .collect()
}

fn value_to_display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Object(map) => map
            .iter()
            .filter(|(_, on)| on.as_bool() == Some(true))
            .map(|(key, _)| key.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}
