use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::debug;

use form_spec::{
    FormError, FormSession, FormSpec, QuestionDescriptor, QuestionResponse, RenderError,
    RenderPayload, SubmitOutcome, build_render_payload, builtin, load_spec,
    render_json_ui as form_render_json_ui, render_snapshot, render_text as form_render_text,
};

#[derive(Debug, Error)]
enum ComponentError {
    #[error("failed to parse config: {0}")]
    ConfigParse(#[source] serde_json::Error),
    #[error("failed to parse answers: {0}")]
    AnswersParse(#[source] serde_json::Error),
    #[error("answers must be a JSON object")]
    AnswersShape,
    #[error("form '{0}' is not available")]
    FormUnavailable(String),
    #[error(transparent)]
    Form(#[from] FormError),
    #[error("json encode error: {0}")]
    JsonEncode(#[source] serde_json::Error),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Extra questions the host already fetched for `topic`.
#[derive(Debug, Deserialize, Serialize)]
struct ConfigQuestions {
    topic: String,
    #[serde(default)]
    descriptors: Vec<QuestionDescriptor>,
}

#[derive(Debug, Deserialize, Serialize, Default)]
struct ComponentConfig {
    #[serde(default)]
    form_spec_json: Option<String>,
    #[serde(default)]
    questions: Option<ConfigQuestions>,
}

fn parse_config(config_json: &str) -> Result<ComponentConfig, ComponentError> {
    if config_json.trim().is_empty() {
        Ok(ComponentConfig::default())
    } else {
        serde_json::from_str(config_json).map_err(ComponentError::ConfigParse)
    }
}

fn ensure_form(form_id: &str, config: &ComponentConfig) -> Result<FormSpec, ComponentError> {
    let spec = match &config.form_spec_json {
        Some(json) => load_spec(json)?,
        None => builtin(form_id)?,
    };
    if spec.id != form_id {
        Err(ComponentError::FormUnavailable(form_id.to_string()))
    } else {
        Ok(spec)
    }
}

fn parse_answers(answers_json: &str) -> Result<Map<String, Value>, ComponentError> {
    if answers_json.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str(answers_json).map_err(ComponentError::AnswersParse)? {
        Value::Object(map) => Ok(map),
        _ => Err(ComponentError::AnswersShape),
    }
}

/// Session loaded with answers, plus answer keys the form does not know.
struct LoadedSession {
    session: FormSession,
    unknown_fields: Vec<String>,
}

/// Replays `answers` as field edits.
///
/// Declared fields go first so a topic change can pick up the configured
/// questions before their answers are applied.
fn load_session(
    spec: FormSpec,
    config: ComponentConfig,
    answers: &Map<String, Value>,
) -> LoadedSession {
    let mut session = FormSession::new(spec);
    let mut pending_request = None;
    let mut deferred = Vec::new();

    for (name, value) in answers {
        if session.spec().field(name).is_some() {
            if let Ok(Some(request)) = session.set_field_json(name, value) {
                pending_request = Some(request);
            }
        } else {
            deferred.push((name, value));
        }
    }

    if let (Some(request), Some(questions)) = (pending_request, config.questions)
        && questions.topic == request.topic
    {
        session.apply_questions(QuestionResponse {
            request,
            result: Ok(questions.descriptors),
        });
    }

    let mut unknown_fields = Vec::new();
    for (name, value) in deferred {
        if session.set_field_json(name, value).is_err() {
            unknown_fields.push(name.clone());
        }
    }
    if !unknown_fields.is_empty() {
        debug!(fields = ?unknown_fields, "ignoring unknown answer fields");
    }

    LoadedSession {
        session,
        unknown_fields,
    }
}

fn open_session(
    form_id: &str,
    config_json: &str,
    answers_json: &str,
) -> Result<LoadedSession, ComponentError> {
    let config = parse_config(config_json)?;
    let spec = ensure_form(form_id, &config)?;
    let answers = parse_answers(answers_json)?;
    Ok(load_session(spec, config, &answers))
}

fn respond(result: Result<Value, ComponentError>) -> String {
    match result {
        Ok(value) => serde_json::to_string(&value).unwrap_or_else(|error| {
            json!({"error": format!("json encode: {}", error)}).to_string()
        }),
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

fn respond_string(result: Result<String, ComponentError>) -> String {
    match result {
        Ok(value) => value,
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

pub fn describe(form_id: &str, config_json: &str) -> String {
    respond(
        parse_config(config_json)
            .and_then(|config| ensure_form(form_id, &config))
            .and_then(|spec| serde_json::to_value(spec).map_err(ComponentError::JsonEncode)),
    )
}

pub fn active_sections(form_id: &str, config_json: &str, answers_json: &str) -> String {
    respond(open_session(form_id, config_json, answers_json).map(|loaded| {
        let sections = loaded.session.active_sections();
        json!({ "active_sections": sections })
    }))
}

pub fn validate_answers(form_id: &str, config_json: &str, answers_json: &str) -> String {
    respond(
        open_session(form_id, config_json, answers_json).and_then(|loaded| {
            let errors = loaded.session.validate();
            Ok(json!({
                "valid": errors.is_empty(),
                "errors": serde_json::to_value(&errors).map_err(ComponentError::JsonEncode)?,
                "unknown_fields": loaded.unknown_fields,
            }))
        }),
    )
}

pub fn submit_all(form_id: &str, config_json: &str, answers_json: &str) -> String {
    respond(
        open_session(form_id, config_json, answers_json).and_then(|loaded| {
            let LoadedSession {
                mut session,
                unknown_fields,
            } = loaded;
            let rejected = matches!(session.submit(), SubmitOutcome::Rejected(_));
            let response = match session.snapshot() {
                Some(snapshot) if !rejected => {
                    let summary = render_snapshot(session.spec(), snapshot)?;
                    json!({
                        "status": "submitted",
                        "snapshot": serde_json::to_value(snapshot).map_err(ComponentError::JsonEncode)?,
                        "summary": summary,
                        "unknown_fields": unknown_fields,
                    })
                }
                _ => json!({
                    "status": "error",
                    "errors": serde_json::to_value(session.errors()).map_err(ComponentError::JsonEncode)?,
                    "unknown_fields": unknown_fields,
                }),
            };
            Ok(response)
        }),
    )
}

fn render_payload(
    form_id: &str,
    config_json: &str,
    answers_json: &str,
) -> Result<RenderPayload, ComponentError> {
    let loaded = open_session(form_id, config_json, answers_json)?;
    Ok(build_render_payload(&loaded.session)?)
}

pub fn render_text(form_id: &str, config_json: &str, answers_json: &str) -> String {
    respond_string(
        render_payload(form_id, config_json, answers_json)
            .map(|payload| form_render_text(&payload)),
    )
}

pub fn render_json_ui(form_id: &str, config_json: &str, answers_json: &str) -> String {
    respond(
        render_payload(form_id, config_json, answers_json)
            .map(|payload| form_render_json_ui(&payload)),
    )
}
