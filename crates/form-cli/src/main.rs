mod logging;
mod wizard;

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use form_component::{render_json_ui, render_text, submit_all, validate_answers};
use form_spec::{
    BUILTIN_IDS, FieldKind, FieldSpec, FormSession, FormSpec, HttpQuestionSupplier,
    QuestionRequest, QuestionSupplier, QuestionsApplied, StaticQuestionSupplier, StoreError,
    SubmitOutcome,
    builtin, fetch_questions, load_spec, render_snapshot, spec_schema,
};
use serde_json::{Map, Value};
use wizard::{AnswerParseError, PromptContext, Verbosity, WizardPresenter};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

const QUESTIONS_URL_ENV: &str = "FORM_KIT_QUESTIONS_URL";

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Fill, validate and submit the built-in forms",
    long_about = "Text wizard and JSON helpers for the event registration, job application and survey forms"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum RenderMode {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// List the built-in forms.
    List,
    /// Print a form spec as JSON.
    Describe {
        #[arg(long, value_name = "FORM")]
        form: String,
        /// Use this FormSpec JSON instead of the built-in one.
        #[arg(long, value_name = "SPEC")]
        spec: Option<PathBuf>,
    },
    /// Validate a JSON answers file.
    Validate {
        #[arg(long, value_name = "FORM")]
        form: String,
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
        #[arg(long, value_name = "SPEC")]
        spec: Option<PathBuf>,
    },
    /// Validate a JSON answers file and print the submitted summary.
    Submit {
        #[arg(long, value_name = "FORM")]
        form: String,
        #[arg(long, value_name = "ANSWERS")]
        answers: PathBuf,
        #[arg(long, value_name = "SPEC")]
        spec: Option<PathBuf>,
        /// Also print the snapshot as CBOR hex.
        #[arg(long)]
        cbor: bool,
        /// Also print the snapshot JSON.
        #[arg(long)]
        json: bool,
    },
    /// Fill a form interactively.
    Fill {
        #[arg(long, value_name = "FORM")]
        form: String,
        #[arg(long, value_name = "SPEC")]
        spec: Option<PathBuf>,
        /// Optional JSON file containing initial answers.
        #[arg(long, value_name = "ANSWERS")]
        answers: Option<PathBuf>,
        /// Endpoint for extra survey questions (falls back to FORM_KIT_QUESTIONS_URL).
        #[arg(long, value_name = "URL", conflicts_with = "questions_file")]
        questions_url: Option<String>,
        /// JSON file mapping topics to extra questions, used instead of an endpoint.
        #[arg(long, value_name = "FILE")]
        questions_file: Option<PathBuf>,
        /// Show verbose output (active sections, visible fields, parse expectations).
        #[arg(long, alias = "debug")]
        verbose: bool,
        /// Also emit the snapshot JSON.
        #[arg(long)]
        answers_json: bool,
        /// Render the form state before each prompt.
        #[arg(long, value_enum, value_name = "MODE")]
        render: Option<RenderMode>,
    },
    /// Print the JSON Schema of the form spec format.
    SpecSchema,
}

#[tokio::main]
async fn main() -> CliResult<()> {
    logging::init();
    let cli = Cli::parse();
    match cli.command {
        Command::List => run_list(),
        Command::Describe { form, spec } => run_describe(&form, spec),
        Command::Validate {
            form,
            answers,
            spec,
        } => run_validate(&form, answers, spec),
        Command::Submit {
            form,
            answers,
            spec,
            cbor,
            json,
        } => run_submit(&form, answers, spec, cbor, json),
        Command::Fill {
            form,
            spec,
            answers,
            questions_url,
            questions_file,
            verbose,
            answers_json,
            render,
        } => {
            let supplier = build_supplier(questions_url, questions_file)?;
            run_fill(
                &form,
                spec,
                answers,
                supplier,
                verbose,
                answers_json,
                render,
            )
            .await
        }
        Command::SpecSchema => {
            println!("{}", serde_json::to_string_pretty(&spec_schema())?);
            Ok(())
        }
    }
}

fn run_list() -> CliResult<()> {
    for id in BUILTIN_IDS {
        let spec = builtin(id)?;
        println!("{}\t{}", spec.id, spec.title);
    }
    Ok(())
}

fn load_form(form_id: &str, spec_path: Option<PathBuf>) -> CliResult<FormSpec> {
    let spec = match spec_path {
        Some(path) => load_spec(&fs::read_to_string(path)?)?,
        None => builtin(form_id)?,
    };
    if spec.id != form_id {
        return Err(format!("spec describes form '{}', not '{}'", spec.id, form_id).into());
    }
    Ok(spec)
}

fn config_json(spec_path: Option<PathBuf>) -> CliResult<String> {
    let mut config = Map::new();
    if let Some(path) = spec_path {
        config.insert(
            "form_spec_json".into(),
            Value::String(fs::read_to_string(path)?),
        );
    }
    Ok(Value::Object(config).to_string())
}

fn run_describe(form_id: &str, spec_path: Option<PathBuf>) -> CliResult<()> {
    let spec = load_form(form_id, spec_path)?;
    println!("{}", serde_json::to_string_pretty(&spec)?);
    Ok(())
}

fn parse_component_result(response: &str) -> CliResult<Value> {
    let value: Value = serde_json::from_str(response)?;
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        Err(error.into())
    } else {
        Ok(value)
    }
}

fn run_validate(form_id: &str, answers_path: PathBuf, spec_path: Option<PathBuf>) -> CliResult<()> {
    let config = config_json(spec_path)?;
    let answers = fs::read_to_string(answers_path)?;
    let result = parse_component_result(&validate_answers(form_id, &config, &answers))?;
    let valid = result["valid"].as_bool().unwrap_or(false);

    println!(
        "Validation result: {}",
        if valid { "valid" } else { "invalid" }
    );
    print_error_entries(&result["errors"]);
    print_unknown_fields(&result["unknown_fields"]);

    if valid {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn run_submit(
    form_id: &str,
    answers_path: PathBuf,
    spec_path: Option<PathBuf>,
    show_cbor: bool,
    show_json: bool,
) -> CliResult<()> {
    let config = config_json(spec_path)?;
    let answers = fs::read_to_string(answers_path)?;
    let result = parse_component_result(&submit_all(form_id, &config, &answers))?;
    print_unknown_fields(&result["unknown_fields"]);

    if result["status"] != "submitted" {
        print_error_entries(&result["errors"]);
        return Err("submission rejected".into());
    }

    println!("{}", result["summary"].as_str().unwrap_or_default());
    if show_cbor {
        let bytes = serde_cbor::to_vec(&result["snapshot"])?;
        println!("Snapshot (CBOR hex): {}", wizard::encode_hex(&bytes));
    }
    if show_json {
        println!("{}", serde_json::to_string_pretty(&result["snapshot"])?);
    }
    Ok(())
}

fn print_error_entries(errors: &Value) {
    let Some(errors) = errors.as_object().filter(|errors| !errors.is_empty()) else {
        return;
    };
    eprintln!("Errors:");
    for (field, error) in errors {
        eprintln!(
            "  {}: {}",
            field,
            error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("validation failed")
        );
    }
}

fn print_unknown_fields(fields: &Value) {
    let names = fields
        .as_array()
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    if !names.is_empty() {
        eprintln!("Unknown answer fields: {}", names.join(", "));
    }
}

fn build_supplier(
    questions_url: Option<String>,
    questions_file: Option<PathBuf>,
) -> CliResult<Arc<dyn QuestionSupplier>> {
    if let Some(path) = questions_file {
        let table = StaticQuestionSupplier::from_json(&fs::read_to_string(path)?)?;
        return Ok(Arc::new(table));
    }
    let supplier = match questions_url.or_else(|| env::var(QUESTIONS_URL_ENV).ok()) {
        Some(url) => HttpQuestionSupplier::new(url)?,
        None => HttpQuestionSupplier::with_config(Default::default())?,
    };
    Ok(Arc::new(supplier))
}

async fn run_fill(
    form_id: &str,
    spec_path: Option<PathBuf>,
    answers_path: Option<PathBuf>,
    supplier: Arc<dyn QuestionSupplier>,
    verbose: bool,
    answers_json: bool,
    render: Option<RenderMode>,
) -> CliResult<()> {
    let spec = load_form(form_id, spec_path.clone())?;
    let config = config_json(spec_path)?;
    let mut session = FormSession::new(spec);
    let mut answered = BTreeSet::new();

    if let Some(path) = answers_path {
        let initial: Value = serde_json::from_str(&fs::read_to_string(path)?)?;
        let initial = initial
            .as_object()
            .ok_or("initial answers must be a JSON object")?;
        let unknown =
            preload_answers(&mut session, supplier.as_ref(), initial, &mut answered).await?;
        if !unknown.is_empty() {
            eprintln!("Unknown answer fields: {}", unknown.join(", "));
        }
    }

    let mut presenter = WizardPresenter::new(Verbosity::from_verbose(verbose), answers_json);
    presenter.show_header(&session);

    loop {
        let fields = session.active_fields();
        let Some(position) = fields
            .iter()
            .position(|field| !answered.contains(&field.name))
        else {
            if matches!(session.submit(), SubmitOutcome::Rejected(_)) {
                presenter.show_errors(session.errors());
                for error in session.errors().iter() {
                    answered.remove(&error.field);
                }
                continue;
            }
            let snapshot = session
                .snapshot()
                .ok_or("submission accepted without a snapshot")?;
            let summary = render_snapshot(session.spec(), snapshot)?;
            presenter.show_completion(snapshot, &summary);
            return Ok(());
        };

        let field = &fields[position];
        presenter.show_status(&session);
        if let Some(mode) = render {
            print_render_output(mode, form_id, &config, &session);
        }
        let prompt = PromptContext::new(
            field,
            position + 1,
            fields.len(),
            session.errors().message(&field.name),
        );
        let answer = prompt_field(&prompt, field, &presenter)?;

        let request = apply_answer(&mut session, field, answer)?;
        refresh_questions(&mut session, supplier.as_ref(), request).await;
        answered.insert(field.name.clone());
    }
}

/// Applies initial answers and returns the names the form does not know.
///
/// Names rejected on the first pass are retried once the topic's extra
/// questions are loaded.
async fn preload_answers(
    session: &mut FormSession,
    supplier: &dyn QuestionSupplier,
    initial: &Map<String, Value>,
    answered: &mut BTreeSet<String>,
) -> CliResult<Vec<String>> {
    let mut deferred = Vec::new();
    for (name, value) in initial {
        match session.set_field_json(name, value) {
            Ok(request) => {
                refresh_questions(session, supplier, request).await;
                answered.insert(name.clone());
            }
            Err(StoreError::UnknownField(_)) => deferred.push((name, value)),
            Err(err) => return Err(err.into()),
        }
    }

    let mut unknown = Vec::new();
    for (name, value) in deferred {
        match session.set_field_json(name, value) {
            Ok(_) => {
                answered.insert(name.clone());
            }
            Err(StoreError::UnknownField(_)) => unknown.push(name.clone()),
            Err(err) => return Err(err.into()),
        }
    }
    Ok(unknown)
}

/// Runs the lookup a topic change asked for; failures keep the old questions.
async fn refresh_questions(
    session: &mut FormSession,
    supplier: &dyn QuestionSupplier,
    request: Option<QuestionRequest>,
) {
    let Some(request) = request else {
        return;
    };
    let response = fetch_questions(supplier, request).await;
    if session.apply_questions(response) == QuestionsApplied::Applied
        && !session.questions().descriptors.is_empty()
    {
        tracing::info!(
            count = session.questions().descriptors.len(),
            topic = %session.questions().topic,
            "additional questions loaded"
        );
    }
}

/// A parsed wizard answer.
#[derive(Debug, PartialEq)]
enum Answer {
    Value(Value),
    Flags(Vec<String>),
}

fn apply_answer(
    session: &mut FormSession,
    field: &FieldSpec,
    answer: Answer,
) -> CliResult<Option<QuestionRequest>> {
    match answer {
        Answer::Value(value) => Ok(session.set_field_json(&field.name, &value)?),
        Answer::Flags(selected) => {
            for key in field.flag_keys() {
                session.set_flag(&field.name, key, selected.contains(key))?;
            }
            Ok(None)
        }
    }
}

fn prompt_field(
    prompt: &PromptContext,
    field: &FieldSpec,
    presenter: &WizardPresenter,
) -> CliResult<Answer> {
    loop {
        presenter.show_prompt(prompt);
        print!("> ");
        io::stdout().flush()?;
        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Err("input closed before the form was submitted".into());
        }

        let line = input.trim_end_matches(['\n', '\r']);
        if line.trim().eq_ignore_ascii_case("exit") {
            return Err("wizard aborted by user".into());
        }

        match parse_answer(field, line) {
            Ok(answer) => return Ok(answer),
            Err(err) => presenter.show_parse_error(&err),
        }
    }
}

fn parse_answer(field: &FieldSpec, raw: &str) -> Result<Answer, AnswerParseError> {
    match field.kind {
        FieldKind::Text | FieldKind::NumericText => Ok(Answer::Value(Value::String(raw.into()))),
        FieldKind::Boolean => parse_boolean(raw).map(Answer::Value),
        FieldKind::Choice => parse_choice(field, raw).map(Answer::Value),
        FieldKind::DateTime => parse_date_time(raw).map(Answer::Value),
        FieldKind::Flags => parse_flags(field, raw).map(Answer::Flags),
    }
}

fn parse_boolean(raw: &str) -> Result<Value, AnswerParseError> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Ok(Value::Bool(true)),
        "" | "false" | "f" | "no" | "n" | "0" => Ok(Value::Bool(false)),
        _ => Err(AnswerParseError::new(
            "Please enter yes or no.",
            Some("expected boolean (y/n/true/false)".to_string()),
        )),
    }
}

fn parse_choice(field: &FieldSpec, raw: &str) -> Result<Value, AnswerParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Value::String(String::new()));
    }
    let allowed = field.choices.clone().unwrap_or_default();
    if let Some(choice) = allowed
        .iter()
        .find(|choice| choice.eq_ignore_ascii_case(raw))
    {
        Ok(Value::String(choice.to_string()))
    } else {
        Err(AnswerParseError::new(
            format!("Choose one of: {}.", allowed.join(", ")),
            Some(format!("allowed values: {}", allowed.join(", "))),
        ))
    }
}

fn parse_date_time(raw: &str) -> Result<Value, AnswerParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Value::Null);
    }
    match form_spec::store::parse_date_time(raw) {
        Some(_) => Ok(Value::String(raw.to_string())),
        None => Err(AnswerParseError::new(
            "Please enter a date and time like 2026-11-02 14:30.",
            Some("expected YYYY-MM-DD HH:MM or RFC 3339".to_string()),
        )),
    }
}

fn parse_flags(field: &FieldSpec, raw: &str) -> Result<Vec<String>, AnswerParseError> {
    let keys = field.flag_keys();
    let mut selected = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        match keys.iter().find(|key| key.eq_ignore_ascii_case(part)) {
            Some(key) => selected.push(key.clone()),
            None => {
                return Err(AnswerParseError::new(
                    format!("'{}' is not an option; choose from {}.", part, keys.join(", ")),
                    Some(format!("allowed values: {}", keys.join(", "))),
                ));
            }
        }
    }
    Ok(selected)
}

fn print_render_output(mode: RenderMode, form_id: &str, config: &str, session: &FormSession) {
    let answers = session.store().to_value().to_string();
    match mode {
        RenderMode::Text => println!("{}", render_text(form_id, config, &answers)),
        RenderMode::Json => println!("JSON UI:\n{}", render_json_ui(form_id, config, &answers)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use form_spec::forms;

    fn field<'a>(spec: &'a FormSpec, name: &str) -> &'a FieldSpec {
        spec.field(name).expect("field")
    }

    #[test]
    fn parse_answer_boolean_accepts_yes() {
        let spec = forms::event_registration();
        assert_eq!(
            parse_answer(field(&spec, "isAttendingWithGuest"), "yes").unwrap(),
            Answer::Value(Value::Bool(true))
        );
        assert!(parse_answer(field(&spec, "isAttendingWithGuest"), "maybe").is_err());
    }

    #[test]
    fn parse_answer_keeps_numeric_text_raw() {
        let spec = forms::event_registration();
        assert_eq!(
            parse_answer(field(&spec, "age"), " 30").unwrap(),
            Answer::Value(Value::String(" 30".into()))
        );
    }

    #[test]
    fn parse_answer_choice_checks_options() {
        let spec = forms::job_application();
        assert_eq!(
            parse_answer(field(&spec, "position"), "designer").unwrap(),
            Answer::Value(Value::String("Designer".into()))
        );
        assert!(parse_answer(field(&spec, "position"), "Intern").is_err());
    }

    #[test]
    fn parse_answer_flags_splits_on_commas() {
        let spec = forms::job_application();
        assert_eq!(
            parse_answer(field(&spec, "additionalSkills"), "css, python").unwrap(),
            Answer::Flags(vec!["CSS".into(), "Python".into()])
        );
        assert!(parse_answer(field(&spec, "additionalSkills"), "Rust").is_err());
    }

    #[test]
    fn parse_answer_date_time_requires_known_format() {
        let spec = forms::job_application();
        assert!(parse_answer(field(&spec, "interviewTime"), "2026-11-02 14:30").is_ok());
        assert!(parse_answer(field(&spec, "interviewTime"), "tomorrow").is_err());
        assert_eq!(
            parse_answer(field(&spec, "interviewTime"), "").unwrap(),
            Answer::Value(Value::Null)
        );
    }
}
