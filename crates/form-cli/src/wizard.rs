use std::fmt::Write;

use form_spec::{
    ErrorMap, FieldKind, FieldSpec, FormSession, SubmittedSnapshot, render::render_errors,
};

/// Controls which bits of state the wizard prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Clean output: field prompts only.
    Clean,
    /// Verbose output: active sections, visible fields, parse expectations.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

/// Prints prompts, errors and the final summary for the fill wizard.
pub struct WizardPresenter {
    verbosity: Verbosity,
    header_printed: bool,
    show_answers_json: bool,
}

impl WizardPresenter {
    pub fn new(verbosity: Verbosity, show_answers_json: bool) -> Self {
        Self {
            verbosity,
            header_printed: false,
            show_answers_json,
        }
    }

    pub fn show_header(&mut self, session: &FormSession) {
        if self.header_printed {
            return;
        }
        let spec = session.spec();
        println!("Form: {}", spec.title);
        if self.verbosity.is_verbose()
            && let Some(help) = spec
                .presentation
                .as_ref()
                .and_then(|presentation| presentation.intro.as_ref())
                .or(spec.description.as_ref())
        {
            println!("Help: {}", help);
        }
        self.header_printed = true;
    }

    pub fn show_status(&self, session: &FormSession) {
        if !self.verbosity.is_verbose() {
            return;
        }
        let sections = session.active_sections();
        let listed = sections.iter().collect::<Vec<_>>().join(", ");
        println!(
            "Active sections: {}",
            if listed.is_empty() { "-" } else { listed.as_str() }
        );
        println!("Visible fields:");
        for field in session.active_fields() {
            let mut entry = format!(" - {} ({})", field.name, field.label);
            if field.is_required() {
                entry.push_str(" [required]");
            }
            println!("{}", entry);
        }
    }

    pub fn show_prompt(&self, prompt: &PromptContext) {
        let mut line = if prompt.total > 0 {
            format!("{}/{} {}", prompt.index, prompt.total, prompt.label)
        } else {
            format!("{} {}", prompt.index, prompt.label)
        };
        if prompt.required {
            line.push_str(" *");
        }
        if let Some(hint) = &prompt.hint {
            line.push(' ');
            line.push_str(hint);
        }
        println!("{}", line);
        if let Some(error) = &prompt.error {
            println!("  ({})", error);
        }
        if self.verbosity.is_verbose() && !prompt.choices.is_empty() {
            println!("Choices: {}", prompt.choices.join(", "));
        }
    }

    pub fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.user_message);
        if self.verbosity.is_verbose()
            && let Some(debug) = &error.debug_message
        {
            eprintln!("  Expected: {}", debug);
        }
    }

    pub fn show_errors(&self, errors: &ErrorMap) {
        eprintln!("Please correct the following:");
        for line in render_errors(errors) {
            eprintln!("  {}", line);
        }
    }

    pub fn show_completion(&self, snapshot: &SubmittedSnapshot, summary: &str) {
        println!("{}", summary);
        match snapshot.to_cbor() {
            Ok(bytes) => {
                println!("Snapshot (CBOR hex): {}", encode_hex(&bytes));
            }
            Err(err) => {
                eprintln!("Failed to serialize snapshot to CBOR: {}", err);
            }
        }
        if self.show_answers_json {
            match snapshot.to_json_pretty() {
                Ok(pretty) => println!("{}", pretty),
                Err(err) => {
                    eprintln!("Failed to serialize snapshot to JSON: {}", err);
                }
            }
        }
    }
}

/// Context used to format a single prompt.
pub struct PromptContext {
    pub index: usize,
    pub total: usize,
    pub label: String,
    pub required: bool,
    pub hint: Option<String>,
    pub choices: Vec<String>,
    pub error: Option<String>,
}

impl PromptContext {
    pub fn new(field: &FieldSpec, index: usize, total: usize, error: Option<&str>) -> Self {
        let choices = field.choices.clone().unwrap_or_default();
        Self {
            index: index.max(1),
            total,
            label: field.label.clone(),
            required: field.is_required(),
            hint: hint_for(field.kind, &choices),
            choices,
            error: error.map(str::to_string),
        }
    }
}

fn hint_for(kind: FieldKind, choices: &[String]) -> Option<String> {
    match kind {
        FieldKind::Boolean => Some("(yes/no)".to_string()),
        FieldKind::NumericText => Some("(number)".to_string()),
        FieldKind::DateTime => Some("(YYYY-MM-DD HH:MM)".to_string()),
        FieldKind::Choice if !choices.is_empty() => Some(format!("({})", choices.join("/"))),
        FieldKind::Flags if !choices.is_empty() => {
            Some(format!("(comma-separated: {})", choices.join(", ")))
        }
        _ => None,
    }
}

/// Error produced when parsing answers from the user.
#[derive(Debug)]
pub struct AnswerParseError {
    pub user_message: String,
    pub debug_message: Option<String>,
}

impl AnswerParseError {
    pub fn new(user_message: impl Into<String>, debug_message: Option<String>) -> Self {
        Self {
            user_message: user_message.into(),
            debug_message,
        }
    }
}

pub fn encode_hex(bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        write!(&mut encoded, "{:02x}", byte).expect("writing to string cannot fail");
    }
    encoded
}
