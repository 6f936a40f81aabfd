use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Value kinds a field can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    /// Free text that is only parsed as a number by the validator.
    NumericText,
    /// Single selection out of `choices`, stored as text.
    Choice,
    Boolean,
    DateTime,
    /// Fixed-key boolean record; the keys are the field's `choices`.
    Flags,
}

impl FieldKind {
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            FieldKind::Text | FieldKind::NumericText | FieldKind::Choice
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::NumericText => "numeric_text",
            FieldKind::Choice => "choice",
            FieldKind::Boolean => "boolean",
            FieldKind::DateTime => "date_time",
            FieldKind::Flags => "flags",
        }
    }
}

/// A single validation rule attached to a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Rule {
    Required { message: String },
    Pattern { pattern: String, message: String },
    Numeric { message: String },
    PositiveNumber { message: String },
    MinLength { min: usize, message: String },
}

impl Rule {
    pub fn message(&self) -> &str {
        match self {
            Rule::Required { message }
            | Rule::Pattern { message, .. }
            | Rule::Numeric { message }
            | Rule::PositiveNumber { message }
            | Rule::MinLength { message, .. } => message,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Rule::Required { .. } => "required",
            Rule::Pattern { .. } => "pattern_mismatch",
            Rule::Numeric { .. } => "not_numeric",
            Rule::PositiveNumber { .. } => "not_positive",
            Rule::MinLength { .. } => "min_length",
        }
    }
}

/// Declaration of one named field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldSpec {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    /// Optional section the field belongs to; fields without one are always active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,
    /// Appended to the value when a submitted snapshot is displayed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_suffix: Option<String>,
}

impl FieldSpec {
    /// Free-text field used for externally supplied questions.
    pub fn dynamic(name: &str, label: &str, section: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            kind: FieldKind::Text,
            section: Some(section.to_string()),
            choices: None,
            rules: Vec::new(),
            display_suffix: None,
        }
    }

    pub fn is_required(&self) -> bool {
        self.rules
            .iter()
            .any(|rule| !matches!(rule, Rule::Pattern { .. }))
    }

    pub fn flag_keys(&self) -> &[String] {
        match self.kind {
            FieldKind::Flags => self.choices.as_deref().unwrap_or_default(),
            _ => &[],
        }
    }
}
