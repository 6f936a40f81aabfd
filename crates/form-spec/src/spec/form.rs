use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::expr::Expr;
use crate::spec::field::FieldSpec;

/// Section id reserved for externally supplied questions.
pub const ADDITIONAL_QUESTIONS_SECTION: &str = "additional_questions";

/// Presentation hints for a form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FormPresentation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intro: Option<String>,
    /// Heading shown above a submitted snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_title: Option<String>,
    /// Handlebars template overriding the default snapshot summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_template: Option<String>,
}

/// A group of optional fields, active while `active_if` holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SectionSpec {
    pub id: String,
    pub active_if: Expr,
}

/// Enables the external question supplier, keyed by `topic_field`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuestionSource {
    pub topic_field: String,
}

/// Top-level form definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FormSpec {
    pub id: String,
    pub title: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presentation: Option<FormPresentation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sections: Vec<SectionSpec>,
    pub fields: Vec<FieldSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions: Option<QuestionSource>,
}

impl FormSpec {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn topic_field(&self) -> Option<&str> {
        self.questions
            .as_ref()
            .map(|source| source.topic_field.as_str())
    }

    pub fn success_title(&self) -> String {
        self.presentation
            .as_ref()
            .and_then(|presentation| presentation.success_title.clone())
            .unwrap_or_else(|| format!("{} submitted", self.title))
    }
}
