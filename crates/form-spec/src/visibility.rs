use std::collections::BTreeSet;

use crate::spec::form::{ADDITIONAL_QUESTIONS_SECTION, FormSpec};
use crate::spec::FieldSpec;
use crate::store::FieldStore;
use crate::supplier::QuestionSet;

/// Section ids currently active for a form.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub struct ActiveSections(BTreeSet<String>);

impl ActiveSections {
    pub fn contains(&self, section: &str) -> bool {
        self.0.contains(section)
    }

    /// Whether `field` belongs to no section or to an active one.
    pub fn includes(&self, field: &FieldSpec) -> bool {
        field
            .section
            .as_deref()
            .is_none_or(|section| self.contains(section))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> From<[&str; N]> for ActiveSections {
    fn from(sections: [&str; N]) -> Self {
        Self(sections.iter().map(|section| section.to_string()).collect())
    }
}

/// Resolves which optional sections apply to the current store.
///
/// Sections whose predicate references a missing field stay inactive. The
/// additional-questions section is active only when `questions` holds a
/// non-empty descriptor list fetched for the topic currently stored.
pub fn resolve_sections(
    spec: &FormSpec,
    store: &FieldStore,
    questions: Option<&QuestionSet>,
) -> ActiveSections {
    let ctx = store.to_value();
    let mut active = BTreeSet::new();

    for section in &spec.sections {
        if section.active_if.evaluate(&ctx).unwrap_or(false) {
            active.insert(section.id.clone());
        }
    }

    if let (Some(topic_field), Some(questions)) = (spec.topic_field(), questions)
        && !questions.descriptors.is_empty()
        && questions.topic == store.text(topic_field)
    {
        active.insert(ADDITIONAL_QUESTIONS_SECTION.to_string());
    }

    ActiveSections(active)
}

/// Declared and dynamic fields that are currently active, in schema order.
pub fn active_fields<'a>(
    spec: &'a FormSpec,
    store: &'a FieldStore,
    active: &'a ActiveSections,
) -> impl Iterator<Item = &'a FieldSpec> + 'a {
    spec.fields
        .iter()
        .chain(store.dynamic_fields().iter())
        .filter(move |field| active.includes(field))
}
