use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, warn};

use crate::errors::ErrorMap;
use crate::spec::form::{ADDITIONAL_QUESTIONS_SECTION, FormSpec};
use crate::spec::FieldSpec;
use crate::store::{FieldStore, FieldValue, StoreError};
use crate::supplier::{QuestionDescriptor, QuestionRequest, QuestionResponse, QuestionSet};
use crate::validate::validate_with;
use crate::visibility::{ActiveSections, active_fields, resolve_sections};

/// Immutable copy of the form data taken when a submission validates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmittedSnapshot {
    pub form_id: String,
    pub version: String,
    pub values: BTreeMap<String, FieldValue>,
    pub active_sections: ActiveSections,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<QuestionDescriptor>,
}

impl SubmittedSnapshot {
    pub fn value(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn to_cbor(&self) -> Result<Vec<u8>, serde_cbor::Error> {
        serde_cbor::to_vec(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Result of a submission attempt.
#[derive(Debug, PartialEq)]
pub enum SubmitOutcome<'a> {
    Accepted(&'a SubmittedSnapshot),
    Rejected(&'a ErrorMap),
}

/// What happened to a question lookup response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionsApplied {
    Applied,
    /// A newer lookup was issued, or the topic was cleared, since this one.
    Stale,
    /// The lookup failed; the previous questions are kept.
    Failed,
}

/// In-memory state of one form: values, last errors, last accepted snapshot
/// and, for topic-driven forms, the extra questions for the current topic.
#[derive(Debug, Clone)]
pub struct FormSession {
    spec: FormSpec,
    store: FieldStore,
    errors: ErrorMap,
    snapshot: Option<SubmittedSnapshot>,
    questions: QuestionSet,
    generation: u64,
}

impl FormSession {
    pub fn new(spec: FormSpec) -> Self {
        let store = FieldStore::new(&spec);
        Self {
            spec,
            store,
            errors: ErrorMap::new(),
            snapshot: None,
            questions: QuestionSet::default(),
            generation: 0,
        }
    }

    pub fn spec(&self) -> &FormSpec {
        &self.spec
    }

    pub fn store(&self) -> &FieldStore {
        &self.store
    }

    pub fn errors(&self) -> &ErrorMap {
        &self.errors
    }

    pub fn snapshot(&self) -> Option<&SubmittedSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn questions(&self) -> &QuestionSet {
        &self.questions
    }

    /// Updates one field.
    ///
    /// When the topic field of a question-backed form changes to a non-empty
    /// value, the lookup the caller must run is returned.
    pub fn set_field(
        &mut self,
        name: &str,
        value: impl Into<FieldValue>,
    ) -> Result<Option<QuestionRequest>, StoreError> {
        let previous_topic = self.current_topic().map(str::to_string);
        self.store.set(&self.spec, name, value)?;
        Ok(self.topic_changed(name, previous_topic))
    }

    pub fn set_field_json(
        &mut self,
        name: &str,
        value: &serde_json::Value,
    ) -> Result<Option<QuestionRequest>, StoreError> {
        self.set_field(name, FieldValue::from_json(value))
    }

    pub fn set_flag(&mut self, name: &str, key: &str, on: bool) -> Result<(), StoreError> {
        self.store.set_flag(&self.spec, name, key, on)
    }

    pub fn active_sections(&self) -> ActiveSections {
        let questions = self.spec.topic_field().map(|_| &self.questions);
        resolve_sections(&self.spec, &self.store, questions)
    }

    /// Declared and dynamic fields currently shown, in schema order.
    pub fn active_fields(&self) -> Vec<FieldSpec> {
        let active = self.active_sections();
        active_fields(&self.spec, &self.store, &active)
            .cloned()
            .collect()
    }

    pub fn validate(&self) -> ErrorMap {
        validate_with(&self.spec, &self.store, &self.active_sections())
    }

    /// Validates and either publishes the errors or records a new snapshot.
    ///
    /// A rejected submission leaves the previous snapshot in place.
    pub fn submit(&mut self) -> SubmitOutcome<'_> {
        let errors = self.validate();
        if !errors.is_empty() {
            debug!(form = %self.spec.id, errors = errors.len(), "submission rejected");
            self.errors = errors;
            return SubmitOutcome::Rejected(&self.errors);
        }

        self.errors = ErrorMap::new();
        let active_sections = self.active_sections();
        let questions = if active_sections.contains(ADDITIONAL_QUESTIONS_SECTION) {
            self.questions.descriptors.clone()
        } else {
            Vec::new()
        };
        let values = self
            .store
            .values()
            .iter()
            .filter(|(name, _)| {
                self.spec.field(name).is_some() || questions.iter().any(|q| &q.name == *name)
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        debug!(form = %self.spec.id, "submission accepted");
        SubmitOutcome::Accepted(self.snapshot.insert(SubmittedSnapshot {
            form_id: self.spec.id.clone(),
            version: self.spec.version.clone(),
            values,
            active_sections,
            questions,
        }))
    }

    /// Applies a lookup response if it is still the latest one issued.
    pub fn apply_questions(&mut self, response: QuestionResponse) -> QuestionsApplied {
        let QuestionResponse { request, result } = response;
        if request.generation != self.generation {
            debug!(
                topic = %request.topic,
                generation = request.generation,
                latest = self.generation,
                "discarding stale question response"
            );
            return QuestionsApplied::Stale;
        }

        match result {
            Ok(descriptors) => {
                let descriptors = self.usable_descriptors(descriptors);
                let fields = descriptors
                    .iter()
                    .map(|descriptor| {
                        FieldSpec::dynamic(
                            &descriptor.name,
                            &descriptor.label,
                            ADDITIONAL_QUESTIONS_SECTION,
                        )
                    })
                    .collect();
                self.store.replace_dynamic(&self.spec, fields);
                self.questions = QuestionSet {
                    topic: request.topic,
                    descriptors,
                };
                QuestionsApplied::Applied
            }
            Err(err) => {
                warn!(topic = %request.topic, error = %err, "error fetching additional questions");
                QuestionsApplied::Failed
            }
        }
    }

    /// Drops descriptors that reuse a declared field name or repeat an earlier one.
    fn usable_descriptors(&self, descriptors: Vec<QuestionDescriptor>) -> Vec<QuestionDescriptor> {
        let mut seen = BTreeSet::new();
        descriptors
            .into_iter()
            .filter(|descriptor| {
                if self.spec.field(&descriptor.name).is_some() {
                    warn!(name = %descriptor.name, "ignoring question that reuses a form field name");
                    return false;
                }
                seen.insert(descriptor.name.clone())
            })
            .collect()
    }

    fn current_topic(&self) -> Option<&str> {
        self.spec
            .topic_field()
            .map(|topic_field| self.store.text(topic_field))
    }

    fn topic_changed(&mut self, name: &str, previous: Option<String>) -> Option<QuestionRequest> {
        if self.spec.topic_field() != Some(name) {
            return None;
        }
        let topic = self.current_topic()?.to_string();
        if previous.as_deref() == Some(topic.as_str()) {
            return None;
        }

        self.generation += 1;
        if topic.is_empty() {
            self.questions = QuestionSet::default();
            self.store.replace_dynamic(&self.spec, Vec::new());
            return None;
        }
        Some(QuestionRequest {
            generation: self.generation,
            topic,
        })
    }
}
