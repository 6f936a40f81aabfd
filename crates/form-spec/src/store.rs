use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDateTime};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::spec::{FieldKind, FieldSpec, FormSpec};

/// Errors raised when a caller addresses something the schema does not declare.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("field '{0}' is not declared by the form")]
    UnknownField(String),
    #[error("field '{field}' has no flag named '{key}'")]
    UnknownFlag { field: String, key: String },
    #[error("field '{0}' is not a flags field")]
    NotFlags(String),
}

/// A stored field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Bool(bool),
    DateTime(Option<NaiveDateTime>),
    Flags(BTreeMap<String, bool>),
}

impl FieldValue {
    /// Empty value for a freshly created store.
    pub fn default_for(field: &FieldSpec) -> Self {
        match field.kind {
            FieldKind::Text | FieldKind::NumericText | FieldKind::Choice => {
                FieldValue::Text(String::new())
            }
            FieldKind::Boolean => FieldValue::Bool(false),
            FieldKind::DateTime => FieldValue::DateTime(None),
            FieldKind::Flags => FieldValue::Flags(
                field
                    .flag_keys()
                    .iter()
                    .map(|key| (key.clone(), false))
                    .collect(),
            ),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(flag) => Some(*flag),
            _ => None,
        }
    }

    pub fn as_date_time(&self) -> Option<NaiveDateTime> {
        match self {
            FieldValue::DateTime(value) => *value,
            _ => None,
        }
    }

    pub fn selected_flags(&self) -> Vec<&str> {
        match self {
            FieldValue::Flags(flags) => flags
                .iter()
                .filter(|(_, on)| **on)
                .map(|(key, _)| key.as_str())
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Text(text) => Value::String(text.clone()),
            FieldValue::Bool(flag) => Value::Bool(*flag),
            FieldValue::DateTime(Some(when)) => Value::String(format_date_time(when)),
            FieldValue::DateTime(None) => Value::Null,
            FieldValue::Flags(flags) => Value::Object(
                flags
                    .iter()
                    .map(|(key, on)| (key.clone(), Value::Bool(*on)))
                    .collect(),
            ),
        }
    }

    /// Coerces `self` into the kind declared by `field`.
    ///
    /// Flags values are merged into `current`, keeping siblings and dropping
    /// keys the field does not declare.
    fn coerce(self, field: &FieldSpec, current: &FieldValue) -> FieldValue {
        match field.kind {
            FieldKind::Text | FieldKind::NumericText | FieldKind::Choice => {
                FieldValue::Text(self.into_text())
            }
            FieldKind::Boolean => FieldValue::Bool(match self {
                FieldValue::Bool(flag) => flag,
                FieldValue::Text(text) => parse_bool(&text),
                FieldValue::DateTime(value) => value.is_some(),
                FieldValue::Flags(flags) => flags.values().any(|on| *on),
            }),
            FieldKind::DateTime => FieldValue::DateTime(match self {
                FieldValue::DateTime(value) => value,
                FieldValue::Text(text) => parse_date_time(&text),
                _ => None,
            }),
            FieldKind::Flags => {
                let mut merged = match current {
                    FieldValue::Flags(flags) => flags.clone(),
                    _ => BTreeMap::new(),
                };
                if let FieldValue::Flags(incoming) = self {
                    for (key, on) in incoming {
                        if let Some(slot) = merged.get_mut(&key) {
                            *slot = on;
                        }
                    }
                }
                FieldValue::Flags(merged)
            }
        }
    }

    fn into_text(self) -> String {
        match self {
            FieldValue::Text(text) => text,
            FieldValue::Bool(flag) => flag.to_string(),
            FieldValue::DateTime(Some(when)) => format_date_time(&when),
            FieldValue::DateTime(None) => String::new(),
            FieldValue::Flags(flags) => flags
                .into_iter()
                .filter(|(_, on)| *on)
                .map(|(key, _)| key)
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// Builds a loosely typed value from JSON input; `coerce` settles the kind.
    pub fn from_json(value: &Value) -> FieldValue {
        match value {
            Value::Null => FieldValue::DateTime(None),
            Value::Bool(flag) => FieldValue::Bool(*flag),
            Value::String(text) => FieldValue::Text(text.clone()),
            Value::Number(num) => FieldValue::Text(num.to_string()),
            Value::Array(items) => FieldValue::Flags(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|key| (key.to_string(), true))
                    .collect(),
            ),
            Value::Object(map) => FieldValue::Flags(
                map.iter()
                    .map(|(key, on)| (key.clone(), on.as_bool().unwrap_or(false)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(value: NaiveDateTime) -> Self {
        FieldValue::DateTime(Some(value))
    }
}

fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "true" | "t" | "yes" | "y" | "on" | "1"
    )
}

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parses the accepted date-time spellings; anything else is treated as unset.
pub fn parse_date_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_local());
    }
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}

pub fn format_date_time(value: &NaiveDateTime) -> String {
    value.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Current values of every field a form declares, plus dynamic question answers.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldStore {
    values: BTreeMap<String, FieldValue>,
    dynamic: Vec<FieldSpec>,
}

impl FieldStore {
    pub fn new(spec: &FormSpec) -> Self {
        let values = spec
            .fields
            .iter()
            .map(|field| (field.name.clone(), FieldValue::default_for(field)))
            .collect();
        Self {
            values,
            dynamic: Vec::new(),
        }
    }

    /// Replaces the stored value for `name`, coerced to the declared kind.
    pub fn set(
        &mut self,
        spec: &FormSpec,
        name: &str,
        value: impl Into<FieldValue>,
    ) -> Result<(), StoreError> {
        let field = self
            .field_spec(spec, name)
            .cloned()
            .ok_or_else(|| StoreError::UnknownField(name.to_string()))?;
        let slot = self
            .values
            .get_mut(name)
            .ok_or_else(|| StoreError::UnknownField(name.to_string()))?;
        let coerced = value.into().coerce(&field, slot);
        *slot = coerced;
        Ok(())
    }

    pub fn set_json(&mut self, spec: &FormSpec, name: &str, value: &Value) -> Result<(), StoreError> {
        self.set(spec, name, FieldValue::from_json(value))
    }

    /// Sets one key of a flags field, leaving its siblings untouched.
    pub fn set_flag(
        &mut self,
        spec: &FormSpec,
        name: &str,
        key: &str,
        on: bool,
    ) -> Result<(), StoreError> {
        let field = spec
            .field(name)
            .ok_or_else(|| StoreError::UnknownField(name.to_string()))?;
        if field.kind != FieldKind::Flags {
            return Err(StoreError::NotFlags(name.to_string()));
        }
        match self.values.get_mut(name) {
            Some(FieldValue::Flags(flags)) => match flags.get_mut(key) {
                Some(slot) => {
                    *slot = on;
                    Ok(())
                }
                None => Err(StoreError::UnknownFlag {
                    field: name.to_string(),
                    key: key.to_string(),
                }),
            },
            _ => Err(StoreError::UnknownField(name.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn text(&self, name: &str) -> &str {
        self.values
            .get(name)
            .and_then(FieldValue::as_text)
            .unwrap_or("")
    }

    pub fn values(&self) -> &BTreeMap<String, FieldValue> {
        &self.values
    }

    pub fn dynamic_fields(&self) -> &[FieldSpec] {
        &self.dynamic
    }

    /// Swaps the set of dynamic free-text fields.
    ///
    /// Entries whose name survives keep their value, new names start empty and
    /// dropped names are removed from the store. Names declared by `spec` are
    /// never added as dynamic fields nor removed.
    pub fn replace_dynamic(&mut self, spec: &FormSpec, fields: Vec<FieldSpec>) {
        let mut fields = fields;
        let mut seen = BTreeSet::new();
        fields.retain(|field| spec.field(&field.name).is_none() && seen.insert(field.name.clone()));

        for old in &self.dynamic {
            if spec.field(&old.name).is_none() && !fields.iter().any(|field| field.name == old.name) {
                self.values.remove(&old.name);
            }
        }
        for field in &fields {
            self.values
                .entry(field.name.clone())
                .or_insert_with(|| FieldValue::default_for(field));
        }
        self.dynamic = fields;
    }

    /// JSON object keyed by field name, used by section predicates and snapshots.
    pub fn to_value(&self) -> Value {
        let map: Map<String, Value> = self
            .values
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        Value::Object(map)
    }

    fn field_spec<'a>(&'a self, spec: &'a FormSpec, name: &str) -> Option<&'a FieldSpec> {
        spec.field(name)
            .or_else(|| self.dynamic.iter().find(|field| field.name == name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms;

    #[test]
    fn new_store_has_an_entry_for_every_field() {
        let spec = forms::job_application();
        let store = FieldStore::new(&spec);
        assert_eq!(store.values().len(), spec.fields.len());
        assert_eq!(store.get("interviewTime"), Some(&FieldValue::DateTime(None)));
        assert_eq!(store.get("additionalSkills").unwrap().selected_flags(), Vec::<&str>::new());
    }

    #[test]
    fn numeric_text_keeps_raw_formatting() {
        let spec = forms::event_registration();
        let mut store = FieldStore::new(&spec);
        store.set(&spec, "age", " 030 ").unwrap();
        assert_eq!(store.text("age"), " 030 ");
        store.set_json(&spec, "age", &serde_json::json!(42)).unwrap();
        assert_eq!(store.text("age"), "42");
    }

    #[test]
    fn set_flag_leaves_siblings_untouched() {
        let spec = forms::job_application();
        let mut store = FieldStore::new(&spec);
        store.set_flag(&spec, "additionalSkills", "CSS", true).unwrap();
        store.set_flag(&spec, "additionalSkills", "Python", true).unwrap();
        store.set_flag(&spec, "additionalSkills", "CSS", false).unwrap();
        assert_eq!(
            store.get("additionalSkills").unwrap().selected_flags(),
            vec!["Python"]
        );
        assert_eq!(
            store.set_flag(&spec, "additionalSkills", "Rust", true),
            Err(StoreError::UnknownFlag {
                field: "additionalSkills".into(),
                key: "Rust".into()
            })
        );
    }

    #[test]
    fn unknown_field_is_rejected() {
        let spec = forms::event_registration();
        let mut store = FieldStore::new(&spec);
        assert_eq!(
            store.set(&spec, "nickname", "x"),
            Err(StoreError::UnknownField("nickname".into()))
        );
        assert!(store.get("nickname").is_none());
    }

    #[test]
    fn checkbox_and_date_inputs_are_coerced() {
        let spec = forms::job_application();
        let mut store = FieldStore::new(&spec);
        store.set(&spec, "interviewTime", "2026-03-04 09:30").unwrap();
        assert_eq!(
            store.get("interviewTime").and_then(FieldValue::as_date_time),
            parse_date_time("2026-03-04T09:30:00")
        );
        store.set(&spec, "interviewTime", "next tuesday").unwrap();
        assert_eq!(store.get("interviewTime"), Some(&FieldValue::DateTime(None)));

        let event = forms::event_registration();
        let mut store = FieldStore::new(&event);
        store.set(&event, "isAttendingWithGuest", "on").unwrap();
        assert_eq!(store.get("isAttendingWithGuest"), Some(&FieldValue::Bool(true)));
    }

    #[test]
    fn replacing_dynamic_fields_drops_stale_names() {
        let spec = forms::survey();
        let mut store = FieldStore::new(&spec);
        store.replace_dynamic(
            &spec,
            vec![
                FieldSpec::dynamic("ide", "IDE", "additional_questions"),
                FieldSpec::dynamic("os", "OS", "additional_questions"),
            ],
        );
        store.set(&spec, "ide", "helix").unwrap();
        store.replace_dynamic(&spec, vec![FieldSpec::dynamic("ide", "IDE", "additional_questions")]);
        assert_eq!(store.text("ide"), "helix");
        assert!(store.get("os").is_none());
        store.replace_dynamic(&spec, Vec::new());
        assert!(store.get("ide").is_none());
        assert_eq!(store.values().len(), spec.fields.len());
    }

    #[test]
    fn dynamic_fields_never_shadow_declared_ones() {
        let spec = forms::survey();
        let mut store = FieldStore::new(&spec);
        store.set(&spec, "email", "ann@example.com").unwrap();
        store.replace_dynamic(
            &spec,
            vec![
                FieldSpec::dynamic("email", "Work email", "additional_questions"),
                FieldSpec::dynamic("ide", "IDE", "additional_questions"),
                FieldSpec::dynamic("ide", "Editor", "additional_questions"),
            ],
        );
        assert_eq!(store.dynamic_fields().len(), 1);
        assert_eq!(store.dynamic_fields()[0].label, "IDE");

        store.replace_dynamic(&spec, Vec::new());
        assert_eq!(store.text("email"), "ann@example.com");
        assert_eq!(store.values().len(), spec.fields.len());
    }
}
