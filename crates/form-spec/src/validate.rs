use regex::Regex;

use crate::errors::{ErrorMap, ValidationError};
use crate::spec::field::{FieldKind, FieldSpec, Rule};
use crate::spec::form::FormSpec;
use crate::store::{FieldStore, FieldValue};
use crate::visibility::{ActiveSections, resolve_sections};

/// Validates every active field of `store`, collecting one error per failing field.
///
/// Fields in inactive sections are ignored regardless of their stored value,
/// and dynamic questions carry no rules.
pub fn validate(spec: &FormSpec, store: &FieldStore) -> ErrorMap {
    let active = resolve_sections(spec, store, None);
    validate_with(spec, store, &active)
}

/// Same as [`validate`] with an already resolved section set.
pub fn validate_with(spec: &FormSpec, store: &FieldStore, active: &ActiveSections) -> ErrorMap {
    let mut errors = ErrorMap::new();

    for field in spec.fields.iter().filter(|field| active.includes(field)) {
        let Some(value) = store.get(&field.name) else {
            continue;
        };
        if let Some(error) = validate_value(field, value) {
            errors.insert(error);
        }
    }

    errors
}

fn validate_value(field: &FieldSpec, value: &FieldValue) -> Option<ValidationError> {
    field
        .rules
        .iter()
        .find_map(|rule| enforce_rule(field, value, rule))
}

fn enforce_rule(field: &FieldSpec, value: &FieldValue, rule: &Rule) -> Option<ValidationError> {
    let passed = match rule {
        Rule::Required { .. } => is_present(field, value),
        Rule::Pattern { pattern, .. } => {
            let text = value.as_text().unwrap_or("");
            match Regex::new(pattern) {
                Ok(regex) => regex.is_match(text),
                Err(_) => {
                    return Some(base_error(
                        field,
                        &format!("invalid pattern for {}", field.label),
                        "invalid_pattern",
                    ));
                }
            }
        }
        Rule::Numeric { .. } => value.as_text().and_then(parse_number).is_some(),
        Rule::PositiveNumber { .. } => value
            .as_text()
            .and_then(parse_number)
            .is_some_and(|number| number > 0.0),
        Rule::MinLength { min, .. } => value
            .as_text()
            .is_some_and(|text| text.trim().chars().count() >= *min),
    };

    if passed {
        None
    } else {
        Some(base_error(field, rule.message(), rule.code()))
    }
}

fn is_present(field: &FieldSpec, value: &FieldValue) -> bool {
    match (field.kind, value) {
        (FieldKind::Boolean, FieldValue::Bool(flag)) => *flag,
        (FieldKind::DateTime, FieldValue::DateTime(when)) => when.is_some(),
        (FieldKind::Flags, FieldValue::Flags(flags)) => flags.values().any(|on| *on),
        (kind, FieldValue::Text(text)) if kind.is_textual() => !text.trim().is_empty(),
        _ => false,
    }
}

/// Parses user-typed numeric text the way a browser number coercion does.
///
/// Surrounding whitespace is ignored; decimal, exponent, `0x`/`0o`/`0b`
/// prefixes and signed `Infinity` are accepted. Empty text and anything else
/// (including separators such as spaces or dashes inside the number) is not a
/// number.
pub fn parse_number(raw: &str) -> Option<f64> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }
    match text {
        "Infinity" | "+Infinity" => return Some(f64::INFINITY),
        "-Infinity" => return Some(f64::NEG_INFINITY),
        _ => {}
    }

    let lower = text.to_ascii_lowercase();
    for (prefix, radix) in [("0x", 16), ("0o", 8), ("0b", 2)] {
        if let Some(digits) = lower.strip_prefix(prefix) {
            return u64::from_str_radix(digits, radix)
                .ok()
                .map(|value| value as f64);
        }
    }

    if text
        .chars()
        .any(|ch| ch.is_ascii_alphabetic() && ch != 'e' && ch != 'E')
    {
        return None;
    }
    text.parse::<f64>().ok().filter(|value| !value.is_nan())
}

fn base_error(field: &FieldSpec, message: &str, code: &str) -> ValidationError {
    ValidationError {
        field: field.name.clone(),
        message: message.into(),
        code: code.into(),
    }
}
