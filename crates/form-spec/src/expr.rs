use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lightweight expression AST used for section `active_if` predicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Expr {
    LiteralBool { value: bool },
    Equals { field: String, value: Value },
    In { field: String, values: Vec<Value> },
    Truthy { field: String },
    And { expressions: Vec<Expr> },
    Or { expressions: Vec<Expr> },
    Not { expression: Box<Expr> },
}

impl Expr {
    fn get_value<'a>(ctx: &'a Value, field: &str) -> Option<&'a Value> {
        ctx.get(field)
    }

    /// Evaluates the expression against a field-name keyed object.
    ///
    /// Returns `None` when a referenced field is absent from `ctx`.
    pub fn evaluate(&self, ctx: &Value) -> Option<bool> {
        match self {
            Expr::LiteralBool { value } => Some(*value),
            Expr::Equals { field, value } => Self::get_value(ctx, field).map(|v| v == value),
            Expr::In { field, values } => {
                let current = Self::get_value(ctx, field)?;
                Some(values.iter().any(|candidate| candidate == current))
            }
            Expr::Truthy { field } => Self::get_value(ctx, field).map(is_truthy),
            Expr::And { expressions } => {
                for expr in expressions {
                    match expr.evaluate(ctx) {
                        Some(true) => continue,
                        Some(false) => return Some(false),
                        None => return None,
                    }
                }
                Some(true)
            }
            Expr::Or { expressions } => {
                for expr in expressions {
                    if let Some(true) = expr.evaluate(ctx) {
                        return Some(true);
                    }
                }
                Some(false)
            }
            Expr::Not { expression } => expression.evaluate(ctx).map(|value| !value),
        }
    }

    /// Field names the expression reads.
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Expr::LiteralBool { .. } => Vec::new(),
            Expr::Equals { field, .. } | Expr::In { field, .. } | Expr::Truthy { field } => {
                vec![field.as_str()]
            }
            Expr::And { expressions } | Expr::Or { expressions } => {
                expressions.iter().flat_map(Expr::fields).collect()
            }
            Expr::Not { expression } => expression.fields(),
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::String(text) => !text.is_empty(),
        Value::Number(num) => num.as_f64().is_some_and(|n| n != 0.0),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn in_matches_any_listed_value() {
        let expr = Expr::In {
            field: "position".into(),
            values: vec![json!("Developer"), json!("Designer")],
        };
        assert_eq!(expr.evaluate(&json!({ "position": "Designer" })), Some(true));
        assert_eq!(expr.evaluate(&json!({ "position": "Manager" })), Some(false));
        assert_eq!(expr.evaluate(&json!({})), None);
    }

    #[test]
    fn deserializes_tagged_form() {
        let expr: Expr = serde_json::from_value(json!({
            "op": "and",
            "expressions": [
                { "op": "truthy", "field": "isAttendingWithGuest" },
                { "op": "not", "expression": { "op": "equals", "field": "guestName", "value": "" } }
            ]
        }))
        .expect("expr");
        let ctx = json!({ "isAttendingWithGuest": true, "guestName": "Bo" });
        assert_eq!(expr.evaluate(&ctx), Some(true));
        assert_eq!(expr.fields(), vec!["isAttendingWithGuest", "guestName"]);
    }
}
