//! Loose value semantics shared by condition evaluation and coercion.
//!
//! Mapping rules are authored against untyped JSON, so stringification and
//! numeric views follow script-style coercion: arrays join with commas, and
//! `0`, `""`, `false` and `null` are falsy. Equality stays strict.

use serde_json::{Number, Value};

/// Falsy values are `null`, `false`, `0`, `NaN` and the empty string.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number
            .as_f64()
            .map(|n| n != 0.0 && !n.is_nan())
            .unwrap_or(true),
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

pub fn number_to_string(number: &Number) -> String {
    if let Some(i) = number.as_i64() {
        return i.to_string();
    }
    if let Some(u) = number.as_u64() {
        return u.to_string();
    }
    // f64 Display drops a trailing ".0"
    number.as_f64().map(|f| f.to_string()).unwrap_or_default()
}

/// Text form of a value. Objects render as compact JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number_to_string(number),
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => stringify(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => value.to_string(),
    }
}

/// Numeric view of a value, `None` where the coercion yields NaN.
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Null => Some(0.0),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        Value::Number(number) => number.as_f64(),
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse::<f64>().ok().filter(|n| !n.is_nan())
            }
        }
        Value::Array(_) => to_number(&Value::String(stringify(value))),
        Value::Object(_) => None,
    }
}

/// Equality without coercion: both sides must have the same JSON type.
/// Numbers compare by value, so `4` equals `4.0`.
pub fn strict_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        _ => left == right,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(None));
        assert!(!is_truthy(Some(&json!(0))));
        assert!(!is_truthy(Some(&json!(""))));
        assert!(!is_truthy(Some(&json!(false))));
        assert!(!is_truthy(Some(&Value::Null)));
        assert!(is_truthy(Some(&json!("0"))));
        assert!(is_truthy(Some(&json!([]))));
    }

    #[test]
    fn test_stringify() {
        assert_eq!(stringify(&json!(4)), "4");
        assert_eq!(stringify(&json!(4.5)), "4.5");
        assert_eq!(stringify(&json!(4.0)), "4");
        assert_eq!(stringify(&json!([1, "a", null])), "1,a,");
        assert_eq!(stringify(&json!({"a": 1})), r#"{"a":1}"#);
    }

    #[test]
    fn test_strict_equality() {
        assert!(strict_eq(&json!(4), &json!(4.0)));
        assert!(strict_eq(&json!("true car"), &json!("true car")));
        assert!(!strict_eq(&json!(1), &json!("1")));
        assert!(!strict_eq(&json!(true), &json!(1)));
        assert!(!strict_eq(&json!("true"), &json!(true)));
        assert!(!strict_eq(&json!(null), &json!(0)));
    }
}
