//! Coercion of extracted payload values into ontology data types.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Number, Value};

use crate::domain::{Conversion, DataType};
use crate::transform::value::stringify;

pub const DATE_OUTPUT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

const FREE_FORM_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

const FREE_FORM_DAY_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Converts `value` to `data_type`.
///
/// Returns `None` when the value already has the right shape and is used
/// unchanged, otherwise a [`Conversion`] carrying either the converted value
/// or the failure reason.
pub fn convert_value(
    data_type: DataType,
    value: Option<&Value>,
    date_format: Option<&str>,
) -> Option<Conversion> {
    let original = value.cloned();
    let value = match value {
        None | Some(Value::Null) => {
            return Some(Conversion::failure(
                original,
                "unable to convert value, value is null or undefined",
            ))
        }
        Some(Value::String(text)) if text == "null" => {
            return Some(Conversion::failure(
                original,
                "unable to convert value, value is null or undefined",
            ))
        }
        Some(value) => value,
    };

    match data_type {
        DataType::Number => {
            if value.is_number() {
                return None;
            }
            Some(match parse_int_prefix(&stringify(value)) {
                Some(parsed) => Conversion::success(original, Value::from(parsed)),
                None => Conversion::failure(original, "unable to convert value to number"),
            })
        }
        DataType::Float => {
            if value.is_number() {
                return None;
            }
            Some(match parse_float_prefix(&stringify(value)) {
                Some(parsed) => Conversion::success(original, float_value(parsed)),
                None => Conversion::failure(original, "unable to convert value to float"),
            })
        }
        DataType::Number64
        | DataType::Float64
        | DataType::String
        | DataType::Enumeration
        | DataType::File => {
            if value.is_string() {
                return None;
            }
            Some(Conversion::success(original, Value::String(stringify(value))))
        }
        DataType::Date => Some(convert_date(value, date_format)),
        DataType::Boolean => match value {
            Value::Bool(_) => None,
            Value::String(text) => {
                let truthy = ["true", "TRUE", "True", "1"]
                    .iter()
                    .any(|needle| text.contains(needle));
                Some(Conversion::success(original, Value::Bool(truthy)))
            }
            Value::Number(number) => Some(Conversion::success(
                original,
                Value::Bool(number.as_f64() == Some(1.0)),
            )),
            _ => Some(Conversion::failure(
                original,
                "unable to convert boolean, must be a boolean, string, or number to attempt conversion",
            )),
        },
        DataType::List => {
            if value.is_array() {
                return None;
            }
            Some(Conversion::success(original, Value::Array(vec![value.clone()])))
        }
        DataType::Unknown => None,
    }
}

fn convert_date(value: &Value, date_format: Option<&str>) -> Conversion {
    let original = Some(value.clone());
    let parsed = match value {
        Value::Number(number) => match date_format {
            Some(format) => parse_with_format(&number.to_string(), format),
            None => number
                .as_f64()
                .and_then(|millis| Utc.timestamp_millis_opt(millis.trunc() as i64).single())
                .ok_or_else(|| "timestamp out of range".to_string()),
        },
        Value::String(text) => match date_format {
            Some(format) => parse_with_format(text, format),
            None => parse_free_form(text),
        },
        _ => {
            return Conversion::failure(
                original,
                "unable to convert value to date, value is not string or number",
            )
        }
    };

    match parsed {
        Ok(date) => Conversion::success(
            original,
            Value::String(date.format(DATE_OUTPUT_FORMAT).to_string()),
        ),
        Err(reason) => Conversion::failure(
            original,
            format!("unable to convert value to date using format string: {}", reason),
        ),
    }
}

/// Parses with an explicit strftime format, accepting date-only formats and
/// formats that carry their own offset. Naive results are taken as UTC.
fn parse_with_format(text: &str, format: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(date) = DateTime::parse_from_str(text, format) {
        return Ok(date.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDateTime::parse_from_str(text, format) {
        return Ok(date.and_utc());
    }
    NaiveDate::parse_from_str(text, format)
        .map_err(|err| err.to_string())
        .and_then(|day| {
            day.and_hms_opt(0, 0, 0)
                .map(|date| date.and_utc())
                .ok_or_else(|| "invalid time".to_string())
        })
}

fn parse_free_form(text: &str) -> Result<DateTime<Utc>, String> {
    let text = text.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Ok(date.with_timezone(&Utc));
    }
    if let Ok(date) = DateTime::parse_from_rfc2822(text) {
        return Ok(date.with_timezone(&Utc));
    }
    for format in FREE_FORM_DATE_FORMATS {
        if let Ok(date) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(date.and_utc());
        }
    }
    for format in FREE_FORM_DAY_FORMATS {
        if let Ok(day) = NaiveDate::parse_from_str(text, format) {
            if let Some(date) = day.and_hms_opt(0, 0, 0) {
                return Ok(date.and_utc());
            }
        }
    }
    Err(format!("invalid date '{}'", text))
}

/// Leading base-10 integer of `text`, ignoring anything after it.
fn parse_int_prefix(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (sign, digits) = match text.as_bytes().first() {
        Some(b'-') => (-1, &text[1..]),
        Some(b'+') => (1, &text[1..]),
        _ => (1, text),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// Longest leading decimal literal of `text`.
fn parse_float_prefix(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'-') | Some(b'+')) {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut mantissa_digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        mantissa_digits += frac_end - frac_start;
        if mantissa_digits > 0 {
            end = frac_end;
        }
    }
    if mantissa_digits == 0 {
        return None;
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'-') | Some(b'+')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    text[..end].parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Integral floats are stored as integers.
fn float_value(parsed: f64) -> Value {
    if parsed.fract() == 0.0 && parsed.abs() < i64::MAX as f64 {
        Value::from(parsed.floor() as i64)
    } else {
        Number::from_f64(parsed)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn converted(data_type: DataType, value: Value) -> Value {
        convert_value(data_type, Some(&value), None)
            .and_then(|c| c.converted_value)
            .unwrap()
    }

    #[test]
    fn test_null_like_values_always_fail() {
        for data_type in [DataType::String, DataType::Unknown, DataType::List] {
            assert!(convert_value(data_type, None, None).unwrap().is_failure());
            assert!(convert_value(data_type, Some(&Value::Null), None)
                .unwrap()
                .is_failure());
            assert!(convert_value(data_type, Some(&json!("null")), None)
                .unwrap()
                .is_failure());
        }
    }

    #[test]
    fn test_values_of_declared_type_are_unchanged() {
        assert!(convert_value(DataType::Number, Some(&json!(4)), None).is_none());
        assert!(convert_value(DataType::Float, Some(&json!(4.5)), None).is_none());
        assert!(convert_value(DataType::String, Some(&json!("a")), None).is_none());
        assert!(convert_value(DataType::Number64, Some(&json!("9")), None).is_none());
        assert!(convert_value(DataType::Boolean, Some(&json!(true)), None).is_none());
        assert!(convert_value(DataType::List, Some(&json!([1])), None).is_none());
        assert!(convert_value(DataType::Unknown, Some(&json!({"a": 1})), None).is_none());
    }

    #[test]
    fn test_numeric_conversions() {
        assert_eq!(converted(DataType::Number, json!("4")), json!(4));
        assert_eq!(converted(DataType::Number, json!("4.7 visits")), json!(4));
        assert_eq!(converted(DataType::Float, json!("4.5")), json!(4.5));
        assert_eq!(converted(DataType::Float, json!("4.0")), json!(4));
        assert!(convert_value(DataType::Number, Some(&json!("four")), None)
            .unwrap()
            .is_failure());
        assert!(convert_value(DataType::Float, Some(&json!(true)), None)
            .unwrap()
            .is_failure());
    }

    #[test]
    fn test_string_like_conversions() {
        assert_eq!(converted(DataType::String, json!(12)), json!("12"));
        assert_eq!(converted(DataType::Number64, json!(12)), json!("12"));
        assert_eq!(converted(DataType::Enumeration, json!(true)), json!("true"));
        assert_eq!(converted(DataType::List, json!("a")), json!(["a"]));
    }

    #[test]
    fn test_boolean_conversions() {
        assert_eq!(converted(DataType::Boolean, json!("True")), json!(true));
        assert_eq!(converted(DataType::Boolean, json!("yes")), json!(false));
        assert_eq!(converted(DataType::Boolean, json!(1)), json!(true));
        assert_eq!(converted(DataType::Boolean, json!(2)), json!(false));
        assert!(convert_value(DataType::Boolean, Some(&json!([true])), None)
            .unwrap()
            .is_failure());
    }

    #[test]
    fn test_date_conversions() {
        assert_eq!(
            converted(DataType::Date, json!("2020-01-01 12:00:00")),
            json!("2020-01-01T12:00:00.000Z")
        );
        assert_eq!(
            converted(DataType::Date, json!(0)),
            json!("1970-01-01T00:00:00.000Z")
        );

        let formatted = convert_value(DataType::Date, Some(&json!("01/02/2021")), Some("%d/%m/%Y"))
            .and_then(|c| c.converted_value)
            .unwrap();
        assert_eq!(formatted, json!("2021-02-01T00:00:00.000Z"));

        let failed = convert_value(DataType::Date, Some(&json!("not a date")), None).unwrap();
        assert!(failed.is_failure());
        assert!(convert_value(DataType::Date, Some(&json!(true)), None)
            .unwrap()
            .is_failure());
    }
}
