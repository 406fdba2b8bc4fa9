//! Predicate evaluation over one payload position.

use serde_json::Value;

use crate::domain::{Condition, Expression, Operator};
use crate::transform::payload::get_nested_value;
use crate::transform::value::{is_truthy, strict_eq, stringify, to_number};

/// A rule with no conditions always matches; otherwise any single satisfied
/// top-level condition is enough.
pub fn rule_matches(conditions: &[Condition], payload: &Value, index: &[usize]) -> bool {
    conditions.is_empty()
        || conditions
            .iter()
            .any(|condition| is_satisfied(condition, payload, index))
}

/// Evaluates one condition and folds its subexpressions left to right.
///
/// A falsy leaf value (`0`, `false`, `""`, `null` or missing) fails the
/// condition before any subexpression is consulted. Subexpression values
/// are compared as extracted.
pub fn is_satisfied(condition: &Condition, payload: &Value, index: &[usize]) -> bool {
    let value = get_nested_value(&condition.key, payload, index);
    if !is_truthy(value) {
        return false;
    }

    let mut result = compare(condition.operator, value, &condition.value);

    for sub in &condition.subexpressions {
        let sub_value = get_nested_value(&sub.key, payload, index);
        match sub.expression {
            Some(Expression::Or) if !result => {
                result = compare(sub.operator, sub_value, &sub.value);
            }
            Some(Expression::And) if result => {
                result = compare(sub.operator, sub_value, &sub.value);
            }
            _ => {}
        }
    }

    result
}

pub fn compare(operator: Operator, value: Option<&Value>, expected: &Value) -> bool {
    match operator {
        Operator::Exists => value.is_some(),
        Operator::Eq => match value {
            Some(value) => strict_eq(value, expected),
            None => expected.is_null(),
        },
        Operator::NotEq => match value {
            Some(value) => !strict_eq(value, expected),
            None => !expected.is_null(),
        },
        Operator::In => value.map(|v| is_in(v, expected)).unwrap_or(false),
        Operator::Contains => value
            .map(|v| stringify(v).contains(&stringify(expected)))
            .unwrap_or(false),
        Operator::Gt => relational(value, expected, |o| o.is_gt()),
        Operator::Gte => relational(value, expected, |o| o.is_ge()),
        Operator::Lt => relational(value, expected, |o| o.is_lt()),
        Operator::Lte => relational(value, expected, |o| o.is_le()),
    }
}

/// A string operand is a comma-separated list of strings, so only string
/// values can match it.
fn is_in(value: &Value, expected: &Value) -> bool {
    match (expected, value) {
        (Value::Array(candidates), _) => candidates.iter().any(|c| strict_eq(value, c)),
        (Value::String(list), Value::String(needle)) => {
            list.split(',').any(|candidate| candidate == needle)
        }
        (Value::String(_), _) => false,
        (other, _) => strict_eq(value, other),
    }
}

fn relational(
    value: Option<&Value>,
    expected: &Value,
    accept: impl Fn(std::cmp::Ordering) -> bool,
) -> bool {
    let Some(value) = value else {
        return false;
    };

    if let (Value::String(a), Value::String(b)) = (value, expected) {
        return accept(a.as_str().cmp(b.as_str()));
    }

    match (to_number(value), to_number(expected)) {
        (Some(a), Some(b)) => a.partial_cmp(&b).map(accept).unwrap_or(false),
        _ => false,
    }
}
