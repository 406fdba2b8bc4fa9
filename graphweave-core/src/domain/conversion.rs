use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Audit trail for one attempted coercion of a payload value.
///
/// A successful conversion carries `converted_value`; a failed one carries
/// `errors`. `original_value` is `None` when the payload had no value at all.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Conversion {
    pub original_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub converted_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<String>,
}

impl Conversion {
    pub fn success(original_value: Option<Value>, converted_value: Value) -> Self {
        Self {
            original_value,
            converted_value: Some(converted_value),
            errors: None,
        }
    }

    pub fn failure(original_value: Option<Value>, errors: impl Into<String>) -> Self {
        Self {
            original_value,
            converted_value: None,
            errors: Some(errors.into()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.errors.is_some()
    }
}
