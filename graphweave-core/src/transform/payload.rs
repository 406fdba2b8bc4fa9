//! Path extraction over staged payloads and `root_array` fan-out.
//!
//! Paths are dot separated. A segment that lands on an array consumes the
//! next entry of the index vector instead of naming a field, which is why
//! rule authors write `entries.[].id`.

use serde_json::Value;
use tracing::warn;

use crate::errors::TransformationError;

/// Position of one leaf record inside a `root_array` expansion, one entry
/// per array level.
pub type IndexPath = Vec<usize>;

pub const ARRAY_MARKER: &str = "[]";

/// Walks `key` through `payload`, consuming `index` at array levels.
///
/// Returns `None` when any step is missing. An explicit JSON `null` is
/// returned as `Some(Value::Null)`.
pub fn get_nested_value<'a>(key: &str, payload: &'a Value, index: &[usize]) -> Option<&'a Value> {
    if key.is_empty() {
        return None;
    }

    let mut remaining_index = index.iter();
    let mut segments = key.split('.').peekable();
    let mut current = payload;

    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            return lookup_field(current, segment);
        }

        current = match current {
            Value::Array(items) => items.get(*remaining_index.next()?)?,
            Value::Object(map) => map.get(segment)?,
            _ => return None,
        };
    }

    None
}

fn lookup_field<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// A parsed `root_array` expression: one extraction path per nesting depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootArray {
    segments: Vec<String>,
}

impl RootArray {
    pub fn parse(expression: &str) -> Self {
        Self {
            segments: expression.split(ARRAY_MARKER).map(str::to_string).collect(),
        }
    }

    /// Number of array levels; a leaf index vector has exactly this length.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Path of the array expanded at `depth`, rejoined with array markers so
    /// that earlier levels are addressed through the index vector.
    pub fn path_at(&self, depth: usize) -> String {
        let upto = (depth + 1).min(self.segments.len());
        let joined = self.segments[..upto].join(ARRAY_MARKER);
        match joined.strip_suffix('.') {
            Some(trimmed) => trimmed.to_string(),
            None => joined,
        }
    }

    /// Expands every array level into the leaf index vectors, in payload order.
    ///
    /// A missing top-level array fails the record. A missing nested array only
    /// drops that branch.
    pub fn expand(&self, payload: &Value) -> Result<Vec<IndexPath>, TransformationError> {
        let root_path = self.path_at(0);
        let root_len = match get_nested_value(&root_path, payload, &[]) {
            Some(Value::Array(items)) => items.len(),
            _ => return Err(TransformationError::ArrayExtraction { path: root_path }),
        };

        let mut leaves = Vec::new();
        let mut stack: Vec<IndexPath> = (0..root_len).rev().map(|i| vec![i]).collect();

        while let Some(index) = stack.pop() {
            if index.len() >= self.depth() {
                leaves.push(index);
                continue;
            }

            let path = self.path_at(index.len());
            match get_nested_value(&path, payload, &index) {
                Some(Value::Array(items)) => {
                    for i in (0..items.len()).rev() {
                        let mut child = index.clone();
                        child.push(i);
                        stack.push(child);
                    }
                }
                _ => {
                    warn!(
                        "provided nested array key '{}' does not extract array from payload at index {:?}",
                        path, index
                    );
                }
            }
        }

        Ok(leaves)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> Value {
        json!({
            "car": {"id": "UUID", "name": "test car"},
            "entries": [
                {"id": 1, "parts": [{"name": "oil"}, {"name": "pan"}]},
                {"id": 2, "parts": []},
                {"id": 3, "parts": "none"},
                {"id": 4, "parts": [{"name": "tire"}]}
            ]
        })
    }

    #[test]
    fn test_get_nested_value_object_path() {
        let payload = payload();
        assert_eq!(
            get_nested_value("car.name", &payload, &[]),
            Some(&json!("test car"))
        );
        assert_eq!(get_nested_value("car.missing", &payload, &[]), None);
        assert_eq!(get_nested_value("car.name.deeper", &payload, &[]), None);
        assert_eq!(get_nested_value("", &payload, &[]), None);
    }

    #[test]
    fn test_get_nested_value_consumes_index_at_arrays() {
        let payload = payload();
        assert_eq!(
            get_nested_value("entries.[].id", &payload, &[1]),
            Some(&json!(2))
        );
        assert_eq!(
            get_nested_value("entries.[].parts.[].name", &payload, &[0, 1]),
            Some(&json!("pan"))
        );
        assert_eq!(get_nested_value("entries.[].id", &payload, &[]), None);
        assert_eq!(get_nested_value("entries.[].id", &payload, &[9]), None);
    }

    #[test]
    fn test_root_array_paths() {
        let root = RootArray::parse("entries.[].parts");
        assert_eq!(root.depth(), 2);
        assert_eq!(root.path_at(0), "entries");
        assert_eq!(root.path_at(1), "entries.[].parts");
    }

    #[test]
    fn test_expand_skips_broken_nested_branches() {
        let leaves = RootArray::parse("entries.[].parts").expand(&payload()).unwrap();
        assert_eq!(leaves, vec![vec![0, 0], vec![0, 1], vec![3, 0]]);
    }

    #[test]
    fn test_expand_fails_when_root_is_not_an_array() {
        let err = RootArray::parse("car").expand(&payload()).unwrap_err();
        assert!(matches!(err, TransformationError::ArrayExtraction { ref path } if path == "car"));
    }
}
