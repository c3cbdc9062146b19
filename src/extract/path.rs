//! Dot-separated path navigation over nested maps and sequences.
//!
//! Paths such as `result.containers.1.rows.0.columns` index objects by key and
//! sequences by position. Two simplifications apply to every lookup:
//!
//! - a non-numeric segment applied to a sequence descends into its first
//!   element, so `outages.outage` reaches `outages[0].outage`;
//! - [`resolve`] collapses a non-empty sequence at the end of the path to its
//!   first element.
//!
//! Sibling elements are therefore never seen through a path. Callers that need
//! every element resolve the collection itself with [`walk`] and iterate.

use serde_json::Value;
use thiserror::Error;

/// Key that carries element text when an XML element also has attributes or
/// children (see [`crate::document`]).
pub const TEXT_KEY: &str = "$text";

/// Failure to follow a path, with enough context to fix the configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("path {path} not found at part '{segment}'. Available keys: {}", .available.join(", "))]
pub struct PathError {
    pub path: String,
    pub segment: String,
    pub available: Vec<String>,
}

/// Follow `path` from `root`, returning whatever value sits at the end.
/// An empty path yields `root`.
pub fn walk<'a>(root: &'a Value, path: &str) -> Result<&'a Value, PathError> {
    if path.is_empty() {
        return Ok(root);
    }

    let mut current = root;
    for segment in path.split('.') {
        current = step(current, segment).ok_or_else(|| PathError {
            path: path.to_string(),
            segment: segment.to_string(),
            available: available_keys(current),
        })?;
    }
    Ok(current)
}

/// Like [`walk`], but never fails and collapses a trailing non-empty sequence
/// to its first element.
pub fn resolve<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let value = walk(root, path).ok()?;
    match value {
        Value::Array(items) if !items.is_empty() => items.first(),
        other => Some(other),
    }
}

fn step<'a>(current: &'a Value, segment: &str) -> Option<&'a Value> {
    match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => match segment.parse::<usize>() {
            Ok(index) => items.get(index),
            Err(_) => items.first().and_then(|first| step(first, segment)),
        },
        _ => None,
    }
}

fn available_keys(value: &Value) -> Vec<String> {
    match value {
        Value::Object(map) => map.keys().cloned().collect(),
        Value::Array(items) => (0..items.len()).map(|i| i.to_string()).collect(),
        _ => Vec::new(),
    }
}

/// Scalar text of a resolved value. Blank strings and null count as absent.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(map) => map.get(TEXT_KEY).and_then(value_text),
        Value::Array(items) => items.first().and_then(value_text),
        Value::Null => None,
    }
}

/// Integer reading of a resolved value: numbers directly, strings by their
/// leading digits (`"2 open"` reads as 2).
pub fn value_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => leading_integer(s),
        Value::Object(map) => map.get(TEXT_KEY).and_then(value_integer),
        Value::Array(items) => items.first().and_then(value_integer),
        _ => None,
    }
}

fn leading_integer(s: &str) -> Option<i64> {
    let s = s.trim();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_through_sequence() {
        let root = json!({"a": {"b": [{"c": 1}]}});
        assert_eq!(resolve(&root, "a.b.c"), Some(&json!(1)));
    }

    #[test]
    fn test_resolve_missing_does_not_panic() {
        let root = json!({"a": 1});
        assert_eq!(resolve(&root, "a.b"), None);
        assert_eq!(resolve(&root, "x"), None);
    }

    #[test]
    fn test_numeric_segments_index_sequences() {
        let root = json!({"result": {"containers": [{"id": 0}, {"rows": [{"name": "svc"}]}]}});
        assert_eq!(
            resolve(&root, "result.containers.1.rows.0.name"),
            Some(&json!("svc"))
        );
    }

    #[test]
    fn test_numeric_keys_prefer_object_lookup() {
        let root = json!({"1": "by-key"});
        assert_eq!(resolve(&root, "1"), Some(&json!("by-key")));
    }

    #[test]
    fn test_resolve_collapses_trailing_sequence() {
        let root = json!({"outages": [{"outage": "3"}, {"outage": "9"}]});
        assert_eq!(resolve(&root, "outages.outage"), Some(&json!("3")));
        assert_eq!(resolve(&root, "outages"), Some(&json!({"outage": "3"})));
    }

    #[test]
    fn test_walk_keeps_collection_and_reports_keys() {
        let root = json!({"data": {"services": [1, 2, 3]}});
        assert_eq!(walk(&root, "data.services").unwrap().as_array().unwrap().len(), 3);

        let err = walk(&root, "data.items").unwrap_err();
        assert_eq!(err.segment, "items");
        assert_eq!(err.available, vec!["services".to_string()]);
        assert_eq!(
            err.to_string(),
            "path data.items not found at part 'items'. Available keys: services"
        );
    }

    #[test]
    fn test_empty_path_is_root() {
        let root = json!([1, 2]);
        assert_eq!(walk(&root, "").unwrap(), &root);
        assert_eq!(resolve(&root, ""), Some(&json!(1)));
    }

    #[test]
    fn test_value_text_and_integer() {
        assert_eq!(value_text(&json!("  Alma  ")), Some("Alma".to_string()));
        assert_eq!(value_text(&json!("")), None);
        assert_eq!(value_text(&json!({"lang": "en", "$text": "Title"})), Some("Title".to_string()));
        assert_eq!(value_integer(&json!("2 open")), Some(2));
        assert_eq!(value_integer(&json!(-1)), Some(-1));
        assert_eq!(value_integer(&json!("none")), None);
    }
}
