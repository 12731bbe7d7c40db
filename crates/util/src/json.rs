//! Explicit, total traversal helpers over `serde_json::Value`.
//!
//! Label API payloads are loosely shaped and their property casing varies
//! between endpoints, so lookups here never rely on exact key matches.

use serde_json::{Map, Value};

/// Looks up `key` in `map`, preferring an exact match and falling back to an
/// ASCII case-insensitive match in iteration order.
pub fn get_case_insensitive<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    if let Some(value) = map.get(key) {
        return Some(value);
    }
    map.iter()
        .find(|(candidate, _)| candidate.eq_ignore_ascii_case(key))
        .map(|(_, value)| value)
}

/// Returns the first non-blank scalar found under any of `keys`, checked in
/// the order given.
pub fn first_scalar_by_keys(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| get_case_insensitive(map, key))
        .filter_map(scalar_to_string)
        .find(|text| !text.trim().is_empty())
}

/// Whether a payload carries usable data.
///
/// Null is empty, arrays and objects need at least one member, strings must be
/// non-blank, and numbers/booleans always count.
pub fn has_data(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::String(text) => !text.trim().is_empty(),
        Value::Number(_) | Value::Bool(_) => true,
    }
}

/// Renders a scalar as text; `None` for null, arrays, and objects.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}
