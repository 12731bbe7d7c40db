//! Harvesting named variables from endpoint results.
//!
//! Paths are dot-separated. A segment suffixed with `[]` iterates the array it
//! selects and applies the rest of the path to every element, flattening the
//! matches. Property lookups ignore ASCII case.

use labelplan_types::{EndpointResult, ExtractedVariables};
use labelplan_util::{get_case_insensitive, scalar_to_string};
use serde_json::Value;
use tracing::debug;

const ARRAY_MARKER: &str = "[]";

/// Accumulate the variables declared in `result`'s output mapping.
///
/// Failed or empty results contribute nothing. Values are appended to any
/// already recorded under the same name.
pub fn extract_variables_from_result(result: &EndpointResult, variables: &mut ExtractedVariables) {
    if !result.is_success() {
        return;
    }
    let Some(mapping) = result.specification.output_mapping.as_ref() else {
        return;
    };

    for (raw_name, path) in mapping {
        let name = normalize_variable_name(raw_name);
        if name.is_empty() {
            continue;
        }
        let values = resolve_path(&result.result, path);
        debug!(variable = %name, path = %path, count = values.len(), "extracted variable values");
        if !values.is_empty() {
            variables.extend(name, values);
        }
    }
}

/// Strip the optional `[]` suffix from an output-mapping key.
pub fn normalize_variable_name(name: &str) -> &str {
    let trimmed = name.trim();
    trimmed.strip_suffix(ARRAY_MARKER).unwrap_or(trimmed).trim()
}

/// Resolve `path` against `value`, returning every matched value as text.
///
/// Missing properties yield nothing. A plain segment applied to an array maps
/// over its elements. Terminal arrays contribute their elements and terminal
/// objects their compact JSON text.
pub fn resolve_path(value: &Value, path: &str) -> Vec<String> {
    let trimmed = path.trim();
    let trimmed = trimmed.strip_prefix("$.").or_else(|| trimmed.strip_prefix('$')).unwrap_or(trimmed);
    let segments: Vec<&str> = trimmed.split('.').map(str::trim).filter(|segment| !segment.is_empty()).collect();

    let mut values = Vec::new();
    walk(value, &segments, &mut values);
    values
}

fn walk(node: &Value, segments: &[&str], out: &mut Vec<String>) {
    let Some((segment, rest)) = segments.split_first() else {
        collect_terminal(node, out);
        return;
    };

    if *segment == ARRAY_MARKER {
        match node {
            Value::Array(items) => items.iter().for_each(|item| walk(item, rest, out)),
            other => walk(other, rest, out),
        }
        return;
    }

    let (name, iterate) = match segment.strip_suffix(ARRAY_MARKER) {
        Some(name) => (name, true),
        None => (*segment, false),
    };

    match node {
        Value::Object(map) => {
            let Some(child) = get_case_insensitive(map, name) else {
                return;
            };
            match child {
                Value::Array(items) if iterate => items.iter().for_each(|item| walk(item, rest, out)),
                _ => walk(child, rest, out),
            }
        }
        Value::Array(items) => items.iter().for_each(|item| walk(item, segments, out)),
        _ => {}
    }
}

fn collect_terminal(node: &Value, out: &mut Vec<String>) {
    match node {
        Value::Null => {}
        Value::Array(items) => items.iter().for_each(|item| collect_terminal(item, out)),
        Value::Object(_) => out.push(node.to_string()),
        scalar => {
            if let Some(text) = scalar_to_string(scalar)
                && !text.trim().is_empty()
            {
                out.push(text);
            }
        }
    }
}
