//! Placeholder substitution for endpoint specifications.

use std::sync::Arc;

use labelplan_types::{EndpointSpecification, ExtractedVariables};
use serde_json::{Map, Value};

/// Build a new specification with `{name}` and `{{name}}` placeholders
/// replaced by the first value of each variable.
///
/// Path, query values, and the string leaves (and keys) of the body are
/// rewritten. Variables with no values leave their placeholders in place.
pub fn substitute_variables(specification: &EndpointSpecification, variables: &ExtractedVariables) -> EndpointSpecification {
    let mut substituted = specification.clone();
    substituted.path = substitute_text(&specification.path, variables);
    substituted.query_parameters = specification.query_parameters.as_ref().map(|query| {
        query
            .iter()
            .map(|(key, value)| (key.clone(), substitute_text(value, variables)))
            .collect()
    });
    if let Some(body) = specification.body.as_ref() {
        let replaced = substitute_json(body, variables);
        if replaced != **body {
            substituted.body = Some(Arc::new(replaced));
        }
    }
    substituted
}

/// Replace placeholders in one string. The double-brace form is replaced
/// before the single-brace form for each variable.
pub fn substitute_text(text: &str, variables: &ExtractedVariables) -> String {
    if !text.contains('{') {
        return text.to_string();
    }
    let mut output = text.to_string();
    for (name, values) in variables.iter() {
        let Some(first) = values.first() else {
            continue;
        };
        output = output.replace(&double_brace(name), first).replace(&single_brace(name), first);
    }
    output
}

/// Structural substitution over a JSON value.
pub fn substitute_json(value: &Value, variables: &ExtractedVariables) -> Value {
    match value {
        Value::String(text) => Value::String(substitute_text(text, variables)),
        Value::Array(items) => Value::Array(items.iter().map(|item| substitute_json(item, variables)).collect()),
        Value::Object(map) => {
            let mut replaced = Map::with_capacity(map.len());
            for (key, item) in map {
                replaced.insert(substitute_text(key, variables), substitute_json(item, variables));
            }
            Value::Object(replaced)
        }
        other => other.clone(),
    }
}

pub(crate) fn single_brace(name: &str) -> String {
    format!("{{{name}}}")
}

pub(crate) fn double_brace(name: &str) -> String {
    format!("{{{{{name}}}}}")
}
