//! One-to-many expansion of specifications bound to multi-valued variables.

use labelplan_types::{EndpointSpecification, ExtractedVariables};
use tracing::{debug, warn};

use super::substitution::{double_brace, single_brace, substitute_text};

/// Fan `substituted` out once per value of the first multi-valued variable
/// whose placeholder appears in `original`'s path.
///
/// Variables are checked in recording order. Each clone's path is rebuilt
/// from the original with that placeholder set to one value and the rest
/// substituted as usual; query parameters are copied and the body is
/// shared. Further multi-valued placeholders in the same path are not
/// expanded and keep their first value.
pub fn expand_array_variables(
    original: &EndpointSpecification,
    substituted: &EndpointSpecification,
    variables: &ExtractedVariables,
) -> Vec<EndpointSpecification> {
    let mut multi_valued = variables
        .iter()
        .filter(|(name, values)| values.len() > 1 && original.path.contains(&single_brace(name)));

    let Some((name, values)) = multi_valued.next() else {
        return vec![substituted.clone()];
    };

    let ignored: Vec<&str> = multi_valued.map(|(other, _)| other.as_str()).collect();
    if !ignored.is_empty() {
        warn!(
            path = %original.path,
            expanded = %name,
            ignored = ?ignored,
            "path has several multi-valued placeholders; only the first is expanded"
        );
    }
    debug!(path = %original.path, variable = %name, count = values.len(), "expanding specification");

    values
        .iter()
        .map(|value| {
            let mut clone = substituted.clone();
            let bound = original.path.replace(&double_brace(name), value).replace(&single_brace(name), value);
            clone.path = substitute_text(&bound, variables);
            clone
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::bindings::substitute_variables;
    use indexmap::IndexMap;
    use serde_json::json;

    #[test]
    fn one_clone_per_value() {
        let variables = ExtractedVariables::from([("documentGUID", vec!["a", "b", "c"])]);
        let mut original = EndpointSpecification::new("GET", "/label/{documentGUID}");
        original.step = 2;
        original.query_parameters = Some(IndexMap::from([("format".to_string(), "json".to_string())]));
        original.body = Some(Arc::new(json!({ "include": ["sections"] })));

        let substituted = substitute_variables(&original, &variables);
        let expanded = expand_array_variables(&original, &substituted, &variables);

        let paths: Vec<&str> = expanded.iter().map(|spec| spec.path.as_str()).collect();
        assert_eq!(paths, vec!["/label/a", "/label/b", "/label/c"]);
        for clone in &expanded {
            assert_eq!(clone.step, 2);
            assert_eq!(clone.method, original.method);
            assert_eq!(clone.query_parameters, original.query_parameters);
            assert!(Arc::ptr_eq(clone.body.as_ref().expect("body"), original.body.as_ref().expect("body")));
        }
    }

    #[test]
    fn single_values_pass_through() {
        let variables = ExtractedVariables::from([("documentGUID", vec!["a"])]);
        let original = EndpointSpecification::new("GET", "/label/{{documentGUID}}");
        let substituted = substitute_variables(&original, &variables);

        let expanded = expand_array_variables(&original, &substituted, &variables);
        assert_eq!(expanded, vec![substituted]);
        assert_eq!(expanded[0].path, "/label/a");
    }

    #[test]
    fn only_the_first_multi_valued_placeholder_expands() {
        let variables = ExtractedVariables::from([("setId", vec!["s1", "s2"]), ("version", vec!["1", "2"]), ("kind", vec!["spl"])]);
        let original = EndpointSpecification::new("GET", "/label/{setId}/v/{version}/{kind}");
        let substituted = substitute_variables(&original, &variables);

        let expanded = expand_array_variables(&original, &substituted, &variables);
        let paths: Vec<&str> = expanded.iter().map(|spec| spec.path.as_str()).collect();
        assert_eq!(paths, vec!["/label/s1/v/1/spl", "/label/s2/v/1/spl"]);
    }
}
