//! Step grouping, preparation, and per-run state.

use std::collections::BTreeMap;

use labelplan_types::{EndpointResult, EndpointSpecification, ExtractedVariables, ProductDiscovery};
use labelplan_util::has_data;
use tracing::debug;

use crate::bindings::{expand_array_variables, extract_variables_from_result, substitute_variables};

/// Group specifications by step number in ascending order, keeping the
/// planned order within each group.
pub fn group_by_step(endpoints: Vec<EndpointSpecification>) -> BTreeMap<u32, Vec<EndpointSpecification>> {
    let mut groups: BTreeMap<u32, Vec<EndpointSpecification>> = BTreeMap::new();
    for endpoint in endpoints {
        groups.entry(endpoint.step).or_default().push(endpoint);
    }
    groups
}

/// Calls ready to execute for one step.
#[derive(Debug, Default)]
pub struct PreparedStep {
    pub specifications: Vec<EndpointSpecification>,
    pub skipped: usize,
}

/// Apply the skip rule, substitution, and expansion to one step group.
///
/// A specification flagged `skip_if_previous_has_results` is dropped when the
/// previous executed step produced usable data.
pub fn prepare_step(group: &[EndpointSpecification], variables: &ExtractedVariables, previous_had_data: bool) -> PreparedStep {
    let mut prepared = PreparedStep::default();
    for specification in group {
        if specification.skip_if_previous_has_results && previous_had_data {
            debug!(path = %specification.path, "skipping call; previous step returned data");
            prepared.skipped += 1;
            continue;
        }
        let substituted = substitute_variables(specification, variables);
        prepared
            .specifications
            .extend(expand_array_variables(specification, &substituted, variables));
    }
    prepared
}

/// Whether any result in a step carries usable data.
pub fn has_usable_data(results: &[EndpointResult]) -> bool {
    results.iter().any(|result| result.is_success() && has_data(&result.result))
}

/// Mutable state owned by one pipeline run.
#[derive(Debug, Default)]
pub struct RunState {
    pub variables: ExtractedVariables,
    pub products: Vec<ProductDiscovery>,
    step_results: BTreeMap<u32, Vec<EndpointResult>>,
}

impl RunState {
    /// Mine `results` for variables, then store them under `step`.
    pub fn record(&mut self, step: u32, results: Vec<EndpointResult>) {
        for result in &results {
            extract_variables_from_result(result, &mut self.variables);
        }
        self.step_results.entry(step).or_default().extend(results);
    }

    /// Every recorded result in step order.
    pub fn all_results(&self) -> Vec<EndpointResult> {
        self.step_results.values().flatten().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_json::json;

    fn spec(path: &str, step: u32) -> EndpointSpecification {
        let mut specification = EndpointSpecification::new("GET", path);
        specification.step = step;
        specification
    }

    #[test]
    fn groups_are_ordered_by_step() {
        let groups = group_by_step(vec![spec("/c", 3), spec("/a1", 1), spec("/b", 2), spec("/a2", 1)]);
        let order: Vec<(u32, Vec<&str>)> = groups
            .iter()
            .map(|(step, specs)| (*step, specs.iter().map(|spec| spec.path.as_str()).collect()))
            .collect();
        assert_eq!(order, vec![(1, vec!["/a1", "/a2"]), (2, vec!["/b"]), (3, vec!["/c"])]);
    }

    #[test]
    fn skip_rule_applies_only_after_data() {
        let mut fallback = spec("/fallback", 2);
        fallback.skip_if_previous_has_results = true;
        let group = vec![fallback, spec("/always", 2)];
        let variables = ExtractedVariables::new();

        let after_data = prepare_step(&group, &variables, true);
        assert_eq!(after_data.skipped, 1);
        assert_eq!(after_data.specifications.len(), 1);

        let after_nothing = prepare_step(&group, &variables, false);
        assert_eq!(after_nothing.skipped, 0);
        assert_eq!(after_nothing.specifications.len(), 2);
    }

    #[test]
    fn recorded_results_feed_variables() {
        let mut search = spec("/search", 1);
        search.output_mapping = Some(IndexMap::from([("documentGUID[]".to_string(), "[].documentGUID".to_string())]));
        let result = EndpointResult::new(search, 200, json!([{ "documentGUID": "a" }, { "documentGUID": "b" }]));

        let mut state = RunState::default();
        assert!(has_usable_data(std::slice::from_ref(&result)));
        state.record(1, vec![result]);

        assert_eq!(state.variables.values("documentGUID"), ["a", "b"]);
        assert_eq!(state.all_results().len(), 1);

        let prepared = prepare_step(&[spec("/label/{documentGUID}", 2)], &state.variables, true);
        let paths: Vec<&str> = prepared.specifications.iter().map(|spec| spec.path.as_str()).collect();
        assert_eq!(paths, vec!["/label/a", "/label/b"]);
    }
}
