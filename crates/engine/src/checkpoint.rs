//! Confirmation gate for large discovery results.

use std::collections::HashSet;

use labelplan_types::{ExtractedVariables, ProductDiscovery, WorkPlanPhase, WorkPlanProgress};
use tracing::debug;

/// Decide whether the run must pause for product confirmation.
///
/// No pause is needed when the caller already supplied a selection (of any
/// length) or fewer than `threshold` products were discovered. Otherwise the
/// returned event is terminal and carries every discovered product.
pub fn evaluate(selection: Option<&[String]>, products: &[ProductDiscovery], threshold: usize) -> Option<WorkPlanProgress> {
    if selection.is_some() || products.len() < threshold {
        return None;
    }

    debug!(discovered = products.len(), threshold, "checkpoint required");
    let mut event = WorkPlanProgress::new(
        WorkPlanPhase::AwaitingCheckpoint,
        format!(
            "Found {} products. Select the products to continue with and run the query again.",
            products.len()
        ),
    );
    event.requires_checkpoint = true;
    event.product_guids = products.iter().map(|product| product.guid.clone()).collect();
    event.products = products.to_vec();
    Some(event)
}

/// Restrict identifier-like variables to the selected products.
///
/// A variable counts as identifier-like when its name contains `guid` or `id`
/// in any case. The match is by naming convention only, so a variable such as
/// `providerName` is filtered too. Values are compared case-insensitively.
pub fn filter_variables_to_selection(variables: &mut ExtractedVariables, selection: &[String]) {
    let selected: HashSet<String> = selection.iter().map(|guid| guid.trim().to_ascii_lowercase()).collect();
    variables.retain_values(|name, value| !is_identifier_variable(name) || selected.contains(&value.trim().to_ascii_lowercase()));
}

fn is_identifier_variable(name: &str) -> bool {
    let lowered = name.to_ascii_lowercase();
    lowered.contains("guid") || lowered.contains("id")
}
