//! Heuristic product discovery over heterogeneous label API payloads.
//!
//! Discovery responses come in many shapes: bare arrays, wrapped lists,
//! pharmacologic-class groupings, and dictionaries of arrays. Candidates are
//! gathered from each successful result, mapped onto [`ProductDiscovery`],
//! and deduplicated by identifier.

use std::collections::HashSet;

use labelplan_types::{EndpointResult, ProductDiscovery};
use labelplan_util::{first_scalar_by_keys, get_case_insensitive};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

/// Property names that commonly wrap a result list.
const WRAPPER_KEYS: &[&str] = &["items", "data", "results", "products", "documents", "labels"];
/// Property names scanned on the root and on every candidate for extra products.
const NESTED_ARRAY_KEYS: &[&str] = &["products", "items", "documents", "labels"];
const PHARMACOLOGIC_CLASSES_KEY: &str = "pharmacologicClasses";
const PRODUCTS_KEY: &str = "products";

const IDENTIFIER_KEYS: &[&str] = &["documentGUID", "documentGuid", "productGUID", "productGuid", "guid", "id", "encryptedId"];
const NAME_KEYS: &[&str] = &["productName", "name", "title", "displayName", "proprietaryName"];
const LABELER_KEYS: &[&str] = &["labeler", "labelerName", "manufacturer", "company"];
const DESCRIPTION_KEYS: &[&str] = &["description", "dosageForm", "routeOfAdministration"];

/// Hard stop for the recursive array search.
pub const MAX_ARRAY_SEARCH_DEPTH: usize = 5;

/// Discover products in the results of the discovery step.
///
/// Only successful results are inspected. The output holds one entry per
/// identifier (ASCII case-insensitive), first occurrence first.
pub fn extract_products(results: &[EndpointResult]) -> Vec<ProductDiscovery> {
    let mut products = Vec::new();
    for result in results.iter().filter(|result| result.is_success()) {
        let candidates = collect_candidates(&result.result, products.is_empty());
        debug!(
            path = %result.specification.path,
            candidates = candidates.len(),
            "collected product candidates"
        );
        products.extend(candidates.into_iter().filter_map(product_from_candidate));
    }
    deduplicate_products(products)
}

/// Keep the first product for each identifier, compared case-insensitively.
pub fn deduplicate_products(products: Vec<ProductDiscovery>) -> Vec<ProductDiscovery> {
    let mut seen = HashSet::new();
    products
        .into_iter()
        .filter(|product| seen.insert(product.guid.to_ascii_lowercase()))
        .collect()
}

/// Map one candidate element onto a product.
///
/// Candidates without both an identifier and a name are dropped. A name
/// without an identifier receives a random one, so such products never merge.
pub fn product_from_candidate(candidate: &Value) -> Option<ProductDiscovery> {
    let map = candidate.as_object()?;
    let guid = first_scalar_by_keys(map, IDENTIFIER_KEYS);
    let name = first_scalar_by_keys(map, NAME_KEYS);
    if guid.is_none() && name.is_none() {
        return None;
    }

    Some(ProductDiscovery {
        guid: guid.unwrap_or_else(|| Uuid::new_v4().to_string()),
        name: name.unwrap_or_default(),
        labeler: first_scalar_by_keys(map, LABELER_KEYS),
        description: first_scalar_by_keys(map, DESCRIPTION_KEYS),
    })
}

fn collect_candidates(root: &Value, nothing_found_yet: bool) -> Vec<&Value> {
    let mut candidates: Vec<&Value> = Vec::new();
    match root {
        Value::Array(items) => candidates.extend(items),
        Value::Object(map) => {
            candidates = wrapped_items(map);
            if candidates.is_empty() {
                candidates = pharmacologic_class_items(map);
            }
            if candidates.is_empty() {
                collect_nested_arrays(map, 0, &mut candidates);
            }
            if candidates.is_empty() && nothing_found_yet {
                candidates.push(root);
            }
            candidates.extend(nested_array_items(map));
        }
        _ => return candidates,
    }

    let mut nested = Vec::new();
    for candidate in &candidates {
        if let Value::Object(map) = candidate {
            nested.extend(nested_array_items(map));
        }
    }
    candidates.extend(nested);

    let mut visited = HashSet::new();
    candidates.retain(|candidate| visited.insert(*candidate as *const Value));
    candidates
}

fn wrapped_items(map: &Map<String, Value>) -> Vec<&Value> {
    WRAPPER_KEYS
        .iter()
        .filter_map(|key| get_case_insensitive(map, key))
        .find_map(|value| value.as_array().filter(|items| !items.is_empty()))
        .map(|items| items.iter().collect())
        .unwrap_or_default()
}

fn pharmacologic_class_items(map: &Map<String, Value>) -> Vec<&Value> {
    let Some(Value::Array(classes)) = get_case_insensitive(map, PHARMACOLOGIC_CLASSES_KEY) else {
        return Vec::new();
    };

    let mut items = Vec::new();
    for class in classes {
        let products = class
            .as_object()
            .and_then(|class_map| get_case_insensitive(class_map, PRODUCTS_KEY))
            .and_then(Value::as_array);
        match products {
            Some(products) => items.extend(products),
            None => items.push(class),
        }
    }
    items
}

/// Collect the elements of every non-empty array reachable through nested
/// objects, stopping below [`MAX_ARRAY_SEARCH_DEPTH`].
fn collect_nested_arrays<'a>(map: &'a Map<String, Value>, depth: usize, out: &mut Vec<&'a Value>) {
    if depth >= MAX_ARRAY_SEARCH_DEPTH {
        return;
    }
    for value in map.values() {
        match value {
            Value::Array(items) if !items.is_empty() => out.extend(items),
            Value::Object(child) => collect_nested_arrays(child, depth + 1, out),
            _ => {}
        }
    }
}

fn nested_array_items(map: &Map<String, Value>) -> Vec<&Value> {
    NESTED_ARRAY_KEYS
        .iter()
        .filter_map(|key| get_case_insensitive(map, key))
        .filter_map(Value::as_array)
        .flatten()
        .collect()
}
