//! Shared type definitions for the label work-plan engine.
//!
//! The models here describe one planned HTTP call against the label API
//! ([`EndpointSpecification`]), its outcome ([`EndpointResult`]), and the
//! values harvested between steps ([`ExtractedVariables`]). Progress events and
//! the backend wire shapes live in [`workplan`] and [`backend`].
//!
//! Authoring order is preserved with `IndexMap` so query parameters, output
//! mappings, and variables iterate in the order the interpreter produced them.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub mod backend;
pub mod workplan;

pub use backend::{InterpretRequest, Interpretation, Synthesis, SynthesisRequest, SystemContext};
pub use workplan::{ProductDiscovery, WorkPlanPhase, WorkPlanProgress, WorkPlanRequest};

/// One planned HTTP call produced by the interpreter.
///
/// Specifications are treated as immutable: substitution and expansion build
/// new instances rather than editing an existing one. The body is shared
/// behind an `Arc` so fan-out clones reference the same payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", from = "RawEndpointSpecification")]
pub struct EndpointSpecification {
    /// Interpreter-assigned identifier, when provided.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// HTTP method, e.g. `GET`.
    pub method: String,
    /// Request path; may contain `{name}` or `{{name}}` placeholders.
    pub path: String,
    /// Human-readable purpose of the call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Query parameters; values may contain placeholders.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_parameters: Option<IndexMap<String, String>>,
    /// Optional JSON body; string leaves may contain placeholders.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Arc<Value>>,
    /// Step group; specifications sharing a step run concurrently.
    pub step: u32,
    /// Shape the interpreter expects back (`array`, `object`, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_response_type: Option<String>,
    /// Identifiers of specifications this one logically depends on.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// When set, the call only runs if the preceding step produced no data.
    pub skip_if_previous_has_results: bool,
    /// Variable name to extraction path, harvested from this call's result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_mapping: Option<IndexMap<String, String>>,
}

/// Interpreter wire shape. The step may arrive as `step` or
/// `executionOrder`; `step` wins when both are present.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEndpointSpecification {
    #[serde(default)]
    id: Option<String>,
    #[serde(default = "default_method")]
    method: String,
    path: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_query_parameters")]
    query_parameters: Option<IndexMap<String, String>>,
    #[serde(default)]
    body: Option<Arc<Value>>,
    #[serde(default)]
    step: Option<u32>,
    #[serde(default)]
    execution_order: Option<u32>,
    #[serde(default)]
    expected_response_type: Option<String>,
    #[serde(default, deserialize_with = "deserialize_string_list")]
    depends_on: Vec<String>,
    #[serde(default)]
    skip_if_previous_has_results: bool,
    #[serde(default)]
    output_mapping: Option<IndexMap<String, String>>,
}

impl From<RawEndpointSpecification> for EndpointSpecification {
    fn from(raw: RawEndpointSpecification) -> Self {
        Self {
            id: raw.id,
            method: raw.method,
            path: raw.path,
            description: raw.description,
            query_parameters: raw.query_parameters,
            body: raw.body,
            step: raw.step.or(raw.execution_order).unwrap_or_else(default_step),
            expected_response_type: raw.expected_response_type,
            depends_on: raw.depends_on,
            skip_if_previous_has_results: raw.skip_if_previous_has_results,
            output_mapping: raw.output_mapping,
        }
    }
}

impl EndpointSpecification {
    /// Builds a bare specification for `method path` in step 1.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: None,
            method: method.into(),
            path: path.into(),
            description: None,
            query_parameters: None,
            body: None,
            step: default_step(),
            expected_response_type: None,
            depends_on: Vec::new(),
            skip_if_previous_has_results: false,
            output_mapping: None,
        }
    }

    /// Short `METHOD path` label used in logs and progress messages.
    pub fn label(&self) -> String {
        format!("{} {}", self.method.to_ascii_uppercase(), self.path)
    }
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_step() -> u32 {
    1
}

/// Outcome of invoking one [`EndpointSpecification`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EndpointResult {
    /// The specification that was executed (after substitution/expansion).
    pub specification: EndpointSpecification,
    /// HTTP status code, or a synthetic code for local failures.
    pub status_code: u16,
    /// Raw payload; `Null` on failure or empty response.
    #[serde(default)]
    pub result: Value,
    /// Failure description for local errors, timeouts, and error statuses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Number of invocations made (retries included).
    #[serde(default)]
    pub attempts: u32,
}

impl EndpointResult {
    pub fn new(specification: EndpointSpecification, status_code: u16, result: Value) -> Self {
        Self {
            specification,
            status_code,
            result,
            error: None,
            attempts: 1,
        }
    }

    /// Builds a failed result with a `Null` payload.
    pub fn failure(specification: EndpointSpecification, status_code: u16, error: impl Into<String>) -> Self {
        Self {
            specification,
            status_code,
            result: Value::Null,
            error: Some(error.into()),
            attempts: 1,
        }
    }

    /// True for a 2xx status with a non-null payload.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code) && !self.result.is_null()
    }

    pub fn is_error_status(&self) -> bool {
        self.status_code >= 400
    }
}

/// Variables harvested from endpoint results during one run.
///
/// Each name maps to an ordered list of values accumulated across every result
/// processed so far. A name with no values is inert, one value substitutes a
/// literal, and several values fan a request out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractedVariables(IndexMap<String, Vec<String>>);

impl ExtractedVariables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends values to `name`, creating the entry when absent.
    pub fn extend<I>(&mut self, name: &str, values: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.0.entry(name.to_string()).or_default().extend(values);
    }

    /// Values recorded for `name`, empty when unknown.
    pub fn values(&self, name: &str) -> &[String] {
        self.0.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First value recorded for `name`.
    pub fn first(&self, name: &str) -> Option<&str> {
        self.values(name).first().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Retains, per variable, only the values accepted by `keep`.
    pub fn retain_values<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str, &str) -> bool,
    {
        for (name, values) in self.0.iter_mut() {
            values.retain(|value| keep(name, value));
        }
    }
}

impl<const N: usize> From<[(&str, Vec<&str>); N]> for ExtractedVariables {
    fn from(entries: [(&str, Vec<&str>); N]) -> Self {
        let mut variables = Self::new();
        for (name, values) in entries {
            variables.extend(name, values.into_iter().map(str::to_string));
        }
        variables
    }
}

/// Accepts a string map whose values may arrive as JSON scalars.
fn deserialize_query_parameters<'de, D>(deserializer: D) -> Result<Option<IndexMap<String, String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<IndexMap<String, Value>> = Option::deserialize(deserializer)?;
    Ok(raw.map(|entries| {
        entries
            .into_iter()
            .filter_map(|(key, value)| scalar_text(value).map(|text| (key, text)))
            .collect()
    }))
}

/// Accepts a list of identifiers, a single identifier, or null.
fn deserialize_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Array(items)) => items.into_iter().filter_map(scalar_text).collect(),
        Some(other) => scalar_text(other).into_iter().collect(),
        None => Vec::new(),
    })
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}
