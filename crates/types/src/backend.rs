//! Wire shapes exchanged with the label backend's AI endpoints.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{EndpointResult, EndpointSpecification};

/// Body of an interpret call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InterpretRequest {
    pub user_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// The interpreter's plan for a query.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Interpretation {
    pub success: bool,
    /// The interpreter answered directly; no endpoint calls are needed.
    pub is_direct_response: bool,
    pub direct_response: Option<String>,
    pub conversation_id: Option<String>,
    pub endpoints: Vec<EndpointSpecification>,
    pub error: Option<String>,
}

/// Body of a synthesize call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisRequest {
    pub original_query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub executed_endpoints: Vec<EndpointResult>,
}

/// Natural-language answer assembled by the backend from endpoint results.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Synthesis {
    pub conversation_id: Option<String>,
    pub response: String,
    pub data_references: Option<IndexMap<String, String>>,
    pub suggested_follow_ups: Option<Vec<String>>,
    pub is_complete: bool,
    pub warnings: Option<Vec<String>>,
}

/// Ancillary system context reported by the backend.
///
/// The engine does not interpret these properties; they are passed through to
/// callers that display them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct SystemContext {
    pub properties: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn interpretation_tolerates_missing_fields() {
        let interpretation: Interpretation = serde_json::from_value(json!({
            "success": true,
            "isDirectResponse": true,
            "directResponse": "Aspirin is an NSAID."
        }))
        .expect("deserialize");
        assert!(interpretation.is_direct_response);
        assert!(interpretation.endpoints.is_empty());
        assert!(interpretation.conversation_id.is_none());
    }

    #[test]
    fn synthesis_reads_references_in_order() {
        let synthesis: Synthesis = serde_json::from_value(json!({
            "response": "done",
            "dataReferences": { "b": "/label/b", "a": "/label/a" },
            "isComplete": true
        }))
        .expect("deserialize");
        let references = synthesis.data_references.expect("references");
        assert_eq!(references.keys().collect::<Vec<_>>(), vec!["b", "a"]);
    }
}
