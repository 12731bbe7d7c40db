//! Work-plan run request, discovered products, and streamed progress events.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Caller input for one pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkPlanRequest {
    /// Natural-language question.
    pub query: String,
    /// Conversation identifier threaded across interpret/synthesize calls.
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Product identifiers confirmed after a checkpoint pause.
    ///
    /// `Some` (even when empty) means the caller already made a selection and
    /// the checkpoint is skipped.
    #[serde(default)]
    pub selected_product_guids: Option<Vec<String>>,
}

impl WorkPlanRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

/// Minimal product record discovered in the first step's results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProductDiscovery {
    pub guid: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labeler: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Pipeline phase carried by each progress event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum WorkPlanPhase {
    #[default]
    Interpreting,
    Planning,
    Discovering,
    AwaitingCheckpoint,
    Executing,
    Synthesizing,
    Complete,
    Error,
}

impl WorkPlanPhase {
    /// A terminal phase ends the event stream.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::AwaitingCheckpoint | Self::Error | Self::Complete)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Interpreting => "interpreting",
            Self::Planning => "planning",
            Self::Discovering => "discovering",
            Self::AwaitingCheckpoint => "awaiting_checkpoint",
            Self::Executing => "executing",
            Self::Synthesizing => "synthesizing",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

/// Snapshot of pipeline state emitted as the run progresses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkPlanProgress {
    pub phase: WorkPlanPhase,
    pub current_step: u32,
    pub total_steps: u32,
    pub message: String,
    /// Final synthesized text (or direct response).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Text produced by one synthesis batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_content: Option<String>,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub products: Vec<ProductDiscovery>,
    #[serde(default)]
    pub requires_checkpoint: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub product_guids: Vec<String>,
    /// Display name to result link.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub data_references: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggested_follow_ups: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_current: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_total: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl WorkPlanProgress {
    pub fn new(phase: WorkPlanPhase, message: impl Into<String>) -> Self {
        Self {
            phase,
            current_step: 0,
            total_steps: 0,
            message: message.into(),
            content: None,
            partial_content: None,
            is_error: false,
            error: None,
            conversation_id: None,
            products: Vec::new(),
            requires_checkpoint: false,
            product_guids: Vec::new(),
            data_references: IndexMap::new(),
            suggested_follow_ups: Vec::new(),
            batch_current: None,
            batch_total: None,
            warnings: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Terminal error event; the message doubles as the error text.
    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            is_error: true,
            error: Some(message.clone()),
            ..Self::new(WorkPlanPhase::Error, message)
        }
    }

    pub fn with_steps(mut self, current_step: u32, total_steps: u32) -> Self {
        self.current_step = current_step;
        self.total_steps = total_steps;
        self
    }

    pub fn with_conversation(mut self, conversation_id: Option<String>) -> Self {
        self.conversation_id = conversation_id;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }
}

impl Default for WorkPlanProgress {
    fn default() -> Self {
        Self::new(WorkPlanPhase::Interpreting, String::new())
    }
}
