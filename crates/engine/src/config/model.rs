//! Data models for the label work-plan configuration.

use std::time::Duration;

use labelplan_util::InterpolationError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Root configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct LabelPlanConfig {
    /// Label backend connection settings.
    pub api: ApiConfig,
    /// Pipeline tuning knobs.
    pub work_plan: WorkPlanSettings,
}

/// Connection settings for the label backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiConfig {
    /// Base URL of the label API; non-localhost hosts must use HTTPS.
    pub base_url: String,
    /// Bearer token sent with every request. Supports `${env:NAME}`.
    pub token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5093".to_string(),
            token: None,
        }
    }
}

/// Tuning for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkPlanSettings {
    /// Maximum in-flight endpoint calls per step.
    pub max_concurrent_requests: usize,
    /// Per-call deadline in milliseconds.
    pub request_timeout_ms: u64,
    /// Extra attempts for calls that return no data without an error status.
    pub max_empty_retries: u32,
    /// Pause between retry attempts in milliseconds.
    pub retry_backoff_ms: u64,
    /// Discovered-product count at which the run pauses for confirmation.
    pub checkpoint_threshold: usize,
    /// Product count above which synthesis is split into batches.
    pub synthesis_batch_threshold: usize,
    /// Endpoint results per synthesis batch.
    pub synthesis_batch_size: usize,
    /// Cap on locally built data-reference links.
    pub max_data_references: usize,
    /// Prefix for `/label/{guid}` links; empty yields relative links.
    pub label_link_base: String,
}

impl Default for WorkPlanSettings {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 5,
            request_timeout_ms: 30_000,
            max_empty_retries: 1,
            retry_backoff_ms: 500,
            checkpoint_threshold: 20,
            synthesis_batch_threshold: 10,
            synthesis_batch_size: 10,
            max_data_references: 10,
            label_link_base: String::new(),
        }
    }
}

impl WorkPlanSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {message}")]
    Parse { path: String, message: String },
    #[error("config interpolation failed: {0}")]
    Interpolation(#[from] InterpolationError),
    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_documents_fill_defaults() {
        let config: LabelPlanConfig = serde_json::from_str(r#"{ "workPlan": { "checkpointThreshold": 50 } }"#).expect("parse");
        assert_eq!(config.work_plan.checkpoint_threshold, 50);
        assert_eq!(config.work_plan.max_concurrent_requests, 5);
        assert_eq!(config.work_plan.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.api.base_url, "http://localhost:5093");
    }
}
