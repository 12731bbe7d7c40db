//! Configuration validation.

use tracing::debug;

use crate::config::{ConfigError, LabelPlanConfig, WorkPlanSettings};

/// Validate the entire configuration.
pub fn validate_config(config: &LabelPlanConfig) -> Result<(), ConfigError> {
    if config.api.base_url.trim().is_empty() {
        return Err(invalid("api.baseUrl", "must not be empty"));
    }
    validate_settings(&config.work_plan)?;
    debug!(base_url = %config.api.base_url, "validated configuration");
    Ok(())
}

/// Reject settings that would stall or disable the pipeline.
pub fn validate_settings(settings: &WorkPlanSettings) -> Result<(), ConfigError> {
    let positive = [
        ("workPlan.maxConcurrentRequests", settings.max_concurrent_requests as u64),
        ("workPlan.requestTimeoutMs", settings.request_timeout_ms),
        ("workPlan.checkpointThreshold", settings.checkpoint_threshold as u64),
        ("workPlan.synthesisBatchThreshold", settings.synthesis_batch_threshold as u64),
        ("workPlan.synthesisBatchSize", settings.synthesis_batch_size as u64),
    ];
    for (field, value) in positive {
        if value == 0 {
            return Err(invalid(field, "must be greater than zero"));
        }
    }
    Ok(())
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&LabelPlanConfig::default()).is_ok());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let mut config = LabelPlanConfig::default();
        config.work_plan.synthesis_batch_size = 0;
        let error = validate_config(&config).expect_err("zero batch size");
        assert!(matches!(error, ConfigError::Invalid { ref field, .. } if field == "workPlan.synthesisBatchSize"));
    }

    #[test]
    fn zero_retries_are_allowed() {
        let mut settings = WorkPlanSettings::default();
        settings.max_empty_retries = 0;
        settings.retry_backoff_ms = 0;
        assert!(validate_settings(&settings).is_ok());
    }
}
