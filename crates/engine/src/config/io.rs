//! Configuration IO helpers.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use labelplan_util::{config_file_path, interpolate_string};
use tracing::debug;

use crate::config::{ConfigError, LabelPlanConfig, validate_config};

pub const CONFIG_PATH_ENV: &str = "LABELPLAN_CONFIG_PATH";
pub const API_BASE_ENV: &str = "LABELPLAN_API_BASE";
pub const API_TOKEN_ENV: &str = "LABELPLAN_API_TOKEN";

/// Returns the default path for the configuration file.
pub fn default_config_path() -> PathBuf {
    config_file_path(CONFIG_PATH_ENV, "labelplan", "config.json")
}

/// Loads configuration from the default path.
pub fn load_config() -> anyhow::Result<LabelPlanConfig> {
    let path = default_config_path();
    load_config_from_path(&path)
}

/// Loads configuration from a specific path.
///
/// A missing file yields defaults. `.yaml`/`.yml` files are parsed as YAML,
/// everything else as JSON. Environment overrides are applied after
/// interpolation and before validation.
pub fn load_config_from_path(path: &Path) -> anyhow::Result<LabelPlanConfig> {
    let mut config = if path.exists() {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        parse_config(path, &content)?
    } else {
        debug!(path = %path.display(), "config file not found; using defaults");
        LabelPlanConfig::default()
    };

    interpolate_config(&mut config)?;
    apply_env_overrides(&mut config);
    validate_config(&config)?;
    Ok(config)
}

fn parse_config(path: &Path, content: &str) -> Result<LabelPlanConfig, ConfigError> {
    let is_yaml = path
        .extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("yaml") || extension.eq_ignore_ascii_case("yml"));

    let parsed = if is_yaml {
        serde_yaml::from_str(content).map_err(|error| error.to_string())
    } else {
        serde_json::from_str(content).map_err(|error| error.to_string())
    };
    parsed.map_err(|message| ConfigError::Parse {
        path: path.display().to_string(),
        message,
    })
}

/// Resolve `${env:NAME}` references in string settings.
pub fn interpolate_config(config: &mut LabelPlanConfig) -> Result<(), ConfigError> {
    config.api.base_url = interpolate_string(&config.api.base_url)?;
    if let Some(token) = config.api.token.as_mut() {
        *token = interpolate_string(token)?;
    }
    config.work_plan.label_link_base = interpolate_string(&config.work_plan.label_link_base)?;
    Ok(())
}

fn apply_env_overrides(config: &mut LabelPlanConfig) {
    if let Ok(base_url) = env::var(API_BASE_ENV)
        && !base_url.trim().is_empty()
    {
        debug!(%base_url, "api base url overridden from environment");
        config.api.base_url = base_url.trim().to_string();
    }
    if let Ok(token) = env::var(API_TOKEN_ENV)
        && !token.trim().is_empty()
    {
        config.api.token = Some(token.trim().to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labelplan_util::expand_tilde;

    #[test]
    fn default_path_honors_environment_override() {
        let override_path = "~/custom/labelplan/config.json";
        temp_env::with_var(CONFIG_PATH_ENV, Some(override_path), || {
            assert_eq!(default_config_path(), expand_tilde(override_path));
        });
    }

    #[test]
    fn missing_file_yields_defaults() {
        let directory = tempfile::tempdir().expect("tempdir");
        temp_env::with_vars_unset([API_BASE_ENV, API_TOKEN_ENV], || {
            let config = load_config_from_path(&directory.path().join("absent.json")).expect("load");
            assert_eq!(config, LabelPlanConfig::default());
        });
    }

    #[test]
    fn yaml_config_is_interpolated() {
        let directory = tempfile::tempdir().expect("tempdir");
        let path = directory.path().join("config.yaml");
        fs::write(
            &path,
            "api:\n  baseUrl: https://labels.example.com\n  token: ${env:LABELPLAN_TEST_TOKEN}\nworkPlan:\n  maxConcurrentRequests: 2\n",
        )
        .expect("write");

        temp_env::with_vars(
            [
                ("LABELPLAN_TEST_TOKEN", Some("secret-token")),
                (API_BASE_ENV, None),
                (API_TOKEN_ENV, None),
            ],
            || {
                let config = load_config_from_path(&path).expect("load");
                assert_eq!(config.api.token.as_deref(), Some("secret-token"));
                assert_eq!(config.work_plan.max_concurrent_requests, 2);
                assert_eq!(config.work_plan.checkpoint_threshold, 20);
            },
        );
    }

    #[test]
    fn environment_overrides_file_values() {
        let directory = tempfile::tempdir().expect("tempdir");
        let path = directory.path().join("config.json");
        fs::write(&path, r#"{ "api": { "baseUrl": "https://file.example.com" } }"#).expect("write");

        temp_env::with_vars(
            [(API_BASE_ENV, Some("https://env.example.com")), (API_TOKEN_ENV, Some("env-token"))],
            || {
                let config = load_config_from_path(&path).expect("load");
                assert_eq!(config.api.base_url, "https://env.example.com");
                assert_eq!(config.api.token.as_deref(), Some("env-token"));
            },
        );
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let directory = tempfile::tempdir().expect("tempdir");
        let path = directory.path().join("config.json");
        fs::write(&path, r#"{ "workPlan": { "maxConcurrentRequests": 0 } }"#).expect("write");

        temp_env::with_vars_unset([API_BASE_ENV, API_TOKEN_ENV], || {
            let error = load_config_from_path(&path).expect_err("zero concurrency");
            assert!(error.to_string().contains("maxConcurrentRequests"), "unexpected error: {error}");
        });
    }

    #[test]
    fn malformed_json_reports_path() {
        let directory = tempfile::tempdir().expect("tempdir");
        let path = directory.path().join("config.json");
        fs::write(&path, "{ not json").expect("write");

        let error = load_config_from_path(&path).expect_err("malformed");
        assert!(error.to_string().contains("config.json"), "unexpected error: {error}");
    }
}
