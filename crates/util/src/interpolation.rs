//! `${env:NAME}` interpolation for configuration values.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

static ENV_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{env:([\w+_-]*)}").unwrap());

/// Interpolate a string value, replacing `${env:NAME}` with the variable's value.
///
/// # Errors
/// Returns [`InterpolationError::MissingEnvVar`] when a referenced variable is unset.
pub fn interpolate_string(value: &str) -> Result<String, InterpolationError> {
    let mut resolved = Vec::new();
    for capture in ENV_PATTERN.captures_iter(value) {
        let name = capture[1].to_string();
        let env_value = std::env::var(&name).map_err(|_| InterpolationError::MissingEnvVar { name: name.clone() })?;
        debug!("Interpolated env var: {} -> [REDACTED]", name);
        resolved.push((capture[0].to_string(), env_value));
    }

    let mut result = value.to_string();
    for (placeholder, env_value) in resolved {
        result = result.replace(&placeholder, &env_value);
    }
    Ok(result)
}

/// Errors that can occur during interpolation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InterpolationError {
    #[error("Missing environment variable: {name}")]
    MissingEnvVar { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolates_environment_references() {
        temp_env::with_var("LABELPLAN_INTERPOLATION_TEST", Some("token-value"), || {
            let resolved = interpolate_string("Bearer ${env:LABELPLAN_INTERPOLATION_TEST}").expect("resolves");
            assert_eq!(resolved, "Bearer token-value");
        });
    }

    #[test]
    fn reports_missing_variables() {
        temp_env::with_var("LABELPLAN_INTERPOLATION_MISSING", None::<&str>, || {
            let error = interpolate_string("${env:LABELPLAN_INTERPOLATION_MISSING}").expect_err("missing");
            assert_eq!(
                error,
                InterpolationError::MissingEnvVar {
                    name: "LABELPLAN_INTERPOLATION_MISSING".into()
                }
            );
        });
    }

    #[test]
    fn leaves_plain_strings_untouched() {
        assert_eq!(interpolate_string("https://labels.example.com").expect("plain"), "https://labels.example.com");
    }
}
