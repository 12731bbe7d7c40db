//! Filesystem path helpers for configuration discovery.

use std::env;
use std::path::PathBuf;

use dirs_next::{config_dir, home_dir};

/// Expands a leading `~` (either separator style) to the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    let trimmed = path.trim();
    let home = || home_dir().unwrap_or_else(|| PathBuf::from("~"));
    if trimmed == "~" {
        return home();
    }
    match trimmed.strip_prefix("~/").or_else(|| trimmed.strip_prefix("~\\")) {
        Some(rest) => home().join(rest),
        None => PathBuf::from(trimmed),
    }
}

/// Resolves a configuration file path.
///
/// A non-blank `override_env` variable wins (with `~` expanded); otherwise the
/// file lives at `<config_dir>/<app_dir>/<file_name>`, falling back to the
/// current directory when the platform has no config directory.
pub fn config_file_path(override_env: &str, app_dir: &str, file_name: &str) -> PathBuf {
    if let Ok(path) = env::var(override_env)
        && !path.trim().is_empty()
    {
        return expand_tilde(&path);
    }

    config_dir().unwrap_or_else(|| PathBuf::from(".")).join(app_dir).join(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_variable_takes_precedence() {
        temp_env::with_var("LABELPLAN_PATH_TEST", Some("/tmp/labelplan/config.json"), || {
            let path = config_file_path("LABELPLAN_PATH_TEST", "labelplan", "config.json");
            assert_eq!(path, PathBuf::from("/tmp/labelplan/config.json"));
        });
    }

    #[test]
    fn blank_override_falls_back_to_config_dir() {
        temp_env::with_var("LABELPLAN_PATH_TEST_BLANK", Some("   "), || {
            let path = config_file_path("LABELPLAN_PATH_TEST_BLANK", "labelplan", "config.json");
            assert!(path.ends_with("labelplan/config.json"), "unexpected path: {}", path.display());
        });
    }

    #[test]
    fn expands_home_prefix() {
        let expanded = expand_tilde("~/labelplan/config.json");
        assert!(expanded.ends_with("labelplan/config.json"));
        assert!(!expanded.starts_with("~") || home_dir().is_none());
        assert_eq!(expand_tilde("/etc/labelplan.json"), PathBuf::from("/etc/labelplan.json"));
    }
}
