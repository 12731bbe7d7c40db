//! # Text Processing Utilities
//!
//! Redaction of credential-looking values in text that leaves the process:
//! error messages surfaced in progress events, and logged request details.
//! Product identifiers (GUIDs) are deliberately left readable because users
//! act on them after a checkpoint pause.

use once_cell::sync::Lazy;
use regex::Regex;

/// Redacts values that look like secrets in a string.
///
/// # Example
/// ```rust
/// use labelplan_util::text_processing::redact_sensitive;
///
/// let redacted = redact_sensitive("API_KEY=abc123 TOKEN=xyz789");
/// assert_eq!(redacted, "API_KEY=[REDACTED] TOKEN=[REDACTED]");
///
/// let redacted = redact_sensitive("Authorization: Bearer secret123");
/// assert_eq!(redacted, "Authorization: [REDACTED]");
/// ```
pub fn redact_sensitive(input: &str) -> String {
    redact_sensitive_with(input, "[REDACTED]")
}

/// Redacts sensitive-looking values, using a custom replacement token.
///
/// Capture group 1 (when present) is kept as a prefix, group 2 is the secret,
/// and group 3 (when present) is kept as a suffix.
pub fn redact_sensitive_with(input: &str, replacement: &str) -> String {
    let mut redacted = input.to_string();

    for pattern in REDACT_PATTERNS.iter() {
        redacted = pattern
            .replace_all(&redacted, |captures: &regex::Captures| {
                let prefix = captures.get(1).map(|m| m.as_str()).unwrap_or("");
                let suffix = captures.get(3).map(|m| m.as_str()).unwrap_or("");
                if captures.get(2).is_some() {
                    format!("{prefix}{replacement}{suffix}")
                } else {
                    replacement.to_string()
                }
            })
            .to_string();
    }

    redacted
}

static REDACT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(build_redact_patterns);

/// Ordered from most specific to most general.
fn build_redact_patterns() -> Vec<Regex> {
    vec![
        Regex::new(r"(?i)(authorization:\s+)([^\s]+(?:\s+[^\s,;]+)?)").unwrap(),
        Regex::new(r"(?i)((?:^|\b)Bearer\s+)([A-Za-z0-9\-._~+/]+=*)").unwrap(),
        Regex::new(r"(?i)((?:^|\b)Basic\s+)([A-Za-z0-9+/]+=*)").unwrap(),
        Regex::new(r"(?i)(\b[A-Z0-9_]*?(?:KEY|TOKEN|SECRET|PASSWORD)=)([^\s&;]+)").unwrap(),
        Regex::new(r#"(?i)("(?:[A-Za-z0-9_]*?)(?:apikey|api_key|token|secret|password|clientsecret)"\s*:\s*")([^"]+)(")"#).unwrap(),
        Regex::new(r"(?i)((?:access_token|refresh_token|code|client_secret)=)([^\s&]+)").unwrap(),
        Regex::new(r"(eyJ[A-Za-z0-9\-_]+\.[A-Za-z0-9\-_]+\.[A-Za-z0-9\-_]*)").unwrap(),
        Regex::new(r"(?i)((?:postgres(?:ql)?|mysql|sqlserver|rediss?)://[^\s]+)").unwrap(),
        Regex::new(r"(?i)((?:Password|Pwd)=)([^;\s]+)").unwrap(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_shell_style_sensitive_env_vars() {
        assert_eq!(
            redact_sensitive("LABELPLAN_API_TOKEN=supersecret failed"),
            "LABELPLAN_API_TOKEN=[REDACTED] failed"
        );
    }

    #[test]
    fn redacts_json_style_sensitive_entries() {
        let input = r#"{"clientSecret": "top-secret"}"#;
        assert_eq!(redact_sensitive(input), r#"{"clientSecret": "[REDACTED]"}"#);
    }

    #[test]
    fn redacts_bare_jwt_tokens() {
        let input = "token eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiIxIn0.abc rejected";
        assert_eq!(redact_sensitive(input), "token [REDACTED] rejected");
    }

    #[test]
    fn redacts_oauth_query_parameters() {
        let input = "GET /callback?code=abc123&state=xyz";
        assert_eq!(redact_sensitive(input), "GET /callback?code=[REDACTED]&state=xyz");
    }

    #[test]
    fn redacts_connection_strings() {
        let input = "Server=db;Database=labels;User Id=app;Password=hunter2;";
        assert_eq!(redact_sensitive(input), "Server=db;Database=labels;User Id=app;Password=[REDACTED];");
    }

    #[test]
    fn keeps_product_guids_readable() {
        let input = "label 5f1c2d3e-1111-2222-3333-444455556666 returned 404";
        assert_eq!(redact_sensitive(input), input);
    }

    #[test]
    fn custom_replacement_token_is_used() {
        assert_eq!(redact_sensitive_with("Bearer abc.def", "<redacted>"), "Bearer <redacted>");
    }
}
