//! # HTTP Utilities
//!
//! Response parsing and status hints shared by the API client and the engine's
//! HTTP backend.

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Return a user-friendly error message for common HTTP status codes.
///
/// # Example
/// ```rust
/// use labelplan_util::http::status_error_message;
///
/// let unauthorized = status_error_message(401).unwrap();
/// assert!(unauthorized.contains("LABELPLAN_API_TOKEN"));
///
/// let forbidden = status_error_message(403).unwrap();
/// assert!(forbidden.contains("Forbidden"));
///
/// assert!(status_error_message(404).is_none());
/// ```
pub fn status_error_message(status_code: u16) -> Option<String> {
    match status_code {
        401 => Some("Unauthorized (401). Hint: set LABELPLAN_API_TOKEN=... or api.token in the config file".into()),
        403 => Some("Forbidden (403). Hint: the token is valid but lacks access to this label resource".into()),
        429 => Some("Too Many Requests (429). Hint: lower work_plan.max_concurrent_requests".into()),
        _ => None,
    }
}

/// Parse HTTP response text into JSON, providing detailed errors on failure.
///
/// Empty or whitespace-only bodies parse to `Value::Null`, which the engine
/// treats as "no data" rather than an error.
///
/// # Errors
/// Returns a [`JsonParseError`] carrying the status and up to 200 characters of
/// the body (whitespace collapsed).
pub fn parse_response_json_strict(text: &str, status: Option<StatusCode>) -> Result<Value, JsonParseError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str::<Value>(text).map_err(|error| {
        let status_note = status
            .map(|code| format!("status {code}"))
            .unwrap_or_else(|| "unknown status".to_string());
        let preview = truncate_response_preview(text, 200);

        JsonParseError::new(status_note, error, preview)
    })
}

fn truncate_response_preview(text: &str, limit: usize) -> String {
    let mut preview = String::new();
    for ch in text.chars() {
        if preview.len() >= limit {
            preview.push_str("...");
            break;
        }
        match ch {
            '\n' | '\r' | '\t' => {
                if !preview.ends_with(' ') {
                    preview.push(' ');
                }
            }
            _ => preview.push(ch),
        }
    }

    preview.trim().to_string()
}

/// Error returned when strict JSON parsing of an HTTP response fails.
#[derive(Debug, Error)]
#[error("failed to parse JSON response ({status_note}): {source}. body preview: {body_preview}")]
pub struct JsonParseError {
    status_note: String,
    #[source]
    source: serde_json::Error,
    body_preview: String,
}

impl JsonParseError {
    pub fn new(status_note: String, source: serde_json::Error, body_preview: String) -> Self {
        Self {
            status_note,
            source,
            body_preview,
        }
    }

    /// Access the truncated response preview captured during parsing.
    pub fn body_preview(&self) -> &str {
        &self.body_preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_body_parses_to_null() {
        assert_eq!(parse_response_json_strict("  \n", Some(StatusCode::OK)).expect("parse"), Value::Null);
    }

    #[test]
    fn parse_error_includes_status_and_collapsed_preview() {
        let error = parse_response_json_strict("<html>\n<body>oops</body>", Some(StatusCode::BAD_GATEWAY)).expect_err("html is not json");
        let message = error.to_string();
        assert!(message.contains("status 502"), "unexpected message: {message}");
        assert_eq!(error.body_preview(), "<html> <body>oops</body>");
    }
}
