//! Label API client utilities.
//!
//! This module provides a lightweight client for the label-data API and the AI
//! endpoints that plan and summarize work-plan runs. It focuses on:
//!
//! - Constructing an HTTP client with sensible defaults
//! - Validating the configured base URL for safety
//! - Attaching bearer credentials and a consistent User-Agent
//! - Decoding JSON responses with useful error context
//!
//! The primary entry point is [`LabelApiClient`].
//!
//! # Example
//!
//! ```ignore
//! use labelplan_api::LabelApiClient;
//! use labelplan_types::InterpretRequest;
//!
//! let client = LabelApiClient::new("https://labels.example.com", Some("token"), std::time::Duration::from_secs(30))?;
//! let interpretation = client
//!     .interpret(&InterpretRequest { user_message: "aspirin dosage".into(), conversation_id: None })
//!     .await?;
//! ```

use std::env;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use indexmap::IndexMap;
use labelplan_types::{InterpretRequest, Interpretation, Synthesis, SynthesisRequest, SystemContext};
use labelplan_util::http::{parse_response_json_strict, status_error_message};
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

/// Hostnames allowed for local development regardless of scheme.
const LOCALHOST_DOMAINS: &[&str] = &["localhost", "127.0.0.1", "[::1]"];

pub const INTERPRET_PATH: &str = "/api/ai/interpret";
pub const SYNTHESIZE_PATH: &str = "/api/ai/synthesize";
pub const CONTEXT_PATH: &str = "/api/ai/context";

/// Status and decoded body of a raw API call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: StatusCode,
    /// Parsed JSON body; `Null` for empty bodies and error statuses.
    pub payload: Value,
    /// Error text for non-success statuses.
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
/// Thin wrapper around a configured `reqwest::Client` for label API access.
pub struct LabelApiClient {
    pub base_url: String,
    pub http: Client,
    pub user_agent: String,
}

impl LabelApiClient {
    /// Construct a client for `base_url`, authenticating with `token` when present.
    ///
    /// Non-localhost hosts must use HTTPS. `timeout` bounds each request at the
    /// transport level; the engine applies its own per-call deadline on top.
    pub fn new(base_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self> {
        validate_base_url(base_url)?;

        let mut default_headers = header::HeaderMap::new();
        if let Some(token) = token.map(str::trim).filter(|token| !token.is_empty()) {
            let mut value = header::HeaderValue::from_str(&format!("Bearer {token}")).context("invalid API token characters")?;
            value.set_sensitive(true);
            default_headers.insert(header::AUTHORIZATION, value);
        }
        default_headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(default_headers)
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("build http client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            user_agent: format!("labelplan/{}; {}", env!("CARGO_PKG_VERSION"), env::consts::OS),
        })
    }

    /// Build a `reqwest::RequestBuilder` for a method and API-relative path.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = join_url(&self.base_url, path);
        debug!(%url, "building request");

        self.http.request(method, url).header(header::USER_AGENT, &self.user_agent)
    }

    /// Execute an arbitrary label API call and decode its JSON body.
    ///
    /// Non-success statuses are returned as data (with `payload = Null` and an
    /// error description) rather than as `Err`; only transport failures and
    /// malformed JSON on success statuses are errors.
    pub async fn execute(
        &self,
        method: Method,
        path: &str,
        query: Option<&IndexMap<String, String>>,
        body: Option<&Value>,
    ) -> Result<ApiResponse> {
        let start = Instant::now();
        let mut builder = self.request(method.clone(), path);
        if let Some(query) = query.filter(|query| !query.is_empty()) {
            let pairs: Vec<(&str, &str)> = query.iter().map(|(key, value)| (key.as_str(), value.as_str())).collect();
            builder = builder.query(&pairs);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|error| anyhow!("Network error: {}", error))?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            warn!(
                method = %method,
                path = %path,
                status = %status,
                duration_ms = start.elapsed().as_millis(),
                "label api request failed"
            );
            let hint = status_error_message(status.as_u16()).unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Ok(ApiResponse {
                status,
                payload: Value::Null,
                error: Some(hint),
            });
        }

        let payload = parse_response_json_strict(&text, Some(status))?;
        debug!(
            method = %method,
            path = %path,
            status = %status,
            duration_ms = start.elapsed().as_millis(),
            "label api request completed"
        );
        Ok(ApiResponse {
            status,
            payload,
            error: None,
        })
    }

    /// Ask the interpreter to plan endpoint calls for a user message.
    pub async fn interpret(&self, request: &InterpretRequest) -> Result<Interpretation> {
        self.post_json(INTERPRET_PATH, request).await.context("interpret request failed")
    }

    /// Ask the backend to summarize executed endpoint results.
    pub async fn synthesize(&self, request: &SynthesisRequest) -> Result<Synthesis> {
        self.post_json(SYNTHESIZE_PATH, request).await.context("synthesize request failed")
    }

    /// Fetch the ancillary system context; `None` when the backend has none.
    pub async fn context(&self) -> Result<Option<SystemContext>> {
        let response = self.execute(Method::GET, CONTEXT_PATH, None, None).await?;
        if response.status == StatusCode::NOT_FOUND || response.payload.is_null() {
            return Ok(None);
        }
        if let Some(error) = response.error {
            bail!("context request failed: {error}");
        }
        let context = serde_json::from_value(response.payload).context("decode system context")?;
        Ok(Some(context))
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body).context("encode request body")?;
        let response = self.execute(Method::POST, path, None, Some(&body)).await?;
        if let Some(error) = response.error {
            bail!("{path} returned {}: {error}", response.status.as_u16());
        }
        if response.payload.is_null() {
            bail!("{path} returned an empty body");
        }
        serde_json::from_value(response.payload).with_context(|| format!("decode {path} response"))
    }
}

fn join_url(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// Validate that a base URL is acceptable for use by the client.
///
/// Rules:
/// - `localhost`, `127.0.0.1`, or `[::1]`: any scheme is allowed
/// - otherwise: scheme must be HTTPS
pub fn validate_base_url(base: &str) -> Result<()> {
    let parsed_base_url = Url::parse(base).map_err(|e| anyhow!("Invalid label API base URL '{}': {}", base, e))?;

    let host_name = parsed_base_url
        .host_str()
        .ok_or_else(|| anyhow!("label API base URL must include a host"))?;

    if LOCALHOST_DOMAINS.iter().any(|&allowed| host_name.eq_ignore_ascii_case(allowed)) {
        return Ok(());
    }

    if parsed_base_url.scheme() != "https" {
        return Err(anyhow!(
            "label API base URL must use https for non-localhost hosts; got '{}://'",
            parsed_base_url.scheme()
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_https_and_localhost() {
        assert!(validate_base_url("https://labels.example.com").is_ok());
        assert!(validate_base_url("http://localhost:5093").is_ok());
        assert!(validate_base_url("http://127.0.0.1:8080/").is_ok());
    }

    #[test]
    fn rejects_plain_http_for_remote_hosts() {
        let error = validate_base_url("http://labels.example.com").expect_err("http should be rejected");
        assert!(error.to_string().contains("must use https"), "unexpected error: {error}");
    }

    #[test]
    fn rejects_unparseable_urls() {
        assert!(validate_base_url("not a url").is_err());
    }

    #[test]
    fn joins_paths_without_double_slashes() {
        assert_eq!(join_url("https://x.test/", "/api/label"), "https://x.test/api/label");
        assert_eq!(join_url("https://x.test", "api/label"), "https://x.test/api/label");
    }

    #[test]
    fn request_carries_user_agent_and_bearer_token() {
        let client = LabelApiClient::new("https://labels.example.com/", Some("abc"), Duration::from_secs(5)).expect("client");
        assert_eq!(client.base_url, "https://labels.example.com");

        let request = client.request(Method::GET, "/api/label/search").build().expect("request");
        assert_eq!(request.url().as_str(), "https://labels.example.com/api/label/search");
        assert!(
            request
                .headers()
                .get(header::USER_AGENT)
                .and_then(|value| value.to_str().ok())
                .is_some_and(|agent| agent.starts_with("labelplan/"))
        );
    }
}
