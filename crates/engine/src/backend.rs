//! Seam between the engine and the label backend.
//!
//! The executor only talks to [`LabelBackend`]; [`HttpLabelBackend`] is the
//! production implementation over [`LabelApiClient`], and tests substitute
//! in-memory fakes.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use labelplan_api::LabelApiClient;
use labelplan_types::{EndpointResult, EndpointSpecification, InterpretRequest, Interpretation, Synthesis, SynthesisRequest, SystemContext};
use reqwest::Method;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ApiConfig;
use crate::config::WorkPlanSettings;

/// Operations the engine consumes from the label backend.
#[async_trait]
pub trait LabelBackend: Send + Sync {
    /// Plan endpoint calls for a user message.
    async fn interpret(&self, request: &InterpretRequest) -> Result<Interpretation>;

    /// Execute one planned call. Error statuses are reported inside the
    /// result; `Err` is reserved for local failures such as transport errors.
    async fn execute_endpoint(&self, specification: &EndpointSpecification, cancel: &CancellationToken) -> Result<EndpointResult>;

    /// Summarize executed endpoint results.
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Synthesis>;

    /// Ancillary system context; not used by the pipeline itself.
    async fn get_context(&self) -> Result<Option<SystemContext>>;
}

/// [`LabelBackend`] backed by the label HTTP API.
pub struct HttpLabelBackend {
    client: LabelApiClient,
}

impl HttpLabelBackend {
    pub fn new(client: LabelApiClient) -> Self {
        Self { client }
    }

    /// Build a backend from connection settings, using the per-call timeout
    /// as the transport timeout.
    pub fn from_config(api: &ApiConfig, settings: &WorkPlanSettings) -> Result<Self> {
        let client = LabelApiClient::new(&api.base_url, api.token.as_deref(), settings.request_timeout())?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl LabelBackend for HttpLabelBackend {
    async fn interpret(&self, request: &InterpretRequest) -> Result<Interpretation> {
        self.client.interpret(request).await
    }

    async fn execute_endpoint(&self, specification: &EndpointSpecification, cancel: &CancellationToken) -> Result<EndpointResult> {
        let method = Method::from_bytes(specification.method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| anyhow!("unsupported HTTP method '{}'", specification.method))?;
        debug!(method = %method, path = %specification.path, "executing endpoint");

        let call = self.client.execute(
            method,
            &specification.path,
            specification.query_parameters.as_ref(),
            specification.body.as_deref(),
        );
        let response = cancel
            .run_until_cancelled(call)
            .await
            .ok_or_else(|| anyhow!("request cancelled"))??;

        let mut result = EndpointResult::new(specification.clone(), response.status.as_u16(), response.payload);
        result.error = response.error;
        Ok(result)
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Synthesis> {
        self.client.synthesize(request).await
    }

    async fn get_context(&self) -> Result<Option<SystemContext>> {
        self.client.context().await
    }
}
