//! Bounded-parallel endpoint invocation with per-call deadlines and
//! retry-on-empty.
//!
//! Every call resolves to an [`EndpointResult`]; local failures are encoded
//! with synthetic statuses so a failing call never aborts its siblings.

use std::sync::Arc;
use std::time::Duration;

use labelplan_types::{EndpointResult, EndpointSpecification};
use labelplan_util::{has_data, redact_sensitive};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backend::LabelBackend;
use crate::config::WorkPlanSettings;

/// Synthetic status for a call that exceeded its deadline.
pub const STATUS_TIMEOUT: u16 = 408;
/// Synthetic status for a call abandoned because the run was cancelled.
pub const STATUS_CANCELLED: u16 = 499;
/// Synthetic status for a local invocation failure.
pub const STATUS_INVOCATION_ERROR: u16 = 500;

#[derive(Debug, Clone, Copy)]
struct CallPolicy {
    timeout: Duration,
    max_empty_retries: u32,
    retry_backoff: Duration,
}

/// Executes endpoint specifications against a [`LabelBackend`].
#[derive(Clone)]
pub struct EndpointInvoker {
    backend: Arc<dyn LabelBackend>,
    max_concurrent_requests: usize,
    policy: CallPolicy,
}

impl EndpointInvoker {
    pub fn new(backend: Arc<dyn LabelBackend>, settings: &WorkPlanSettings) -> Self {
        Self {
            backend,
            max_concurrent_requests: settings.max_concurrent_requests.max(1),
            policy: CallPolicy {
                timeout: settings.request_timeout(),
                max_empty_retries: settings.max_empty_retries,
                retry_backoff: settings.retry_backoff(),
            },
        }
    }

    /// Execute all specifications and return one result per input, index-aligned.
    ///
    /// The concurrency limiter is created per call, so concurrent runs never
    /// share permits. Completion order is unconstrained.
    pub async fn execute_all(&self, specifications: &[EndpointSpecification], cancel: &CancellationToken) -> Vec<EndpointResult> {
        if specifications.is_empty() {
            return Vec::new();
        }

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_requests));
        let mut tasks = JoinSet::new();
        for (index, specification) in specifications.iter().cloned().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let backend = Arc::clone(&self.backend);
            let cancel = cancel.clone();
            let policy = self.policy;
            tasks.spawn(async move {
                let permit = match cancel.run_until_cancelled(semaphore.acquire_owned()).await {
                    Some(Ok(permit)) => permit,
                    _ => return (index, cancelled(specification)),
                };
                let result = invoke_with_retry(backend.as_ref(), specification, &cancel, policy).await;
                drop(permit);
                (index, result)
            });
        }

        let mut slots: Vec<Option<EndpointResult>> = vec![None; specifications.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(error) => warn!(error = %error, "endpoint invocation task failed"),
            }
        }

        slots
            .into_iter()
            .zip(specifications)
            .map(|(slot, specification)| {
                slot.unwrap_or_else(|| EndpointResult::failure(specification.clone(), STATUS_INVOCATION_ERROR, "invocation task failed"))
            })
            .collect()
    }
}

async fn invoke_with_retry(
    backend: &dyn LabelBackend,
    specification: EndpointSpecification,
    cancel: &CancellationToken,
    policy: CallPolicy,
) -> EndpointResult {
    let mut attempts = 0;
    loop {
        attempts += 1;
        let mut result = invoke_once(backend, &specification, cancel, policy.timeout).await;
        result.attempts = attempts;

        let retryable = !has_data(&result.result) && !result.is_error_status() && attempts <= policy.max_empty_retries;
        if !retryable || cancel.is_cancelled() {
            return result;
        }

        debug!(
            path = %specification.path,
            attempt = attempts,
            backoff_ms = policy.retry_backoff.as_millis(),
            "empty response; retrying"
        );
        if cancel.run_until_cancelled(tokio::time::sleep(policy.retry_backoff)).await.is_none() {
            return result;
        }
    }
}

async fn invoke_once(
    backend: &dyn LabelBackend,
    specification: &EndpointSpecification,
    cancel: &CancellationToken,
    timeout: Duration,
) -> EndpointResult {
    let call_token = cancel.child_token();
    let call = tokio::time::timeout(timeout, backend.execute_endpoint(specification, &call_token));

    match cancel.run_until_cancelled(call).await {
        None => cancelled(specification.clone()),
        Some(Err(_elapsed)) => {
            call_token.cancel();
            warn!(path = %specification.path, timeout_ms = timeout.as_millis(), "endpoint call timed out");
            EndpointResult::failure(
                specification.clone(),
                STATUS_TIMEOUT,
                format!("request timed out after {} ms", timeout.as_millis()),
            )
        }
        Some(Ok(Err(_))) if cancel.is_cancelled() => cancelled(specification.clone()),
        Some(Ok(Err(error))) => {
            let message = redact_sensitive(&format!("{error:#}"));
            warn!(path = %specification.path, error = %message, "endpoint call failed");
            EndpointResult::failure(specification.clone(), STATUS_INVOCATION_ERROR, message)
        }
        Some(Ok(Ok(mut result))) => {
            result.specification = specification.clone();
            result
        }
    }
}

fn cancelled(specification: EndpointSpecification) -> EndpointResult {
    EndpointResult::failure(specification, STATUS_CANCELLED, "request cancelled")
}
