//! Work-plan pipeline driver.
//!
//! A run moves through interpretation, planning, discovery, an optional
//! checkpoint, the remaining step groups, and synthesis. Every phase reports
//! through a [`WorkPlanProgress`] event written to a Tokio channel as soon as
//! it is produced; the run ends after exactly one terminal event
//! (`AwaitingCheckpoint`, `Error`, or `Complete`).

mod steps;

use std::sync::Arc;

use anyhow::Result;
use futures_util::stream::{self, Stream};
use labelplan_types::{InterpretRequest, SystemContext, WorkPlanPhase, WorkPlanProgress, WorkPlanRequest};
use labelplan_util::redact_sensitive;
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub use steps::{PreparedStep, RunState, group_by_step, has_usable_data, prepare_step};

use crate::backend::{HttpLabelBackend, LabelBackend};
use crate::checkpoint;
use crate::config::{LabelPlanConfig, WorkPlanSettings};
use crate::events::ProgressSink;
use crate::invoker::EndpointInvoker;
use crate::products::extract_products;
use crate::synthesis::{SynthesisCoordinator, SynthesisInput};

/// Message carried by the terminal event of a cancelled run.
pub const CANCELLED_MESSAGE: &str = "work plan cancelled";

/// Drives work-plan runs against a [`LabelBackend`].
///
/// The executor is cheap to clone; each run builds its own limiter and state.
#[derive(Clone)]
pub struct WorkPlanExecutor {
    backend: Arc<dyn LabelBackend>,
    settings: WorkPlanSettings,
}

impl WorkPlanExecutor {
    pub fn new(backend: Arc<dyn LabelBackend>, settings: WorkPlanSettings) -> Self {
        Self { backend, settings }
    }

    /// Build an executor over the HTTP backend described by `config`.
    pub fn from_config(config: &LabelPlanConfig) -> Result<Self> {
        let backend = HttpLabelBackend::from_config(&config.api, &config.work_plan)?;
        Ok(Self::new(Arc::new(backend), config.work_plan.clone()))
    }

    /// Ancillary system context from the backend.
    pub async fn system_context(&self) -> Result<Option<SystemContext>> {
        self.backend.get_context().await
    }

    /// Spawn a run and return its progress events as a stream.
    ///
    /// The stream ends after the terminal event. Must be called from within a
    /// Tokio runtime.
    pub fn stream(&self, request: WorkPlanRequest, cancel: CancellationToken) -> impl Stream<Item = WorkPlanProgress> + Send + 'static {
        let (event_tx, event_rx) = unbounded_channel();
        let executor = self.clone();
        tokio::spawn(async move {
            executor.execute_with_progress(request, cancel, event_tx).await;
        });

        stream::unfold(event_rx, |mut event_rx| async move { event_rx.recv().await.map(|event| (event, event_rx)) })
    }

    /// Run the pipeline, writing each progress event to `event_tx`.
    ///
    /// Never fails: unexpected errors and cancellation become a terminal
    /// `Error` event.
    pub async fn execute_with_progress(&self, request: WorkPlanRequest, cancel: CancellationToken, event_tx: UnboundedSender<WorkPlanProgress>) {
        let mut sink = ProgressSink::new(event_tx, request.conversation_id.clone());

        let outcome = {
            let run = self.run(&request, &cancel, &mut sink);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = run => Some(result),
            }
        };

        match outcome {
            Some(Ok(())) => {}
            None => {
                info!("work plan cancelled");
                let _ = sink.fail(CANCELLED_MESSAGE);
            }
            Some(Err(run_error)) => {
                let message = redact_sensitive(&format!("{run_error:#}"));
                error!(error = %message, "work plan failed");
                let _ = sink.fail(message);
            }
        }
    }

    async fn run(&self, request: &WorkPlanRequest, cancel: &CancellationToken, sink: &mut ProgressSink) -> Result<()> {
        let query = request.query.trim();
        if query.is_empty() {
            return sink.fail("Query must not be empty");
        }

        sink.emit_phase(WorkPlanPhase::Interpreting, "Interpreting query")?;
        let interpret_request = InterpretRequest {
            user_message: query.to_string(),
            conversation_id: sink.conversation_id().map(str::to_string),
        };
        let interpretation = match self.backend.interpret(&interpret_request).await {
            Ok(interpretation) => interpretation,
            Err(interpret_error) => {
                let message = redact_sensitive(&format!("{interpret_error:#}"));
                warn!(error = %message, "interpretation failed");
                return sink.fail(format!("Interpretation failed: {message}"));
            }
        };
        sink.set_conversation_id(interpretation.conversation_id.clone());

        if interpretation.is_direct_response {
            let mut event = sink.event(WorkPlanPhase::Complete, "Answered without endpoint calls");
            event.content = Some(interpretation.direct_response.unwrap_or_default());
            return sink.emit(event);
        }
        if !interpretation.success {
            let reason = interpretation
                .error
                .filter(|reason| !reason.trim().is_empty())
                .unwrap_or_else(|| "the query could not be interpreted".to_string());
            return sink.fail(format!("Interpretation failed: {}", redact_sensitive(&reason)));
        }
        if interpretation.endpoints.is_empty() {
            return sink.fail("Interpretation produced no endpoint calls");
        }

        let planned_calls = interpretation.endpoints.len();
        let groups = group_by_step(interpretation.endpoints);
        let total_steps = u32::try_from(groups.len()).unwrap_or(u32::MAX);
        sink.set_steps(0, total_steps);
        sink.emit_phase(
            WorkPlanPhase::Planning,
            format!("Planned {planned_calls} endpoint calls across {total_steps} steps"),
        )?;

        let invoker = EndpointInvoker::new(Arc::clone(&self.backend), &self.settings);
        let mut state = RunState::default();
        let mut groups = groups.into_iter();

        let Some((discovery_step, discovery_group)) = groups.next() else {
            return sink.fail("Interpretation produced no endpoint calls");
        };
        sink.set_steps(1, total_steps);
        sink.emit_phase(
            WorkPlanPhase::Discovering,
            format!("Running {} discovery calls", discovery_group.len()),
        )?;
        let prepared = prepare_step(&discovery_group, &state.variables, false);
        let results = invoker.execute_all(&prepared.specifications, cancel).await;
        let mut previous_had_data = has_usable_data(&results);
        state.products = extract_products(&results);
        state.record(discovery_step, results);
        info!(products = state.products.len(), variables = state.variables.len(), "discovery complete");

        let mut discovered = sink.event(
            WorkPlanPhase::Discovering,
            format!("Discovered {} products", state.products.len()),
        );
        discovered.products = state.products.clone();
        sink.emit(discovered)?;

        let selection = request.selected_product_guids.as_deref();
        if let Some(pause) = checkpoint::evaluate(selection, &state.products, self.settings.checkpoint_threshold) {
            let pause = pause
                .with_steps(1, total_steps)
                .with_conversation(sink.conversation_id().map(str::to_string));
            return sink.emit(pause);
        }
        if let Some(selection) = selection {
            checkpoint::filter_variables_to_selection(&mut state.variables, selection);
            info!(selected = selection.len(), "filtered identifier variables to selection");
        }

        for (offset, (step, group)) in groups.enumerate() {
            let current_step = u32::try_from(offset + 2).unwrap_or(u32::MAX);
            sink.set_steps(current_step, total_steps);

            let prepared = prepare_step(&group, &state.variables, previous_had_data);
            if prepared.specifications.is_empty() {
                sink.emit_phase(
                    WorkPlanPhase::Executing,
                    format!(
                        "Skipped step {current_step} of {total_steps} ({} calls skipped)",
                        prepared.skipped
                    ),
                )?;
                continue;
            }

            let message = match prepared.skipped {
                0 => format!(
                    "Executing step {current_step} of {total_steps} ({} calls)",
                    prepared.specifications.len()
                ),
                skipped => format!(
                    "Executing step {current_step} of {total_steps} ({} calls, {skipped} skipped)",
                    prepared.specifications.len()
                ),
            };
            sink.emit_phase(WorkPlanPhase::Executing, message)?;
            let results = invoker.execute_all(&prepared.specifications, cancel).await;
            previous_had_data = has_usable_data(&results);
            state.record(step, results);
        }

        sink.set_steps(total_steps, total_steps);
        let results = state.all_results();
        let coordinator = SynthesisCoordinator::new(Arc::clone(&self.backend), &self.settings);
        let input = SynthesisInput {
            query,
            results: &results,
            products: &state.products,
            selection,
        };
        let outcome = coordinator.synthesize(input, sink).await?;

        let mut complete = sink.event(WorkPlanPhase::Complete, "Work plan complete");
        complete.content = Some(outcome.content);
        complete.products = state.products;
        complete.data_references = outcome.data_references;
        complete.suggested_follow_ups = outcome.suggested_follow_ups;
        complete.warnings = outcome.warnings;
        sink.emit(complete)
    }
}
