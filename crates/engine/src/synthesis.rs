//! Single-pass and batched synthesis of endpoint results.
//!
//! Large result sets are split into contiguous batches that are synthesized
//! one after another, each streamed as a progress event, and then joined.
//! Synthesis failures never abort the run.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use indexmap::IndexMap;
use labelplan_types::{EndpointResult, ProductDiscovery, Synthesis, SynthesisRequest, WorkPlanPhase};
use labelplan_util::redact_sensitive;
use tracing::{debug, info, warn};

use crate::backend::LabelBackend;
use crate::config::WorkPlanSettings;
use crate::events::ProgressSink;

/// Separator between batch responses in the combined content.
pub const BATCH_SEPARATOR: &str = "\n\n---\n\n";

/// Everything synthesis needs from the run.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInput<'a> {
    pub query: &'a str,
    pub results: &'a [EndpointResult],
    pub products: &'a [ProductDiscovery],
    pub selection: Option<&'a [String]>,
}

/// Final text and metadata surfaced in the terminal event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynthesisOutcome {
    pub content: String,
    pub data_references: IndexMap<String, String>,
    pub suggested_follow_ups: Vec<String>,
    pub warnings: Vec<String>,
    /// Number of backend synthesize calls made.
    pub batches: usize,
}

/// Chooses between single-pass and batched synthesis and runs it.
pub struct SynthesisCoordinator {
    backend: Arc<dyn LabelBackend>,
    settings: WorkPlanSettings,
}

impl SynthesisCoordinator {
    pub fn new(backend: Arc<dyn LabelBackend>, settings: &WorkPlanSettings) -> Self {
        Self {
            backend,
            settings: settings.clone(),
        }
    }

    pub fn should_batch(&self, input: &SynthesisInput<'_>) -> bool {
        effective_product_count(input.products.len(), input.selection, input.results.len()) > self.settings.synthesis_batch_threshold
    }

    /// Synthesize `input`, streaming batch progress through `sink`.
    ///
    /// Only a failure to deliver progress is returned as an error.
    pub async fn synthesize(&self, input: SynthesisInput<'_>, sink: &mut ProgressSink) -> Result<SynthesisOutcome> {
        if self.should_batch(&input) {
            self.synthesize_batched(input, sink).await
        } else {
            self.synthesize_once(input, sink).await
        }
    }

    async fn synthesize_once(&self, input: SynthesisInput<'_>, sink: &mut ProgressSink) -> Result<SynthesisOutcome> {
        sink.emit_phase(
            WorkPlanPhase::Synthesizing,
            format!("Synthesizing {} endpoint results", input.results.len()),
        )?;

        let request = SynthesisRequest {
            original_query: input.query.to_string(),
            conversation_id: sink.conversation_id().map(str::to_string),
            executed_endpoints: input.results.to_vec(),
        };

        let mut outcome = match self.backend.synthesize(&request).await {
            Ok(synthesis) => {
                sink.set_conversation_id(synthesis.conversation_id.clone());
                BatchAccumulator::default().absorb(synthesis).finish()
            }
            Err(error) => {
                let message = redact_sensitive(&format!("{error:#}"));
                warn!(error = %message, "synthesis failed; using local summary");
                SynthesisOutcome {
                    content: local_summary(&input, self.settings.max_data_references),
                    warnings: vec![format!("The summary service was unavailable ({message}); showing a basic summary instead.")],
                    ..SynthesisOutcome::default()
                }
            }
        };
        outcome.batches = 1;
        self.fill_data_references(&mut outcome, &input);
        Ok(outcome)
    }

    async fn synthesize_batched(&self, input: SynthesisInput<'_>, sink: &mut ProgressSink) -> Result<SynthesisOutcome> {
        let batch_size = self.settings.synthesis_batch_size.max(1);
        let chunks: Vec<&[EndpointResult]> = input.results.chunks(batch_size).collect();
        let batch_total = chunks.len();
        info!(results = input.results.len(), batch_size, batch_total, "synthesizing in batches");

        let mut announcement = sink.event(
            WorkPlanPhase::Synthesizing,
            format!("Synthesizing {} endpoint results in {} batches", input.results.len(), batch_total),
        );
        announcement.batch_total = Some(batch_total);
        sink.emit(announcement)?;

        let mut accumulator = BatchAccumulator::default();
        for (index, chunk) in chunks.into_iter().enumerate() {
            let batch_current = index + 1;
            let request = SynthesisRequest {
                original_query: input.query.to_string(),
                conversation_id: sink.conversation_id().map(str::to_string),
                executed_endpoints: chunk.to_vec(),
            };

            let (message, partial_content) = match self.backend.synthesize(&request).await {
                Ok(synthesis) => {
                    sink.set_conversation_id(synthesis.conversation_id.clone());
                    let partial = Some(synthesis.response.clone()).filter(|text| !text.trim().is_empty());
                    accumulator = accumulator.absorb(synthesis);
                    (format!("Synthesized batch {batch_current} of {batch_total}"), partial)
                }
                Err(error) => {
                    let message = redact_sensitive(&format!("{error:#}"));
                    warn!(batch = batch_current, error = %message, "batch synthesis failed");
                    accumulator = accumulator.with_warning(format!("Batch {batch_current} of {batch_total} could not be summarized ({message})."));
                    (format!("Batch {batch_current} of {batch_total} failed"), None)
                }
            };

            let mut event = sink.event(WorkPlanPhase::Synthesizing, message);
            event.batch_current = Some(batch_current);
            event.batch_total = Some(batch_total);
            event.partial_content = partial_content;
            sink.emit(event)?;
        }

        let mut outcome = accumulator.finish();
        outcome.batches = batch_total;
        if outcome.content.trim().is_empty() {
            outcome.content = local_summary(&input, self.settings.max_data_references);
        }
        self.fill_data_references(&mut outcome, &input);
        Ok(outcome)
    }

    fn fill_data_references(&self, outcome: &mut SynthesisOutcome, input: &SynthesisInput<'_>) {
        if !outcome.data_references.is_empty() || input.products.is_empty() {
            return;
        }
        let products = reference_products(input.products, input.selection);
        outcome.data_references = build_data_references(&products, &self.settings.label_link_base, self.settings.max_data_references);
        debug!(count = outcome.data_references.len(), "built data references from products");
    }
}

/// Running state across sequential batches.
///
/// The last non-empty references and follow-ups win; earlier ones are
/// replaced rather than merged.
#[derive(Debug, Default)]
struct BatchAccumulator {
    sections: Vec<String>,
    data_references: Option<IndexMap<String, String>>,
    suggested_follow_ups: Option<Vec<String>>,
    warnings: Vec<String>,
}

impl BatchAccumulator {
    fn absorb(mut self, synthesis: Synthesis) -> Self {
        if !synthesis.response.trim().is_empty() {
            self.sections.push(synthesis.response);
        }
        if let Some(references) = synthesis.data_references.filter(|references| !references.is_empty()) {
            self.data_references = Some(references);
        }
        if let Some(follow_ups) = synthesis.suggested_follow_ups.filter(|follow_ups| !follow_ups.is_empty()) {
            self.suggested_follow_ups = Some(follow_ups);
        }
        self.warnings.extend(synthesis.warnings.unwrap_or_default());
        self
    }

    fn with_warning(mut self, warning: String) -> Self {
        self.warnings.push(warning);
        self
    }

    fn finish(self) -> SynthesisOutcome {
        SynthesisOutcome {
            content: self.sections.join(BATCH_SEPARATOR),
            data_references: self.data_references.unwrap_or_default(),
            suggested_follow_ups: self.suggested_follow_ups.unwrap_or_default(),
            warnings: self.warnings,
            batches: 0,
        }
    }
}

/// Count used for the batching decision.
///
/// With discovered products this is the selection size when one was supplied,
/// else the discovered count; without products it is the result count.
pub fn effective_product_count(discovered: usize, selection: Option<&[String]>, results: usize) -> usize {
    if discovered == 0 {
        return results;
    }
    selection.map_or(discovered, <[String]>::len)
}

/// Build `/label/{guid}` links keyed by product display name.
///
/// At most `cap` entries are produced; on key collisions the first link wins.
pub fn build_data_references(products: &[&ProductDiscovery], link_base: &str, cap: usize) -> IndexMap<String, String> {
    let base = link_base.trim_end_matches('/');
    let mut references = IndexMap::new();
    for product in products {
        if references.len() >= cap {
            break;
        }
        let name = if product.name.trim().is_empty() { product.guid.as_str() } else { product.name.trim() };
        let key = match product.labeler.as_deref().map(str::trim).filter(|labeler| !labeler.is_empty()) {
            Some(labeler) => format!("View Full Label ({name} - {labeler})"),
            None => format!("View Full Label ({name})"),
        };
        references.entry(key).or_insert_with(|| format!("{base}/label/{}", product.guid));
    }
    references
}

/// Products to link: the selected ones when a selection matches, else all.
fn reference_products<'a>(products: &'a [ProductDiscovery], selection: Option<&[String]>) -> Vec<&'a ProductDiscovery> {
    let selected: HashSet<String> = selection
        .unwrap_or_default()
        .iter()
        .map(|guid| guid.trim().to_ascii_lowercase())
        .collect();
    let matching: Vec<&ProductDiscovery> = products
        .iter()
        .filter(|product| selected.contains(&product.guid.to_ascii_lowercase()))
        .collect();
    if matching.is_empty() { products.iter().collect() } else { matching }
}

fn local_summary(input: &SynthesisInput<'_>, max_products: usize) -> String {
    let successful = input.results.iter().filter(|result| result.is_success()).count();
    let mut summary = format!(
        "Retrieved data from {successful} of {} endpoint calls for \"{}\", but a written summary could not be generated.",
        input.results.len(),
        input.query
    );

    let products = reference_products(input.products, input.selection);
    if !products.is_empty() {
        summary.push_str("\n\nProducts found:");
        for product in products.iter().take(max_products) {
            match product.labeler.as_deref() {
                Some(labeler) => summary.push_str(&format!("\n- {} ({labeler})", product.name)),
                None => summary.push_str(&format!("\n- {}", product.name)),
            }
        }
        if products.len() > max_products {
            summary.push_str(&format!("\n- and {} more", products.len() - max_products));
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use anyhow::bail;
    use async_trait::async_trait;
    use labelplan_types::{EndpointSpecification, InterpretRequest, Interpretation, SystemContext, WorkPlanProgress};
    use serde_json::json;
    use tokio::sync::mpsc::unbounded_channel;
    use tokio_util::sync::CancellationToken;

    use super::*;

    /// Returns queued synthesis responses in order; `None` entries fail.
    struct QueuedSynthesis {
        responses: Mutex<Vec<Option<Synthesis>>>,
        requests: Mutex<Vec<usize>>,
    }

    impl QueuedSynthesis {
        fn new(responses: Vec<Option<Synthesis>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LabelBackend for QueuedSynthesis {
        async fn interpret(&self, _request: &InterpretRequest) -> Result<Interpretation> {
            bail!("not scripted")
        }

        async fn execute_endpoint(&self, _specification: &EndpointSpecification, _cancel: &CancellationToken) -> Result<EndpointResult> {
            bail!("not scripted")
        }

        async fn synthesize(&self, request: &SynthesisRequest) -> Result<Synthesis> {
            self.requests.lock().expect("lock").push(request.executed_endpoints.len());
            let mut responses = self.responses.lock().expect("lock");
            if responses.is_empty() {
                bail!("no response queued");
            }
            match responses.remove(0) {
                Some(synthesis) => Ok(synthesis),
                None => bail!("synthesis backend unavailable"),
            }
        }

        async fn get_context(&self) -> Result<Option<SystemContext>> {
            Ok(None)
        }
    }

    fn response(text: &str) -> Synthesis {
        Synthesis {
            response: text.to_string(),
            is_complete: true,
            ..Synthesis::default()
        }
    }

    fn results(count: usize) -> Vec<EndpointResult> {
        (0..count)
            .map(|index| EndpointResult::new(EndpointSpecification::new("GET", format!("/label/{index}")), 200, json!({ "i": index })))
            .collect()
    }

    fn product(guid: &str, name: &str, labeler: Option<&str>) -> ProductDiscovery {
        ProductDiscovery {
            guid: guid.into(),
            name: name.into(),
            labeler: labeler.map(str::to_string),
            description: None,
        }
    }

    fn sink() -> (ProgressSink, tokio::sync::mpsc::UnboundedReceiver<WorkPlanProgress>) {
        let (tx, rx) = unbounded_channel();
        (ProgressSink::new(tx, Some("conv".into())), rx)
    }

    #[test]
    fn effective_count_prefers_selection_then_products_then_results() {
        assert_eq!(effective_product_count(30, Some(&["a".to_string()]), 40), 1);
        assert_eq!(effective_product_count(30, None, 40), 30);
        assert_eq!(effective_product_count(0, Some(&["a".to_string()]), 40), 40);
    }

    #[test]
    fn data_references_are_capped_and_first_write_wins() {
        let products = [
            product("g1", "Drug A", Some("Acme")),
            product("g2", "Drug A", Some("Acme")),
            product("g3", "Drug B", None),
            product("g4", "Drug C", None),
        ];
        let borrowed: Vec<&ProductDiscovery> = products.iter().collect();

        let references = build_data_references(&borrowed, "https://labels.example.com/", 2);
        assert_eq!(references.len(), 2);
        assert_eq!(references["View Full Label (Drug A - Acme)"], "https://labels.example.com/label/g1");
        assert_eq!(references["View Full Label (Drug B)"], "https://labels.example.com/label/g3");
    }

    #[tokio::test]
    async fn batches_are_joined_with_separator_and_last_metadata_wins() {
        let mut first = response("A");
        first.data_references = Some(IndexMap::from([("first".to_string(), "/label/1".to_string())]));
        first.suggested_follow_ups = Some(vec!["early".into(), "ideas".into()]);
        let mut third = response("C");
        third.data_references = Some(IndexMap::from([("third".to_string(), "/label/3".to_string())]));
        third.suggested_follow_ups = Some(vec!["late".into()]);

        let backend = Arc::new(QueuedSynthesis::new(vec![Some(first), Some(response("B")), Some(third)]));
        let settings = WorkPlanSettings {
            synthesis_batch_threshold: 2,
            synthesis_batch_size: 1,
            ..WorkPlanSettings::default()
        };
        let coordinator = SynthesisCoordinator::new(backend.clone(), &settings);
        let results = results(3);
        let (mut sink, mut rx) = sink();

        let input = SynthesisInput {
            query: "compare",
            results: &results,
            products: &[],
            selection: None,
        };
        let outcome = coordinator.synthesize(input, &mut sink).await.expect("synthesize");

        assert_eq!(outcome.content, "A\n\n---\n\nB\n\n---\n\nC");
        assert_eq!(outcome.batches, 3);
        assert_eq!(outcome.data_references.keys().collect::<Vec<_>>(), vec!["third"]);
        assert_eq!(outcome.suggested_follow_ups, vec!["late".to_string()]);
        assert_eq!(*backend.requests.lock().expect("lock"), vec![1, 1, 1]);

        let mut batch_events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if event.batch_current.is_some() {
                batch_events.push((event.batch_current, event.batch_total, event.partial_content));
            }
        }
        assert_eq!(
            batch_events,
            vec![
                (Some(1), Some(3), Some("A".to_string())),
                (Some(2), Some(3), Some("B".to_string())),
                (Some(3), Some(3), Some("C".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn failed_batches_are_skipped_with_a_warning() {
        let backend = Arc::new(QueuedSynthesis::new(vec![Some(response("A")), None, Some(response("C"))]));
        let settings = WorkPlanSettings {
            synthesis_batch_threshold: 1,
            synthesis_batch_size: 2,
            ..WorkPlanSettings::default()
        };
        let coordinator = SynthesisCoordinator::new(backend, &settings);
        let results = results(6);
        let (mut sink, _rx) = sink();

        let input = SynthesisInput {
            query: "q",
            results: &results,
            products: &[],
            selection: None,
        };
        let outcome = coordinator.synthesize(input, &mut sink).await.expect("synthesize");
        assert_eq!(outcome.content, "A\n\n---\n\nC");
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[tokio::test]
    async fn single_pass_failure_degrades_to_local_summary() {
        let backend = Arc::new(QueuedSynthesis::new(vec![None]));
        let coordinator = SynthesisCoordinator::new(backend, &WorkPlanSettings::default());
        let results = results(1);
        let products = [product("g1", "Drug A", Some("Acme"))];
        let (mut sink, _rx) = sink();

        let input = SynthesisInput {
            query: "aspirin",
            results: &results,
            products: &products,
            selection: None,
        };
        let outcome = coordinator.synthesize(input, &mut sink).await.expect("synthesize");

        assert!(outcome.content.contains("Drug A (Acme)"));
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.data_references["View Full Label (Drug A - Acme)"], "/label/g1");
    }

    #[tokio::test]
    async fn backend_references_are_kept_over_product_links() {
        let mut synthesis = response("Answer");
        synthesis.data_references = Some(IndexMap::from([("Backend".to_string(), "/label/x".to_string())]));
        let backend = Arc::new(QueuedSynthesis::new(vec![Some(synthesis)]));
        let coordinator = SynthesisCoordinator::new(backend, &WorkPlanSettings::default());
        let results = results(1);
        let products = [product("g1", "Drug A", None)];
        let (mut sink, _rx) = sink();

        let input = SynthesisInput {
            query: "q",
            results: &results,
            products: &products,
            selection: None,
        };
        let outcome = coordinator.synthesize(input, &mut sink).await.expect("synthesize");
        assert_eq!(outcome.content, "Answer");
        assert_eq!(outcome.data_references.keys().collect::<Vec<_>>(), vec!["Backend"]);
    }
}
