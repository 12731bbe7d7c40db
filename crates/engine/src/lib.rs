//! # Labelplan Engine
//!
//! Turns a natural-language label query into a multi-step work plan, executes
//! it against the label API, and streams progress until a synthesized answer
//! (or a checkpoint pause) is reached.
//!
//! ## Pipeline
//!
//! 1. **Interpret**: the backend plans endpoint calls grouped into steps.
//! 2. **Discover**: the first step runs; variables and products are harvested.
//! 3. **Checkpoint**: large discoveries pause until the caller selects products.
//! 4. **Execute**: later steps run in order with variables substituted and
//!    multi-valued variables fanned out.
//! 5. **Synthesize**: results are summarized in one pass or in batches.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use futures_util::StreamExt;
//! use labelplan_engine::{WorkPlanExecutor, load_config};
//! use labelplan_types::WorkPlanRequest;
//! use tokio_util::sync::CancellationToken;
//!
//! let config = load_config()?;
//! let executor = WorkPlanExecutor::from_config(&config)?;
//! let mut events = Box::pin(executor.stream(WorkPlanRequest::new("aspirin boxed warning"), CancellationToken::new()));
//! while let Some(event) = events.next().await {
//!     println!("{}: {}", event.phase.as_str(), event.message);
//! }
//! ```
//!
//! ## Architecture
//!
//! - **`config`**: configuration file loading, interpolation, and validation
//! - **`backend`**: the [`LabelBackend`] seam and its HTTP implementation
//! - **`invoker`**: bounded-parallel endpoint execution
//! - **`bindings`**: variable extraction, substitution, and expansion
//! - **`products`**: product discovery over heterogeneous payloads
//! - **`checkpoint`**: confirmation gate for large discoveries
//! - **`synthesis`**: single-pass and batched synthesis
//! - **`executor`**: the pipeline driver

pub mod backend;
pub mod bindings;
pub mod checkpoint;
pub mod config;
pub mod events;
pub mod executor;
pub mod invoker;
pub mod products;
pub mod synthesis;

pub use backend::{HttpLabelBackend, LabelBackend};
pub use config::{ApiConfig, ConfigError, LabelPlanConfig, WorkPlanSettings, default_config_path, load_config, load_config_from_path};
pub use events::ProgressSink;
pub use executor::{CANCELLED_MESSAGE, WorkPlanExecutor};
pub use invoker::{EndpointInvoker, STATUS_CANCELLED, STATUS_INVOCATION_ERROR, STATUS_TIMEOUT};
pub use products::extract_products;
pub use synthesis::{BATCH_SEPARATOR, SynthesisCoordinator, SynthesisInput, SynthesisOutcome};
