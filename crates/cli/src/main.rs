use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use futures_util::StreamExt;
use labelplan_engine::{LabelPlanConfig, WorkPlanExecutor, default_config_path, load_config_from_path};
use labelplan_types::{WorkPlanPhase, WorkPlanProgress, WorkPlanRequest};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "labelplan", version)]
#[command(about = "Answer natural-language drug label questions through multi-step API work plans")]
struct Cli {
    /// Path to the configuration file (defaults to $LABELPLAN_CONFIG_PATH or the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a work plan for a question and stream its progress
    Ask(AskArgs),
    /// Print the backend's system context
    Context,
    /// Show the effective configuration
    Config {
        /// Print only the configuration file path
        #[arg(long)]
        path: bool,
    },
}

#[derive(Args)]
struct AskArgs {
    /// The question to answer
    query: String,

    /// Continue an existing conversation
    #[arg(long)]
    conversation_id: Option<String>,

    /// Product GUID confirmed after a checkpoint pause (repeatable)
    #[arg(long = "select", value_name = "GUID")]
    selected: Vec<String>,

    /// Print every progress event as a JSON line
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    let outcome = match cli.command {
        Command::Ask(args) => ask(&config_path, args).await,
        Command::Context => context(&config_path).await,
        Command::Config { path } => show_config(&config_path, path),
    };

    match outcome {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {}", labelplan_util::redact_sensitive(&format!("{error:#}")));
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load(config_path: &Path) -> Result<LabelPlanConfig> {
    load_config_from_path(config_path).with_context(|| format!("failed to load configuration from {}", config_path.display()))
}

async fn ask(config_path: &Path, args: AskArgs) -> Result<ExitCode> {
    let config = load(config_path)?;
    let executor = WorkPlanExecutor::from_config(&config)?;

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received; cancelling work plan");
            interrupt.cancel();
        }
    });

    let request = WorkPlanRequest {
        query: args.query,
        conversation_id: args.conversation_id,
        selected_product_guids: (!args.selected.is_empty()).then_some(args.selected),
    };
    debug!(query = %request.query, selected = ?request.selected_product_guids, "starting work plan");

    let mut events = Box::pin(executor.stream(request, cancel));
    let mut exit_code = ExitCode::SUCCESS;
    while let Some(event) = events.next().await {
        if event.phase == WorkPlanPhase::Error {
            exit_code = ExitCode::FAILURE;
        }
        if args.json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            render_event(&event);
        }
    }
    Ok(exit_code)
}

fn render_event(event: &WorkPlanProgress) {
    match event.phase {
        WorkPlanPhase::Complete => render_complete(event),
        WorkPlanPhase::AwaitingCheckpoint => render_checkpoint(event),
        WorkPlanPhase::Error => eprintln!("error: {}", event.error.as_deref().unwrap_or(&event.message)),
        _ if event.total_steps > 0 => eprintln!("[{}/{}] {}", event.current_step, event.total_steps, event.message),
        _ => eprintln!("{}", event.message),
    }
}

fn render_complete(event: &WorkPlanProgress) {
    for warning in &event.warnings {
        eprintln!("warning: {warning}");
    }
    println!("{}", event.content.as_deref().unwrap_or_default());

    if !event.data_references.is_empty() {
        println!("\nReferences:");
        for (name, link) in &event.data_references {
            println!("  {name}: {link}");
        }
    }
    if !event.suggested_follow_ups.is_empty() {
        println!("\nYou could also ask:");
        for follow_up in &event.suggested_follow_ups {
            println!("  - {follow_up}");
        }
    }
    if let Some(conversation_id) = &event.conversation_id {
        eprintln!("\nconversation: {conversation_id}");
    }
}

fn render_checkpoint(event: &WorkPlanProgress) {
    println!("{}\n", event.message);
    for product in &event.products {
        match &product.labeler {
            Some(labeler) => println!("  {}  {} ({labeler})", product.guid, product.name),
            None => println!("  {}  {}", product.guid, product.name),
        }
    }
    let conversation = event
        .conversation_id
        .as_deref()
        .map(|conversation_id| format!(" --conversation-id {conversation_id}"))
        .unwrap_or_default();
    println!("\nRe-run the same question with{conversation} and one --select <GUID> per product to continue.");
}

async fn context(config_path: &Path) -> Result<ExitCode> {
    let config = load(config_path)?;
    let executor = WorkPlanExecutor::from_config(&config)?;
    match executor.system_context().await? {
        Some(context) => println!("{}", serde_json::to_string_pretty(&context)?),
        None => println!("No system context available."),
    }
    Ok(ExitCode::SUCCESS)
}

fn show_config(config_path: &Path, path_only: bool) -> Result<ExitCode> {
    if path_only {
        println!("{}", config_path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let mut config = load(config_path)?;
    if config.api.token.is_some() {
        config.api.token = Some("[REDACTED]".to_string());
    }
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(ExitCode::SUCCESS)
}
