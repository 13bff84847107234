//! CLI command definitions for symposium.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use futures::StreamExt;
use serde_json::json;
use tracing::{info, warn};

use crate::agents::{AgentCapability, CompletionAgent, PersonaTemplate, RetrievalAgent};
use crate::config::{DebateConfig, ServiceConfig, DEFAULT_MAX_ITERATIONS};
use crate::debate::{
    AllParticipantsSpoke, DebateEvent, DebateOrchestrator, DebateOutcome, ModelSelection,
    ModelTermination, NeverStop, Participant, RotationSelection, SelectionStrategy,
    TerminationStrategy, Utterance,
};
use crate::llm::{LiteLlmClient, LlmProvider};
use crate::metrics::{export_metrics, init_metrics};
use crate::resources::{AssistantsClient, AssistantsConfig, ResourceBackends, SourceDocument};

/// Opening prompt used when none is given.
pub const DEFAULT_PROMPT: &str = "How can we ensure that AI benefits all of humanity?";

const RESET: &str = "\u{1b}[0m";
const PALETTE: [&str; 6] = [
    "\u{1b}[34m", // blue
    "\u{1b}[35m", // magenta
    "\u{1b}[32m", // green
    "\u{1b}[33m", // yellow
    "\u{1b}[36m", // cyan
    "\u{1b}[31m", // red
];

/// Stage a moderated debate between LLM-backed participants.
#[derive(Parser)]
#[command(name = "symposium")]
#[command(about = "Stage a moderated debate between LLM-backed participants")]
#[command(version)]
#[command(
    long_about = "symposium runs a turn-based debate between personas such as Socrates, Plato and Aristotle.\n\nOne persona may answer from a source document through an Assistants-compatible API; the rest use chat completions.\n\nExample usage:\n  symposium debate --document Plato.pdf --prompt \"What is justice?\""
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run one debate and print it as it unfolds.
    Debate(Box<DebateArgs>),

    /// List the built-in personas.
    Personas,
}

/// How the next speaker is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SelectionMode {
    /// Fixed rotation in `--order`.
    Rotation,
    /// Ask the model who should speak next.
    Model,
}

/// How the end of the debate is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TerminationMode {
    /// Ask the model whether the debate is complete.
    Model,
    /// Stop once every participant has spoken.
    AllSpoke,
    /// Run until the iteration cap.
    Never,
}

/// Arguments for `symposium debate`.
#[derive(Parser, Debug)]
pub struct DebateArgs {
    /// Opening prompt.
    #[arg(short, long, default_value = DEFAULT_PROMPT)]
    pub prompt: String,

    /// Source document for the retrieval-backed persona.
    #[arg(short, long)]
    pub document: Option<PathBuf>,

    /// Persona YAML files; replaces the built-in personas when given.
    #[arg(long = "persona")]
    pub personas: Vec<PathBuf>,

    /// Speaking order for rotation (comma-separated). Defaults to persona order.
    #[arg(long, value_delimiter = ',')]
    pub order: Vec<String>,

    /// Participants after whom termination is evaluated. Defaults to the
    /// first speaker.
    #[arg(long = "terminator")]
    pub terminators: Vec<String>,

    /// Hard cap on turns.
    #[arg(short = 'n', long, default_value_t = DEFAULT_MAX_ITERATIONS)]
    pub max_iterations: usize,

    #[arg(long, value_enum, default_value = "rotation")]
    pub selection: SelectionMode,

    #[arg(long, value_enum, default_value = "model")]
    pub termination: TerminationMode,

    /// Run retrieval personas as plain completion agents (no document needed).
    #[arg(long)]
    pub stateless: bool,

    /// Print the transcript as JSON instead of coloured text.
    #[arg(long)]
    pub json: bool,

    /// Print Prometheus metrics after the debate.
    #[arg(long)]
    pub print_metrics: bool,

    /// Model for all participants and strategies.
    #[arg(long, env = "SYMPOSIUM_MODEL")]
    pub model: Option<String>,

    /// OpenAI-compatible API base URL.
    #[arg(long, env = "SYMPOSIUM_API_BASE")]
    pub api_base: Option<String>,

    /// API key.
    #[arg(long, env = "SYMPOSIUM_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with already-parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Debate(args) => run_debate_command(*args).await,
        Commands::Personas => run_personas_command(),
    }
}

fn run_personas_command() -> anyhow::Result<()> {
    let personas = PersonaTemplate::builtin().context("built-in personas are invalid")?;
    for persona in personas {
        let kind = if persona.retrieval {
            "retrieval"
        } else {
            "completion"
        };
        println!(
            "{:<10} {:<12} {:<10} {}",
            persona.name, persona.role, kind, persona.description
        );
    }
    Ok(())
}

// ============================================================================
// Debate Command Implementation
// ============================================================================

/// Speaking order for the debate: `requested`, or the persona order when empty.
fn resolve_order(
    requested: &[String],
    personas: &[PersonaTemplate],
) -> anyhow::Result<Vec<String>> {
    if requested.is_empty() {
        return Ok(personas.iter().map(|p| p.name.clone()).collect());
    }
    let unknown: Vec<&str> = requested
        .iter()
        .filter(|name| !personas.iter().any(|p| &p.name == *name))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        let known: Vec<&str> = personas.iter().map(|p| p.name.as_str()).collect();
        anyhow::bail!(
            "--order names unknown participant(s) {}; debating: {}",
            unknown.join(", "),
            known.join(", ")
        );
    }
    Ok(requested.to_vec())
}

async fn run_debate_command(args: DebateArgs) -> anyhow::Result<()> {
    let service = service_config(&args)?;
    let personas = load_personas(&args.personas)?;
    let order = resolve_order(&args.order, &personas)?;

    if args.print_metrics {
        init_metrics().context("failed to initialize metrics")?;
    }

    let provider: Arc<dyn LlmProvider> = Arc::new(LiteLlmClient::from_config(&service));

    let retrieval: Vec<&PersonaTemplate> = personas
        .iter()
        .filter(|p| p.retrieval && !args.stateless)
        .collect();
    if retrieval.len() > 1 {
        anyhow::bail!(
            "only one retrieval persona is supported per debate, got {}",
            retrieval.len()
        );
    }

    let mut builder = DebateOrchestrator::builder();
    let assistants = match retrieval.first() {
        Some(persona) => {
            let path = args.document.as_ref().with_context(|| {
                format!(
                    "persona '{}' answers from a document: pass --document or --stateless",
                    persona.name
                )
            })?;
            let document = SourceDocument::from_path(path)
                .await
                .with_context(|| format!("failed to read document {}", path.display()))?;

            let client = Arc::new(AssistantsClient::new(
                AssistantsConfig::new(
                    service.api_base.clone(),
                    service.api_key.clone(),
                    service.model.clone(),
                )
                .with_assistant(persona.name.clone(), persona.instructions.clone())
                .with_run_timeout(service.invocation_timeout)
                .with_request_timeout(service.request_timeout),
            ));
            builder = builder
                .document(document)
                .backends(ResourceBackends::from_shared(client.clone()));
            Some(client)
        }
        None => None,
    };

    let participants: Vec<Participant> = personas
        .iter()
        .map(|persona| {
            let capability: Arc<dyn AgentCapability> = match (&assistants, persona.retrieval) {
                (Some(client), true) if !args.stateless => Arc::new(
                    RetrievalAgent::new(client.clone()).with_timeout(service.invocation_timeout),
                ),
                _ => Arc::new(
                    CompletionAgent::from_persona(provider.clone(), service.model.clone(), persona)
                        .with_timeout(service.invocation_timeout),
                ),
            };
            Participant::new(persona.name.clone(), persona.role.clone(), capability)
        })
        .collect();

    let selection: Arc<dyn SelectionStrategy> = match args.selection {
        SelectionMode::Rotation => Arc::new(RotationSelection::round_robin(order.clone())?),
        SelectionMode::Model => Arc::new(ModelSelection::new(provider.clone(), service.model.clone())),
    };

    let termination: Arc<dyn TerminationStrategy> = match args.termination {
        TerminationMode::Model => {
            Arc::new(ModelTermination::new(provider.clone(), service.model.clone()))
        }
        TerminationMode::AllSpoke => Arc::new(AllParticipantsSpoke::new(order.clone())),
        TerminationMode::Never => Arc::new(NeverStop),
    };

    let mut config = DebateConfig::default().with_max_iterations(args.max_iterations);
    if args.terminators.is_empty() {
        if let Some(first) = order.first() {
            config = config.with_terminator(first.clone());
        }
    } else {
        for name in &args.terminators {
            config = config.with_terminator(name.clone());
        }
    }

    let orchestrator = builder
        .participants(participants)
        .selection_arc(selection)
        .termination_arc(termination)
        .config(config)
        .build()?;

    let palette = colour_map(&order);
    let mut stream = orchestrator.run(args.prompt.clone());
    info!(session = %stream.session_id(), "Debate session created");

    if !args.json {
        println!("{}", args.prompt);
    }

    let mut utterances: Vec<Utterance> = Vec::new();
    let mut outcome: Option<DebateOutcome> = None;
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);
    loop {
        tokio::select! {
            event = stream.next() => match event {
                Some(DebateEvent::Utterance(utterance)) => {
                    if !args.json {
                        print_utterance(&utterance, &palette);
                    }
                    utterances.push(utterance);
                }
                Some(DebateEvent::Ended(end)) => outcome = Some(end),
                None => break,
            },
            _ = &mut interrupt => {
                warn!("Interrupted, releasing session resources");
                let errors = stream.cancel().await;
                for e in &errors {
                    warn!(error = %e, "Teardown error");
                }
                anyhow::bail!("debate cancelled after {} turns", utterances.len());
            }
        }
    }

    if args.json {
        let report = json!({
            "prompt": args.prompt,
            "utterances": utterances,
            "outcome": outcome.as_ref().map(outcome_json),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    if args.print_metrics {
        print!("{}", export_metrics());
    }

    match outcome {
        Some(DebateOutcome::Failed { error, .. }) => {
            Err(anyhow::Error::new(error).context("debate failed"))
        }
        Some(DebateOutcome::Completed { .. }) => Ok(()),
        None => anyhow::bail!("debate ended without an outcome"),
    }
}

fn service_config(args: &DebateArgs) -> anyhow::Result<ServiceConfig> {
    let overrides = [
        ("SYMPOSIUM_MODEL", args.model.as_ref()),
        ("SYMPOSIUM_API_BASE", args.api_base.as_ref()),
        ("SYMPOSIUM_API_KEY", args.api_key.as_ref()),
    ];
    ServiceConfig::from_lookup(|key| {
        overrides
            .iter()
            .find(|(k, _)| *k == key)
            .and_then(|(_, v)| v.cloned())
            .or_else(|| std::env::var(key).ok())
    })
    .context("invalid service configuration (set SYMPOSIUM_MODEL or pass --model)")
}

fn load_personas(paths: &[PathBuf]) -> anyhow::Result<Vec<PersonaTemplate>> {
    if paths.is_empty() {
        return PersonaTemplate::builtin().context("built-in personas are invalid");
    }
    paths
        .iter()
        .map(|path| {
            PersonaTemplate::from_path(path)
                .with_context(|| format!("failed to load persona {}", path.display()))
        })
        .collect()
}

fn colour_map(order: &[String]) -> Vec<(String, &'static str)> {
    order
        .iter()
        .enumerate()
        .map(|(i, name)| (name.clone(), PALETTE[i % PALETTE.len()]))
        .collect()
}

fn print_utterance(utterance: &Utterance, palette: &[(String, &'static str)]) {
    let colour = palette
        .iter()
        .find(|(name, _)| *name == utterance.author)
        .map(|(_, c)| *c)
        .unwrap_or(RESET);
    println!();
    println!(
        "{}[{}]: '{}'{}",
        colour, utterance.author, utterance.content, RESET
    );
    println!();
}

fn outcome_json(outcome: &DebateOutcome) -> serde_json::Value {
    let teardown: Vec<String> = outcome
        .teardown_errors()
        .iter()
        .map(ToString::to_string)
        .collect();
    match outcome {
        DebateOutcome::Completed {
            reason, iterations, ..
        } => json!({
            "status": "completed",
            "reason": reason,
            "iterations": iterations,
            "teardown_errors": teardown,
        }),
        DebateOutcome::Failed {
            error, iterations, ..
        } => json!({
            "status": "failed",
            "error_kind": error.kind(),
            "error": error.to_string(),
            "iterations": iterations,
            "teardown_errors": teardown,
        }),
    }
}
