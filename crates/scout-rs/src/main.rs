//! Explore a codebase with an LLM agent and persist what it learns.
//!
//! Reads the API key from the `OPENROUTER_KEY` environment variable.
//!
//! # Examples
//!
//! ```sh
//! # Explore a project with the default codebase profile
//! scout /path/to/project
//!
//! # Security-focused exploration with a bigger blackboard
//! scout /path/to/project --profile security --budget 8000
//!
//! # Show the most recent exploration for a target instead of running
//! scout /path/to/project --show-last
//! ```

use clap::Parser;
use scout_rs::prelude::*;
use std::path::PathBuf;
use std::process;
use std::sync::{Arc, Mutex};

/// Explore a codebase with an LLM agent and persist what it learns.
///
/// Reads the API key from the OPENROUTER_KEY environment variable.
#[derive(Parser)]
#[command(name = "scout")]
struct Cli {
    /// Directory to explore
    target: PathBuf,

    /// Exploration profile (codebase, onboarding, security)
    #[arg(long, default_value = "codebase")]
    profile: String,

    /// Show the most recent exploration for this target instead of running
    #[arg(long)]
    show_last: bool,

    /// Maximum loop iterations
    #[arg(long, default_value_t = 25)]
    max_iterations: u32,

    /// Model to use for all LLM calls
    #[arg(long, default_value = scout_rs::DEFAULT_MODEL)]
    model: String,

    /// Blackboard token budget
    #[arg(long, default_value_t = 4000)]
    budget: usize,

    /// Directory for session files
    #[arg(long, default_value = ".scout/sessions")]
    sessions_dir: PathBuf,

    /// Directory for run artifacts
    #[arg(long, default_value = ".scout/runs")]
    output_dir: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Prints run progress to stdout. Tracing goes to stderr for diagnostics;
/// this is the human-facing narration.
struct CliReporter;

impl EventHandler for CliReporter {
    fn on_event(&self, event: &AgentEvent<'_>) {
        match event {
            AgentEvent::IterationStart {
                iteration,
                max_iterations,
                utilization,
            } => println!(
                "\n── Iteration {iteration}/{max_iterations} (blackboard {:.0}% full) ──",
                utilization * 100.0
            ),
            AgentEvent::Thinking(text) => println!("  {}", first_line(text)),
            AgentEvent::ToolResult(record) => println!("  {}", record.summary()),
            AgentEvent::Nudged { count, .. } => {
                println!("  Model tried to stop early; nudged to continue (nudge {count})")
            }
            AgentEvent::Finished => println!("\nExploration complete."),
            AgentEvent::IterationLimitReached { max_iterations } => {
                println!("\nStopped at the {max_iterations}-iteration limit.")
            }
            _ => {}
        }
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: &Cli) -> Result<(), String> {
    let target = cli
        .target
        .canonicalize()
        .map_err(|e| format!("invalid target path '{}': {e}", cli.target.display()))?;
    if !target.is_dir() {
        return Err(format!("target '{}' is not a directory", target.display()));
    }
    let target_str = target.display().to_string();

    let sessions = SessionStore::new(&cli.sessions_dir)?;

    if cli.show_last {
        return match sessions.find_latest_for_target(&target_str)? {
            Some(board) => {
                println!("{}", board.to_markdown());
                Ok(())
            }
            None => Err(format!("no previous exploration found for {target_str}")),
        };
    }

    let registry = ProfileRegistry::with_defaults();
    let profile = registry.get(&cli.profile).ok_or_else(|| {
        format!(
            "unknown profile '{}' (available: {})",
            cli.profile,
            registry.names().join(", ")
        )
    })?;

    let api_key =
        std::env::var("OPENROUTER_KEY").map_err(|_| "OPENROUTER_KEY not set".to_string())?;
    let client = OpenRouterClient::new(api_key)?;

    let config = ExplorerConfig::default()
        .with_model(&cli.model)
        .with_max_iterations(cli.max_iterations)
        .with_blackboard_budget(cli.budget);

    let board = Arc::new(Mutex::new(
        Blackboard::new(&target_str, config.blackboard_budget)
            .with_overflow_factor(config.overflow_factor),
    ));
    let tools = exploration_tool_set(&target, board.clone());
    let writer = ArtifactWriter::new(&cli.output_dir)?;

    println!(
        "Exploring {} with profile '{}' ({})",
        target_str, profile.name, cli.model
    );

    let handler = CompositeEventHandler::new()
        .with(CliReporter)
        .with(LoggingHandler);
    let outcome = Explorer::new(&client, &tools, board.clone(), profile, config)
        .with_event_handler(&handler)
        .run()
        .await;

    let final_board = board
        .lock()
        .map_err(|_| "blackboard lock poisoned".to_string())?
        .clone();

    match outcome {
        Ok(report) => {
            if let Err(e) = sessions.save(&final_board) {
                tracing::warn!("Failed to save session: {e}");
            }
            let summary = match generate_summary(&client, &cli.model, &report.blackboard_markdown)
                .await
            {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!("Summary generation failed: {e}");
                    placeholder_summary(&report.blackboard_markdown, &e)
                }
            };
            let run_dir = writer.persist_run(
                &report,
                &final_board,
                &cli.model,
                &profile.name,
                &summary,
                None,
            )?;
            println!("\n{summary}");
            println!(
                "\n{} iterations, {} tool calls, {} prompt + {} completion tokens, {:.1}s",
                report.stats.iterations,
                report.stats.tool_calls,
                report.stats.prompt_tokens,
                report.stats.completion_tokens,
                report.stats.duration_ms() as f64 / 1000.0
            );
            println!("Artifacts: {}", run_dir.display());
            Ok(())
        }
        Err(failure) => {
            // Best-effort persistence of the partial run. A failure to save
            // error artifacts is logged and swallowed so the original error
            // is still the one surfaced.
            if let Err(e) = sessions.save(&final_board) {
                tracing::warn!("Failed to save session after run failure: {e}");
            }
            let summary =
                placeholder_summary(&failure.report.blackboard_markdown, &failure.error);
            if let Err(e) = writer.persist_run(
                &failure.report,
                &final_board,
                &cli.model,
                &profile.name,
                &summary,
                Some(&failure.error),
            ) {
                tracing::warn!("Failed to persist failed-run artifacts: {e}");
            }
            Err(failure.error)
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
