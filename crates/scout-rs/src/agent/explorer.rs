//! The exploration loop.
//!
//! [`Explorer::run()`] drives iterations against the model: build a fresh
//! system prompt, send the rolling window, dispatch any requested tool
//! calls sequentially, and decide whether the model is done. Two corrective
//! mechanisms guard the blackboard-as-only-memory design:
//!
//! - the **completion gate** — a stop request while the blackboard is
//!   under-utilized gets a synthetic "keep going" user message instead of
//!   terminating (up to a nudge limit);
//! - the **stall warning** — consecutive iterations without a successful
//!   `update_blackboard` call escalate a warning inside the system prompt
//!   (rendered by [`super::prompt`], counted here).
//!
//! The model only ever sees its last exchange plus the regenerated system
//! prompt; the full transcript is archived separately for post-hoc
//! inspection and never sent back to the model.

use super::config::ExplorerConfig;
use super::events::{AgentEvent, EventHandler, NoopHandler};
use super::profile::ExplorationProfile;
use super::prompt::build_system_prompt;
use crate::blackboard::Blackboard;
use crate::tools::core::{ToolRecord, ToolSet};
use crate::tools::notes::UPDATE_BLACKBOARD_TOOL;
use crate::{ChatRequest, Message, OpenRouterClient, UsageInfo};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// How many one-line tool summaries are injected into the system prompt.
const HISTORY_WINDOW: usize = 15;

// ── Run accounting ─────────────────────────────────────────────────

/// Cumulative statistics for one run. Serialized into the run's
/// `metadata.json` artifact.
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    pub iterations: u32,
    pub tool_calls: u32,
    pub nudges: u32,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl RunStats {
    fn begin() -> Self {
        let now = Utc::now();
        Self {
            iterations: 0,
            tool_calls: 0,
            nudges: 0,
            prompt_tokens: 0,
            completion_tokens: 0,
            cache_creation_tokens: 0,
            cache_read_tokens: 0,
            started_at: now,
            ended_at: now,
        }
    }

    fn record_usage(&mut self, usage: &UsageInfo) {
        self.prompt_tokens += u64::from(usage.prompt_tokens.unwrap_or(0));
        self.completion_tokens += u64::from(usage.completion_tokens.unwrap_or(0));
        self.cache_creation_tokens += u64::from(usage.cache_creation_input_tokens.unwrap_or(0));
        self.cache_read_tokens += u64::from(usage.cache_read_input_tokens.unwrap_or(0));
    }

    /// Wall-clock duration. Reflects an incomplete run on failure.
    pub fn duration_ms(&self) -> u64 {
        (self.ended_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }
}

/// Everything a finished (or failed) run produced.
#[derive(Debug)]
pub struct RunReport {
    pub stats: RunStats,
    /// Full archived transcript, excluding the per-iteration system
    /// prompts (those are regenerated, not conversation).
    pub transcript: Vec<Message>,
    /// Every tool call in execution order.
    pub tool_history: Vec<ToolRecord>,
    /// Final blackboard snapshot, rendered as Markdown.
    pub blackboard_markdown: String,
    /// `true` if the model stopped on its own; `false` if the iteration
    /// limit cut the run short.
    pub completed_naturally: bool,
}

/// A failed run still carries its partial report so the output layer can
/// persist whatever exists.
#[derive(Debug)]
pub struct RunFailure {
    pub error: String,
    pub report: RunReport,
}

impl std::fmt::Display for RunFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

// ── Completion gate ────────────────────────────────────────────────

/// Whether a stop request should be deferred with a nudge.
///
/// Pure so the gate property is testable without a model: under the
/// threshold with nudges remaining → nudge; at or over the threshold, or
/// out of nudges → honor the stop.
pub fn gate_decision(utilization: f64, nudges_issued: u32, config: &ExplorerConfig) -> bool {
    utilization < config.gate_threshold && nudges_issued < config.max_nudges
}

fn nudge_message(board: &Blackboard) -> String {
    format!(
        "Your blackboard is only {:.0}% full ({} of {} tokens). That is not \
         enough recorded knowledge to stop. Keep exploring: look at parts of \
         the target you have not covered yet, and persist every finding with \
         update_blackboard before stopping again.",
        board.utilization() * 100.0,
        board.total_tokens(),
        board.max_tokens(),
    )
}

// ── Explorer ───────────────────────────────────────────────────────

/// The exploration loop driver.
///
/// Borrows the client and tool set; owns nothing but configuration. The
/// blackboard is shared with the tool set through `Arc<Mutex<_>>` even
/// though dispatch is strictly sequential — the mutex is for `Send + Sync`
/// plumbing, not real contention.
///
/// ```ignore
/// let report = Explorer::new(&client, &tools, board, profile, config)
///     .with_event_handler(&LoggingHandler)
///     .run()
///     .await
///     .map_err(|f| f.error)?;
/// ```
pub struct Explorer<'a> {
    client: &'a OpenRouterClient,
    tools: &'a ToolSet,
    board: Arc<Mutex<Blackboard>>,
    profile: &'a ExplorationProfile,
    config: ExplorerConfig,
    event_handler: &'a dyn EventHandler,
}

impl<'a> Explorer<'a> {
    pub fn new(
        client: &'a OpenRouterClient,
        tools: &'a ToolSet,
        board: Arc<Mutex<Blackboard>>,
        profile: &'a ExplorationProfile,
        config: ExplorerConfig,
    ) -> Self {
        Self {
            client,
            tools,
            board,
            profile,
            config,
            event_handler: &NoopHandler,
        }
    }

    /// Attach an event handler.
    pub fn with_event_handler(mut self, handler: &'a dyn EventHandler) -> Self {
        self.event_handler = handler;
        self
    }

    fn lock_board(&self) -> Result<MutexGuard<'_, Blackboard>, String> {
        self.board
            .lock()
            .map_err(|_| "blackboard lock poisoned".to_string())
    }

    /// Run the exploration loop to completion.
    ///
    /// Returns the full [`RunReport`] on success. Model/transport errors
    /// are not retried; they end the run with a [`RunFailure`] that still
    /// carries the partial report for best-effort persistence. Hitting the
    /// iteration limit is a normal outcome, not an error.
    pub async fn run(self) -> Result<RunReport, RunFailure> {
        let mut stats = RunStats::begin();
        let mut transcript: Vec<Message> = Vec::new();
        let mut tool_history: Vec<ToolRecord> = Vec::new();
        let mut history_lines: Vec<String> = Vec::new();
        let mut iterations_since_write: u32 = 0;
        let mut completed_naturally = false;

        let target = match self.lock_board() {
            Ok(board) => board.target_path().to_string(),
            Err(e) => return Err(self.fail(e, stats, transcript, tool_history, false)),
        };

        info!(
            "Exploration started: target={}, profile={}, model={}, max_iterations={}",
            target, self.profile.name, self.config.model, self.config.max_iterations
        );

        let initial = Message::user(self.profile.initial_message(&target));
        transcript.push(initial.clone());
        let mut window: Vec<Message> = vec![initial];

        let tool_defs = self.tools.definitions();

        for iteration in 0..self.config.max_iterations {
            stats.iterations = iteration + 1;

            let (prompt, utilization) = match self.lock_board() {
                Ok(board) => {
                    let history_summary = recent_history(&history_lines);
                    (
                        build_system_prompt(
                            &board,
                            self.profile,
                            self.tools,
                            &history_summary,
                            iterations_since_write,
                            &self.config,
                        ),
                        board.utilization(),
                    )
                }
                Err(e) => {
                    return Err(self.fail(e, stats, transcript, tool_history, false));
                }
            };

            self.event_handler.on_event(&AgentEvent::IterationStart {
                iteration: iteration + 1,
                max_iterations: self.config.max_iterations,
                utilization,
            });

            let mut messages = vec![Message::system(&prompt)];
            messages.extend(window.iter().cloned());

            let body = ChatRequest {
                model: self.config.model.clone(),
                messages,
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
                tools: Some(tool_defs.clone()),
            };

            let completion = match self.client.chat(&body).await {
                Ok(c) => c,
                Err(e) => {
                    return Err(self.fail(e, stats, transcript, tool_history, false));
                }
            };

            if let Some(ref usage) = completion.usage {
                stats.record_usage(usage);
                self.event_handler.on_event(&AgentEvent::TokenUsage {
                    prompt_tokens: usage.prompt_tokens.unwrap_or(0),
                    completion_tokens: usage.completion_tokens.unwrap_or(0),
                });
            }

            if let Some(ref content) = completion.content
                && !content.trim().is_empty()
            {
                self.event_handler.on_event(&AgentEvent::Thinking(content));
            }

            let assistant =
                Message::assistant_response(completion.content, completion.tool_calls.clone());
            transcript.push(assistant.clone());

            let natural_stop = matches!(
                completion.finish_reason.as_deref(),
                Some("stop") | Some("end_turn")
            );
            let stopping = completion.tool_calls.is_empty() || natural_stop;

            if stopping {
                if gate_decision(utilization, stats.nudges, &self.config) {
                    stats.nudges += 1;
                    iterations_since_write += 1;
                    debug!(
                        "Completion gate: model stopped at {:.0}% utilization, nudging ({}/{})",
                        utilization * 100.0,
                        stats.nudges,
                        self.config.max_nudges
                    );
                    let nudge = match self.lock_board() {
                        Ok(board) => Message::user(nudge_message(&board)),
                        Err(e) => {
                            return Err(self.fail(e, stats, transcript, tool_history, false));
                        }
                    };
                    transcript.push(nudge.clone());
                    window = vec![assistant, nudge];
                    self.event_handler.on_event(&AgentEvent::Nudged {
                        count: stats.nudges,
                        utilization,
                    });
                    continue;
                }
                completed_naturally = true;
                self.event_handler.on_event(&AgentEvent::Finished);
                break;
            }

            self.event_handler.on_event(&AgentEvent::ToolCallsReceived {
                iteration: iteration + 1,
                count: completion.tool_calls.len(),
            });

            // Sequential dispatch, in the order requested: a later call may
            // depend on an earlier one's blackboard write being visible.
            let mut results: Vec<Message> = Vec::new();
            let mut wrote_blackboard = false;
            for call in &completion.tool_calls {
                self.event_handler.on_event(&AgentEvent::ToolExecuting {
                    name: &call.function.name,
                    arguments: &call.function.arguments,
                });

                let record = self
                    .tools
                    .execute(iteration + 1, &call.function.name, &call.function.arguments)
                    .await;
                stats.tool_calls += 1;

                self.event_handler.on_event(&AgentEvent::ToolResult(&record));

                if record.name == UPDATE_BLACKBOARD_TOOL && record.success {
                    wrote_blackboard = true;
                    if let Ok(board) = self.lock_board() {
                        self.event_handler.on_event(&AgentEvent::BlackboardUpdated {
                            total_tokens: board.total_tokens(),
                            remaining_tokens: board.remaining_tokens(),
                        });
                    }
                }

                results.push(Message::tool_result(&call.id, record.output.clone()));
                history_lines.push(record.summary());
                tool_history.push(record);
            }

            if wrote_blackboard {
                iterations_since_write = 0;
            } else {
                iterations_since_write += 1;
            }

            transcript.extend(results.iter().cloned());
            window = std::iter::once(assistant).chain(results).collect();
        }

        if !completed_naturally {
            warn!(
                "Iteration limit reached after {} iterations",
                stats.iterations
            );
            self.event_handler.on_event(&AgentEvent::IterationLimitReached {
                max_iterations: self.config.max_iterations,
            });
        }

        stats.ended_at = Utc::now();
        info!(
            "Exploration ended: {} iterations, {} tool calls, {} nudges, {}ms",
            stats.iterations,
            stats.tool_calls,
            stats.nudges,
            stats.duration_ms()
        );
        Ok(self.report(stats, transcript, tool_history, completed_naturally))
    }

    /// Finalize partial statistics and wrap the error with the report so
    /// the output layer can persist what exists.
    fn fail(
        &self,
        error: String,
        mut stats: RunStats,
        transcript: Vec<Message>,
        tool_history: Vec<ToolRecord>,
        completed_naturally: bool,
    ) -> RunFailure {
        stats.ended_at = Utc::now();
        self.event_handler
            .on_event(&AgentEvent::RunFailed { error: &error });
        RunFailure {
            error,
            report: self.report(stats, transcript, tool_history, completed_naturally),
        }
    }

    fn report(
        &self,
        stats: RunStats,
        transcript: Vec<Message>,
        tool_history: Vec<ToolRecord>,
        completed_naturally: bool,
    ) -> RunReport {
        let blackboard_markdown = self
            .lock_board()
            .map(|board| board.to_markdown())
            .unwrap_or_default();
        RunReport {
            stats,
            transcript,
            tool_history,
            blackboard_markdown,
            completed_naturally,
        }
    }
}

/// Join the last [`HISTORY_WINDOW`] tool summaries for prompt injection.
fn recent_history(lines: &[String]) -> String {
    let start = lines.len().saturating_sub(HISTORY_WINDOW);
    lines.get(start..).unwrap_or_default().join("\n")
}
