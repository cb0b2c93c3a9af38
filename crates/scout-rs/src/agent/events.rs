//! Events and handlers for the [`Explorer`](super::explorer::Explorer).
//!
//! The loop communicates with callers through [`AgentEvent`] variants
//! covering the run lifecycle — iteration start through tool execution to
//! completion. Callers implement [`EventHandler`] to observe them; the
//! loop never knows how events are rendered.
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or fire-and-forget runs |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures for simple callbacks |
//! | [`CompositeEventHandler`] | Compose multiple handlers in order |

use crate::tools::ToolRecord;
use tracing::{debug, info, warn};

// ── Events ─────────────────────────────────────────────────────────

/// Events emitted by the explorer during a run. All payloads are borrowed;
/// handlers that need to keep data must clone it.
#[derive(Debug)]
pub enum AgentEvent<'a> {
    /// A new iteration is starting.
    IterationStart {
        iteration: u32,
        max_iterations: u32,
        /// Blackboard utilization against the soft budget, `[0.0, 1.2]`.
        utilization: f64,
    },
    /// The model returned plain-text content (informational only).
    Thinking(&'a str),
    /// The model requested tool calls this iteration.
    ToolCallsReceived { iteration: u32, count: usize },
    /// A single tool is about to be executed.
    ToolExecuting { name: &'a str, arguments: &'a str },
    /// A single tool finished executing.
    ToolResult(&'a ToolRecord),
    /// A blackboard write succeeded.
    BlackboardUpdated {
        total_tokens: usize,
        remaining_tokens: usize,
    },
    /// Token usage reported by the API for this iteration.
    TokenUsage {
        prompt_tokens: u32,
        completion_tokens: u32,
    },
    /// The model tried to stop early and was nudged to continue.
    Nudged { count: u32, utilization: f64 },
    /// The run finished naturally.
    Finished,
    /// The run hit the iteration limit without finishing.
    IterationLimitReached { max_iterations: u32 },
    /// The run is about to fail with a model/transport error.
    RunFailed { error: &'a str },
}

/// Handler for explorer events.
///
/// All events are informational; the default implementation ignores
/// everything.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &AgentEvent<'_>) {
        let _ = event;
    }
}

/// A no-op event handler.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
pub struct FnEventHandler<F>(F)
where
    F: Fn(&AgentEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&AgentEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&AgentEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &AgentEvent<'_>) {
        (self.0)(event)
    }
}

/// An event handler that delegates to multiple inner handlers, in
/// registration order.
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Add a handler to the chain (builder pattern).
    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Conditionally add a handler to the chain.
    pub fn with_if(self, condition: bool, handler: impl EventHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }
}

impl Default for CompositeEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &AgentEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

/// Structured logging via `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &AgentEvent<'_>) {
        match event {
            AgentEvent::IterationStart {
                iteration,
                max_iterations,
                utilization,
            } => info!(
                "Iteration {iteration}/{max_iterations} (blackboard {:.0}% full)",
                utilization * 100.0
            ),
            AgentEvent::Thinking(text) => debug!("[thinking] {text}"),
            AgentEvent::ToolCallsReceived { iteration, count } => {
                debug!("Iteration {iteration}: {count} tool call(s)")
            }
            AgentEvent::ToolExecuting { name, arguments } => {
                debug!("Executing {name} {arguments}")
            }
            AgentEvent::ToolResult(record) => info!("{}", record.summary()),
            AgentEvent::BlackboardUpdated {
                total_tokens,
                remaining_tokens,
            } => info!("Blackboard: {total_tokens} tokens used, {remaining_tokens} remaining"),
            AgentEvent::TokenUsage {
                prompt_tokens,
                completion_tokens,
            } => debug!("Usage: {prompt_tokens} prompt, {completion_tokens} completion"),
            AgentEvent::Nudged { count, utilization } => info!(
                "Nudged model to continue (nudge {count}, blackboard {:.0}% full)",
                utilization * 100.0
            ),
            AgentEvent::Finished => info!("Exploration finished"),
            AgentEvent::IterationLimitReached { max_iterations } => {
                warn!("Iteration limit reached ({max_iterations})")
            }
            AgentEvent::RunFailed { error } => warn!("Run failing: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn fn_handler_receives_events() {
        let seen = Mutex::new(Vec::new());
        let handler = FnEventHandler::new(|event| {
            if let AgentEvent::Thinking(text) = event {
                seen.lock().unwrap().push(text.to_string());
            }
        });
        handler.on_event(&AgentEvent::Thinking("hello"));
        handler.on_event(&AgentEvent::Finished);
        assert_eq!(*seen.lock().unwrap(), vec!["hello"]);
    }

    #[test]
    fn composite_dispatches_in_order() {
        let order = std::sync::Arc::new(Mutex::new(Vec::new()));
        let (a, b) = (order.clone(), order.clone());
        let composite = CompositeEventHandler::new()
            .with(FnEventHandler::new(move |_| a.lock().unwrap().push("first")))
            .with(FnEventHandler::new(move |_| b.lock().unwrap().push("second")))
            .with_if(false, NoopHandler);
        composite.on_event(&AgentEvent::Finished);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    /// Collects the `message` field of every tracing event.
    struct MessageCollector(std::sync::Arc<Mutex<Vec<String>>>);

    impl tracing::Subscriber for MessageCollector {
        fn enabled(&self, _: &tracing::Metadata<'_>) -> bool {
            true
        }
        fn new_span(&self, _: &tracing::span::Attributes<'_>) -> tracing::span::Id {
            tracing::span::Id::from_u64(1)
        }
        fn record(&self, _: &tracing::span::Id, _: &tracing::span::Record<'_>) {}
        fn record_follows_from(&self, _: &tracing::span::Id, _: &tracing::span::Id) {}
        fn event(&self, event: &tracing::Event<'_>) {
            struct Message(Option<String>);
            impl tracing::field::Visit for Message {
                fn record_debug(
                    &mut self,
                    field: &tracing::field::Field,
                    value: &dyn std::fmt::Debug,
                ) {
                    if field.name() == "message" {
                        self.0 = Some(format!("{value:?}"));
                    }
                }
            }
            let mut message = Message(None);
            event.record(&mut message);
            if let Some(text) = message.0 {
                self.0.lock().unwrap().push(text);
            }
        }
        fn enter(&self, _: &tracing::span::Id) {}
        fn exit(&self, _: &tracing::span::Id) {}
    }

    #[test]
    fn logging_handler_reports_iteration_as_emitted() {
        let lines = std::sync::Arc::new(Mutex::new(Vec::new()));
        tracing::subscriber::with_default(MessageCollector(lines.clone()), || {
            LoggingHandler.on_event(&AgentEvent::IterationStart {
                iteration: 1,
                max_iterations: 25,
                utilization: 0.0,
            });
            LoggingHandler.on_event(&AgentEvent::ToolCallsReceived {
                iteration: 25,
                count: 2,
            });
        });
        let lines = lines.lock().unwrap();
        assert!(lines[0].starts_with("Iteration 1/25"), "got: {}", lines[0]);
        assert!(lines[1].starts_with("Iteration 25:"), "got: {}", lines[1]);
    }
}
