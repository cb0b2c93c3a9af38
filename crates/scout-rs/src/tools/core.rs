//! Tool abstraction and dispatch for the exploration loop.
//!
//! The [`Tool`] trait defines the interface every tool implements: a
//! definition (name, description, JSON Schema parameters) and an async
//! `execute` returning `Result<String, String>`. Tools are collected into
//! a [`ToolSet`] which handles dispatch: argument validation, timing,
//! result truncation, and conversion of every outcome — including unknown
//! tool names and invalid arguments — into a [`ToolRecord`]. Failures
//! never cross this boundary as panics; the model sees an error-prefixed
//! result string and can adapt.

use crate::ToolDef;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, info, trace};

/// Maximum size (in bytes) for tool output before truncation.
pub const DEFAULT_MAX_RESULT_BYTES: usize = 30_000;

/// Boxed future returned by [`Tool::execute`].
///
/// Type alias to keep trait signatures and implementations readable.
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>>;

// ── Tool trait ─────────────────────────────────────────────────────

/// A tool the model can invoke via function-calling.
///
/// Implementors provide a definition ([`Tool::definition`]) describing the
/// tool's name, description, and JSON Schema parameters, and an async
/// [`Tool::execute`] that receives the raw JSON arguments string.
///
/// `execute` returns `Err` for any failure (missing path, read error,
/// invalid pattern, capacity exceeded); the dispatcher converts it into a
/// failed [`ToolRecord`] whose output carries the error text.
///
/// Uses a boxed future so the trait is dyn-compatible (object-safe).
pub trait Tool: Send + Sync {
    /// The tool definition sent to the LLM API.
    fn definition(&self) -> ToolDef;

    /// Execute the tool with the given raw JSON arguments string.
    fn execute(&self, arguments: &str) -> ToolFuture<'_>;

    /// The tool's name (convenience — delegates to definition).
    fn name(&self) -> String {
        self.definition().function.name.clone()
    }
}

// ── Tool call records ──────────────────────────────────────────────

/// Full record of one tool invocation. Appended to the run's history and
/// written out once at end of run.
#[derive(Serialize, Clone, Debug)]
pub struct ToolRecord {
    pub timestamp: DateTime<Utc>,
    pub iteration: u32,
    pub name: String,
    pub input: String,
    pub success: bool,
    pub output: String,
    pub duration_ms: u64,
}

impl ToolRecord {
    /// One compact, fixed-format line for cheap inclusion in future
    /// prompts: `✓ list_dir(src) → Found 12 items`.
    pub fn summary(&self) -> String {
        let mark = if self.success { '✓' } else { '✗' };
        format!(
            "{mark} {}({}) → {}",
            self.name,
            primary_argument(&self.input),
            digest(&self.output)
        )
    }
}

/// Pick the most informative argument for the one-line summary.
fn primary_argument(input: &str) -> String {
    let parsed: serde_json::Value = match serde_json::from_str(input) {
        Ok(v) => v,
        Err(_) => return String::new(),
    };
    for key in ["path", "pattern", "section"] {
        if let Some(v) = parsed.get(key).and_then(|v| v.as_str()) {
            return v.to_string();
        }
    }
    String::new()
}

/// First line of the output, clipped for prompt injection.
fn digest(output: &str) -> String {
    let first = output.lines().next().unwrap_or_default().trim();
    if first.chars().count() > 60 {
        let clipped: String = first.chars().take(60).collect();
        format!("{clipped}...")
    } else {
        first.to_string()
    }
}

// ── ToolSet ────────────────────────────────────────────────────────

/// A collection of tools dispatched by name.
///
/// Registration order is preserved so the tool catalogue renders
/// deterministically in prompts.
pub struct ToolSet {
    tools: Vec<Box<dyn Tool>>,
    max_result_bytes: usize,
    /// Whether to validate tool arguments against JSON Schema before execution.
    validate_args: bool,
}

impl fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSet")
            .field("tools", &self.names())
            .field("max_result_bytes", &self.max_result_bytes)
            .finish()
    }
}

impl ToolSet {
    /// Create an empty tool set with argument validation enabled.
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            max_result_bytes: DEFAULT_MAX_RESULT_BYTES,
            validate_args: true,
        }
    }

    /// Set the maximum result size in bytes before truncation.
    pub fn with_max_result_bytes(mut self, max: usize) -> Self {
        self.max_result_bytes = max;
        self
    }

    /// Enable or disable JSON Schema argument validation.
    pub fn with_arg_validation(mut self, enabled: bool) -> Self {
        self.validate_args = enabled;
        self
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name();
        self.tools.retain(|t| t.name() != name);
        self.tools.push(Box::new(tool));
    }

    /// Register a tool (builder pattern).
    pub fn with(mut self, tool: impl Tool + 'static) -> Self {
        self.register(tool);
        self
    }

    /// All tool definitions for the LLM API, in registration order.
    pub fn definitions(&self) -> Vec<ToolDef> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// Registered tool names, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool call by name, producing a full [`ToolRecord`].
    ///
    /// Unknown tool names and schema-validation failures become failed
    /// records, not errors — the record's output is what gets fed back to
    /// the model either way.
    pub async fn execute(&self, iteration: u32, name: &str, arguments: &str) -> ToolRecord {
        let timestamp = Utc::now();
        let start = std::time::Instant::now();

        let result = match self.tools.iter().find(|t| t.name() == name) {
            None => Err(format!("unknown tool '{name}'")),
            Some(tool) => {
                let validation = if self.validate_args {
                    validate_tool_arguments(tool.as_ref(), arguments)
                } else {
                    None
                };
                match validation {
                    Some(error) => Err(error),
                    None => {
                        log_tool_call(name, arguments);
                        tool.execute(arguments).await
                    }
                }
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let (success, output) = match result {
            Ok(out) => (true, truncate_result(out, self.max_result_bytes)),
            Err(e) => (false, format!("Error: {e}")),
        };

        debug!(
            "Tool {name} {} in {duration_ms}ms ({} bytes)",
            if success { "completed" } else { "failed" },
            output.len()
        );
        trace!("Tool {name} result preview: {}", preview(&output, 300));

        ToolRecord {
            timestamp,
            iteration,
            name: name.to_string(),
            input: arguments.to_string(),
            success,
            output,
            duration_ms,
        }
    }
}

impl Default for ToolSet {
    fn default() -> Self {
        Self::new()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Validate tool arguments against the tool's declared JSON Schema.
///
/// Returns `None` if valid, or `Some(error_string)` if validation fails.
/// The error string is formatted for the LLM to understand and self-correct.
pub fn validate_tool_arguments(tool: &dyn Tool, arguments: &str) -> Option<String> {
    let args_value: serde_json::Value = match serde_json::from_str(arguments) {
        Ok(v) => v,
        Err(e) => {
            return Some(format!(
                "invalid JSON arguments for tool '{}': {e}. \
                 Please provide valid JSON matching the tool's parameter schema.",
                tool.name()
            ));
        }
    };

    let schema = tool.definition().function.parameters;

    let validator = match jsonschema::validator_for(&schema) {
        Ok(v) => v,
        Err(_) => return None, // If schema itself is invalid, skip validation.
    };

    let errors: Vec<String> = validator
        .iter_errors(&args_value)
        .map(|e| format!("  - {}: {e}", e.instance_path()))
        .collect();

    if errors.is_empty() {
        None
    } else {
        Some(format!(
            "argument validation failed for tool '{}':\n{}\n\
             Please fix the arguments and try again.",
            tool.name(),
            errors.join("\n")
        ))
    }
}

/// Log a tool call at INFO level with a truncated preview of arguments.
pub fn log_tool_call(name: &str, arguments: &str) {
    let args_preview = preview(arguments, 120);
    info!(
        "[tool] {}({args_preview}{})",
        name,
        if arguments.len() > 120 { "..." } else { "" }
    );
    trace!("[tool] {name} arguments: {arguments}");
}

fn preview(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Truncate a string to at most `max` bytes, appending a notice if trimmed.
pub fn truncate_result(s: String, max: usize) -> String {
    if s.len() > max {
        let mut cut = max;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        let head = s.get(..cut).unwrap_or_default();
        format!("{head}...\n[truncated: {} bytes total]", s.len())
    } else {
        s
    }
}

/// Parse raw JSON arguments into a typed struct.
///
/// The error string is suitable for returning directly from
/// [`Tool::execute`] — the LLM will see it and self-correct.
pub fn parse_tool_args<T: serde::de::DeserializeOwned>(arguments: &str) -> Result<T, String> {
    serde_json::from_str(arguments).map_err(|e| {
        format!(
            "invalid tool arguments: {e}. \
             Please provide valid JSON matching the tool's parameter schema."
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_schema_for;
    use schemars::JsonSchema;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    struct EchoArgs {
        text: String,
    }

    struct EchoTool;

    impl Tool for EchoTool {
        fn definition(&self) -> ToolDef {
            ToolDef::new("echo", "Echo the input text.", json_schema_for::<EchoArgs>())
        }

        fn execute(&self, arguments: &str) -> ToolFuture<'_> {
            let arguments = arguments.to_string();
            Box::pin(async move {
                let args: EchoArgs = parse_tool_args(&arguments)?;
                Ok(args.text)
            })
        }
    }

    struct FailTool;

    impl Tool for FailTool {
        fn definition(&self) -> ToolDef {
            ToolDef::new(
                "fail",
                "Always fails.",
                serde_json::json!({"type": "object", "properties": {}}),
            )
        }

        fn execute(&self, _arguments: &str) -> ToolFuture<'_> {
            Box::pin(async move { Err("deliberate failure".to_string()) })
        }
    }

    #[tokio::test]
    async fn dispatch_records_success() {
        let tools = ToolSet::new().with(EchoTool);
        let record = tools.execute(3, "echo", r#"{"text": "hello"}"#).await;
        assert!(record.success);
        assert_eq!(record.output, "hello");
        assert_eq!(record.iteration, 3);
        assert!(record.summary().starts_with("✓ echo("));
    }

    #[tokio::test]
    async fn dispatch_records_failure_without_panicking() {
        let tools = ToolSet::new().with(FailTool);
        let record = tools.execute(0, "fail", "{}").await;
        assert!(!record.success);
        assert_eq!(record.output, "Error: deliberate failure");
        assert!(record.summary().starts_with("✗ fail("));
    }

    #[tokio::test]
    async fn unknown_tool_is_a_failed_record() {
        let tools = ToolSet::new().with(EchoTool);
        let record = tools.execute(0, "nope", "{}").await;
        assert!(!record.success);
        assert!(record.output.contains("unknown tool 'nope'"));
    }

    #[tokio::test]
    async fn invalid_args_fail_validation() {
        let tools = ToolSet::new().with(EchoTool);
        let record = tools.execute(0, "echo", r#"{"wrong": 1}"#).await;
        assert!(!record.success);
        assert!(record.output.contains("validation failed"));
    }

    #[test]
    fn registration_order_is_preserved() {
        let tools = ToolSet::new().with(EchoTool).with(FailTool);
        assert_eq!(tools.names(), vec!["echo", "fail"]);
    }

    #[test]
    fn truncate_appends_notice() {
        let long = "x".repeat(100);
        let out = truncate_result(long, 10);
        assert!(out.contains("[truncated: 100 bytes total]"));
    }

    #[test]
    fn summary_digest_clips_first_line() {
        let record = ToolRecord {
            timestamp: Utc::now(),
            iteration: 0,
            name: "list_dir".into(),
            input: r#"{"path": "src"}"#.into(),
            success: true,
            output: format!("{}\nmore lines", "a".repeat(100)),
            duration_ms: 1,
        };
        let summary = record.summary();
        assert!(summary.contains("list_dir(src)"));
        assert!(summary.ends_with("..."));
    }
}
