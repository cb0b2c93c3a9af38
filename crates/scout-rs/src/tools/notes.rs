//! The blackboard-write tool.
//!
//! `update_blackboard` is the only tool that mutates shared state. It
//! holds the run's blackboard behind a mutex so the tool set stays
//! `Send + Sync`; contention never actually occurs because dispatch is
//! strictly sequential.

use crate::ToolDef;
use crate::blackboard::Blackboard;
use crate::tools::core::{Tool, ToolFuture, parse_tool_args};
use crate::tools::spec::ToolSpec;
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Name of the blackboard-write tool. The explorer resets its stall
/// counter when a call with this name succeeds.
pub const UPDATE_BLACKBOARD_TOOL: &str = "update_blackboard";

/// Typed arguments for `update_blackboard`.
#[derive(Deserialize, JsonSchema)]
pub struct UpdateBlackboardArgs {
    /// Section name. Choose your own or use one of the suggested sections.
    pub section: String,
    /// The finding to record. In append mode this is added to the section;
    /// in replace mode it becomes the section's full new content.
    pub content: String,
    /// Replace the section instead of appending (default false).
    #[serde(default)]
    pub replace: bool,
}

/// Persist a finding into the shared blackboard.
pub struct UpdateBlackboard {
    board: Arc<Mutex<Blackboard>>,
}

impl UpdateBlackboard {
    pub fn new(board: Arc<Mutex<Blackboard>>) -> Self {
        Self { board }
    }
}

impl Tool for UpdateBlackboard {
    fn definition(&self) -> ToolDef {
        ToolSpec::builder(UPDATE_BLACKBOARD_TOOL)
            .purpose("Record a finding in your persistent blackboard")
            .when_to_use(
                "Immediately after learning something worth keeping — the \
                 blackboard is the only memory that survives between iterations",
            )
            .when_not_to_use(
                "For raw tool output. Condense findings first; the blackboard \
                 has a strict token budget",
            )
            .parameters_for::<UpdateBlackboardArgs>()
            .example(
                "update_blackboard(section='architecture', content='Workspace with 3 crates...')",
                "Appends the note and reports the new token totals",
            )
            .output_format("Confirmation with current/remaining token counts")
            .to_tool_def()
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let arguments = arguments.to_string();
        Box::pin(async move {
            let args: UpdateBlackboardArgs = parse_tool_args(&arguments)?;
            let mut board = self
                .board
                .lock()
                .map_err(|_| "blackboard lock poisoned".to_string())?;
            let outcome = board.update_section(&args.section, &args.content, args.replace);
            debug!(
                "Blackboard write to '{}': success={}, total={}",
                args.section,
                outcome.success,
                board.total_tokens()
            );
            if outcome.success {
                Ok(outcome.message)
            } else {
                Err(outcome.message)
            }
        })
    }
}
