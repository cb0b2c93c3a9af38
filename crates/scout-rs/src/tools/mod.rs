//! Tools the model can invoke during exploration.
//!
//! Four operations: directory listing, file reading, pattern search, and
//! the blackboard write. Dispatch (timing, validation, truncation, history
//! records) lives in [`core`]; the filesystem tools in [`fs`]; the
//! blackboard tool in [`notes`].

pub mod core;
pub mod fs;
pub mod notes;
pub mod spec;

pub use core::{Tool, ToolFuture, ToolRecord, ToolSet};
pub use fs::{FileRead, GrepSearch, ListDir};
pub use notes::{UPDATE_BLACKBOARD_TOOL, UpdateBlackboard};
pub use spec::ToolSpec;

use crate::blackboard::Blackboard;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// The standard exploration tool set: `list_dir`, `file_read`,
/// `grep_search`, and `update_blackboard`, all rooted at `base` and
/// sharing `board`.
pub fn exploration_tool_set(base: impl Into<PathBuf>, board: Arc<Mutex<Blackboard>>) -> ToolSet {
    let base = base.into();
    ToolSet::new()
        .with(ListDir::new(base.clone()))
        .with(FileRead::new(base.clone()))
        .with(GrepSearch::new(base))
        .with(UpdateBlackboard::new(board))
}
