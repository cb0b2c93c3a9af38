//! Convenience re-exports for common `scout-rs` types.
//!
//! Meant to be glob-imported when embedding the explorer:
//!
//! ```ignore
//! use scout_rs::prelude::*;
//! ```
//!
//! This pulls in the types needed for the vast majority of programs: the
//! [`OpenRouterClient`], [`Message`] constructors, [`Explorer`] + config,
//! [`Blackboard`], [`Tool`] trait + [`ToolSet`], profiles, event handlers,
//! and the persistence layers. Specialized types (prompt builder internals,
//! individual tool structs) are intentionally excluded — import those from
//! their modules directly when needed.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{ChatRequest, Message, OpenRouterClient, ToolDef, json_schema_for};

// ── Blackboard ──────────────────────────────────────────────────────
pub use crate::blackboard::{Blackboard, Section, UpdateOutcome, estimate_tokens};

// ── Agent runtime ───────────────────────────────────────────────────
pub use crate::agent::{
    AgentEvent, CompositeEventHandler, EventHandler, ExplorationProfile, Explorer, ExplorerConfig,
    FnEventHandler, LoggingHandler, NoopHandler, ProfileRegistry, RunFailure, RunReport, RunStats,
};

// ── Tools ───────────────────────────────────────────────────────────
pub use crate::tools::spec::ToolSpec;
pub use crate::tools::{Tool, ToolFuture, ToolRecord, ToolSet, exploration_tool_set};

// ── Persistence ─────────────────────────────────────────────────────
pub use crate::output::{ArtifactWriter, generate_summary, placeholder_summary};
pub use crate::session::{SessionStore, SessionSummary};
