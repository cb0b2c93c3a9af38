//! The exploration loop and its collaborators.
//!
//! [`Explorer`](explorer::Explorer) drives iterations against the model;
//! [`profile`] supplies the mission bundle, [`prompt`] regenerates the
//! system prompt each iteration, [`events`] carries observations out to
//! the caller, and [`config`] holds the tunables.

pub mod config;
pub mod events;
pub mod explorer;
pub mod profile;
pub mod prompt;

pub use config::ExplorerConfig;
pub use events::{AgentEvent, CompositeEventHandler, EventHandler, FnEventHandler, LoggingHandler, NoopHandler};
pub use explorer::{Explorer, RunFailure, RunReport, RunStats};
pub use profile::{ExplorationProfile, ProfileRegistry, SuggestedSection};
pub use prompt::{SystemPromptBuilder, build_system_prompt};
