//! Run configuration for the [`Explorer`](super::explorer::Explorer).
//!
//! The overflow factor, completion-gate threshold, and nudge limit are
//! heuristics, not derived quantities — they are exposed as configuration
//! rather than baked in.

use crate::DEFAULT_MODEL;
use crate::blackboard::{DEFAULT_MAX_TOKENS, DEFAULT_OVERFLOW_FACTOR};

/// Default maximum loop iterations.
pub const DEFAULT_MAX_ITERATIONS: u32 = 25;

/// Default per-response token budget.
pub const DEFAULT_RESPONSE_TOKENS: u32 = 4096;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default completion-gate threshold: stop requests below this blackboard
/// utilization get nudged.
pub const DEFAULT_GATE_THRESHOLD: f64 = 0.65;

/// Default maximum number of nudges per run.
pub const DEFAULT_MAX_NUDGES: u32 = 3;

/// Tunables for one exploration run.
#[derive(Debug, Clone)]
pub struct ExplorerConfig {
    /// Model identifier sent to the API.
    pub model: String,
    /// Hard stop after this many iterations (not an error).
    pub max_iterations: u32,
    /// Per-response token budget.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Soft token budget for the blackboard.
    pub blackboard_budget: usize,
    /// Overflow allowance above the soft budget (hard cap multiplier).
    pub overflow_factor: f64,
    /// Utilization below which a stop request gets nudged.
    pub gate_threshold: f64,
    /// Maximum nudges before a stop request is honored regardless.
    pub max_nudges: u32,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_tokens: DEFAULT_RESPONSE_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            blackboard_budget: DEFAULT_MAX_TOKENS,
            overflow_factor: DEFAULT_OVERFLOW_FACTOR,
            gate_threshold: DEFAULT_GATE_THRESHOLD,
            max_nudges: DEFAULT_MAX_NUDGES,
        }
    }
}

impl ExplorerConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = max;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_blackboard_budget(mut self, budget: usize) -> Self {
        self.blackboard_budget = budget;
        self
    }

    pub fn with_overflow_factor(mut self, factor: f64) -> Self {
        self.overflow_factor = factor;
        self
    }

    pub fn with_gate_threshold(mut self, threshold: f64) -> Self {
        self.gate_threshold = threshold;
        self
    }

    pub fn with_max_nudges(mut self, max: u32) -> Self {
        self.max_nudges = max;
        self
    }
}
