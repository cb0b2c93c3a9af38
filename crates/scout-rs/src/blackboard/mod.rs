//! Capacity-bounded knowledge store.
//!
//! The blackboard is the only channel of information that survives across
//! loop iterations from the model's perspective. It holds named sections
//! under a strict token budget with a small overflow allowance, and
//! serializes to JSON (for sessions) and Markdown (for humans).

pub mod estimate;
pub mod store;

pub use estimate::estimate_tokens;
pub use store::{Blackboard, Section, UpdateOutcome, DEFAULT_MAX_TOKENS, DEFAULT_OVERFLOW_FACTOR};
