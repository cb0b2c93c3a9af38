//! Token estimation for blackboard admission control.
//!
//! Deliberately crude: one token per four characters of trimmed text,
//! rounded up. Not a real tokenizer — the point is a fast, synchronous,
//! dependency-free approximation that admission control can re-run on
//! every write. The estimate is stable (same input, same output) and
//! monotonic in trimmed length, which makes re-estimation of unchanged
//! content idempotent.

/// Approximate the token count of `text` as `ceil(trimmed_chars / 4)`.
pub fn estimate_tokens(text: &str) -> usize {
    text.trim().chars().count().div_ceil(4)
}
