//! The blackboard store: named sections under a hard token cap.
//!
//! Admission control is all-or-nothing: a write that would push the total
//! past `floor(max_tokens * overflow_factor)` is rejected without mutating
//! anything. The soft budget (`max_tokens`) is what utilization and
//! remaining-token metrics are measured against; the 20% overflow band
//! above it is accepted by writes but invisible to those metrics, leaving
//! headroom for late findings.

use crate::blackboard::estimate::estimate_tokens;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Default soft token budget for a fresh blackboard.
pub const DEFAULT_MAX_TOKENS: usize = 4000;

/// Default overflow allowance above the soft budget.
pub const DEFAULT_OVERFLOW_FACTOR: f64 = 1.2;

const CONTEXT_HEADER: &str = "=== BLACKBOARD STATE (your persistent memory) ===";
const CONTEXT_FOOTER: &str = "=== END BLACKBOARD STATE ===";

/// Generate a unique session id.
pub fn generate_session_id() -> String {
    let ts = std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    // Use a counter to handle sub-nanosecond calls.
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("bb-{ts:x}-{count:04x}")
}

/// A named, independently-sized unit of blackboard content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub content: String,
    /// Recomputed from `content` on every write, never mutated directly.
    pub token_count: usize,
    pub updated_at: DateTime<Utc>,
}

/// Result of an [`Blackboard::update_section`] call.
#[derive(Clone, Debug)]
pub struct UpdateOutcome {
    pub success: bool,
    pub message: String,
}

/// Capacity-bounded, named-section knowledge store.
///
/// Sections are kept in insertion order. A section whose content is empty
/// is treated as absent for enumeration and display, but its key persists
/// until [`remove_section`](Blackboard::remove_section).
#[derive(Clone, Debug)]
pub struct Blackboard {
    id: String,
    target_path: String,
    sections: Vec<Section>,
    max_tokens: usize,
    overflow_factor: f64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Blackboard {
    /// Create an empty blackboard for the given target path.
    pub fn new(target_path: impl Into<String>, max_tokens: usize) -> Self {
        let now = Utc::now();
        Self {
            id: generate_session_id(),
            target_path: target_path.into(),
            sections: Vec::new(),
            max_tokens,
            overflow_factor: DEFAULT_OVERFLOW_FACTOR,
            created_at: now,
            updated_at: now,
        }
    }

    /// Override the overflow allowance above the soft budget.
    pub fn with_overflow_factor(mut self, factor: f64) -> Self {
        self.overflow_factor = factor;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn target_path(&self) -> &str {
        &self.target_path
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// The absolute admission limit: `floor(max_tokens * overflow_factor)`.
    pub fn hard_cap(&self) -> usize {
        (self.max_tokens as f64 * self.overflow_factor).floor() as usize
    }

    /// Sum of all section token counts (empty sections count zero).
    pub fn total_tokens(&self) -> usize {
        self.sections.iter().map(|s| s.token_count).sum()
    }

    /// Tokens left against the *soft* budget, clamped at zero.
    ///
    /// This deliberately ignores the overflow band: remaining can read 0
    /// while writes up to the hard cap are still accepted.
    pub fn remaining_tokens(&self) -> usize {
        self.max_tokens.saturating_sub(self.total_tokens())
    }

    /// Fraction of the soft budget in use, in `[0.0, overflow_factor]`.
    pub fn utilization(&self) -> f64 {
        if self.max_tokens == 0 {
            return 0.0;
        }
        self.total_tokens() as f64 / self.max_tokens as f64
    }

    /// Append to or replace a named section.
    ///
    /// In append mode `content` is a delta, concatenated onto the existing
    /// content with a blank-line separator; in replace mode it is the full
    /// new value. The write is rejected atomically if the resulting grand
    /// total would exceed the hard cap.
    pub fn update_section(&mut self, name: &str, content: &str, replace: bool) -> UpdateOutcome {
        let existing = self.sections.iter().position(|s| s.name == name);

        let candidate = if replace {
            content.to_string()
        } else {
            match existing.map(|i| &self.sections[i]) {
                Some(s) if !s.content.is_empty() => format!("{}\n\n{}", s.content, content),
                _ => content.to_string(),
            }
        };

        let new_tokens = estimate_tokens(&candidate);
        let other_tokens: usize = self
            .sections
            .iter()
            .filter(|s| s.name != name)
            .map(|s| s.token_count)
            .sum();
        let new_total = other_tokens + new_tokens;
        let cap = self.hard_cap();

        if new_total > cap {
            let overflow = new_total - cap;
            debug!(
                "Rejected write to section '{}': {} tokens over the {}-token cap",
                name, overflow, cap
            );
            return UpdateOutcome {
                success: false,
                message: format!(
                    "Update rejected: writing section '{name}' would exceed the blackboard's \
                     {cap}-token capacity by {overflow} tokens. Condense or replace existing \
                     sections instead of appending."
                ),
            };
        }

        let now = Utc::now();
        match existing {
            Some(i) => {
                self.sections[i].content = candidate;
                self.sections[i].token_count = new_tokens;
                self.sections[i].updated_at = now;
            }
            None => self.sections.push(Section {
                name: name.to_string(),
                content: candidate,
                token_count: new_tokens,
                updated_at: now,
            }),
        }
        self.updated_at = now;

        let verb = if replace { "replaced" } else { "updated" };
        UpdateOutcome {
            success: true,
            message: format!(
                "Section '{name}' {verb} ({new_tokens} tokens). Blackboard at {new_total}/{} \
                 tokens, {} remaining.",
                self.max_tokens,
                self.remaining_tokens()
            ),
        }
    }

    /// Content of a section, or the empty string if absent.
    pub fn get_section(&self, name: &str) -> String {
        self.sections
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.content.clone())
            .unwrap_or_default()
    }

    /// Delete a section entirely. Returns whether it existed.
    pub fn remove_section(&mut self, name: &str) -> bool {
        let before = self.sections.len();
        self.sections.retain(|s| s.name != name);
        let removed = self.sections.len() != before;
        if removed {
            self.updated_at = Utc::now();
        }
        removed
    }

    /// Non-empty sections in insertion order.
    pub fn sections(&self) -> Vec<&Section> {
        self.sections
            .iter()
            .filter(|s| !s.content.is_empty())
            .collect()
    }

    /// Names of non-empty sections in insertion order.
    pub fn section_names(&self) -> Vec<&str> {
        self.sections
            .iter()
            .filter(|s| !s.content.is_empty())
            .map(|s| s.name.as_str())
            .collect()
    }

    /// Render every non-empty section for re-injection into a model call:
    /// upper-cased bracketed headers, insertion order, sentinel-wrapped.
    pub fn all_sections_for_context(&self) -> String {
        let mut out = String::from(CONTEXT_HEADER);
        for section in self.sections() {
            out.push_str("\n\n[");
            out.push_str(&section.name.to_uppercase());
            out.push_str("]\n");
            out.push_str(&section.content);
        }
        out.push_str("\n\n");
        out.push_str(CONTEXT_FOOTER);
        out
    }

    /// Human-readable Markdown rendering of the blackboard.
    pub fn to_markdown(&self) -> String {
        let mut out = format!(
            "# Exploration Notes: {}\n\n_Last updated: {}_\n",
            self.target_path,
            self.updated_at.to_rfc3339()
        );
        for section in self.sections() {
            out.push_str(&format!("\n## {}\n\n{}\n", section.name, section.content));
        }
        out
    }

    /// Full-fidelity JSON serialization, including timestamps.
    pub fn to_json(&self) -> Value {
        let mut sections = Map::new();
        for s in &self.sections {
            sections.insert(
                s.name.clone(),
                json!({
                    "name": s.name,
                    "content": s.content,
                    "tokenCount": s.token_count,
                    "updatedAt": s.updated_at.to_rfc3339(),
                }),
            );
        }
        json!({
            "id": self.id,
            "targetPath": self.target_path,
            "sections": sections,
            "totalTokens": self.total_tokens(),
            "maxTokens": self.max_tokens,
            "createdAt": self.created_at.to_rfc3339(),
            "updatedAt": self.updated_at.to_rfc3339(),
        })
    }

    /// Reconstruct a blackboard from its [`to_json`](Blackboard::to_json)
    /// form. Sections whose stored content is empty are skipped.
    pub fn from_json(data: &Value) -> Result<Self, String> {
        let id = data
            .get("id")
            .and_then(Value::as_str)
            .ok_or("blackboard JSON missing 'id'")?
            .to_string();
        let target_path = data
            .get("targetPath")
            .and_then(Value::as_str)
            .ok_or("blackboard JSON missing 'targetPath'")?
            .to_string();
        let max_tokens = data
            .get("maxTokens")
            .and_then(Value::as_u64)
            .ok_or("blackboard JSON missing 'maxTokens'")? as usize;
        let created_at = parse_timestamp(data, "createdAt")?;
        let updated_at = parse_timestamp(data, "updatedAt")?;

        let mut sections = Vec::new();
        if let Some(map) = data.get("sections").and_then(Value::as_object) {
            for (name, entry) in map {
                let content = entry
                    .get("content")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if content.is_empty() {
                    continue;
                }
                let token_count = entry
                    .get("tokenCount")
                    .and_then(Value::as_u64)
                    .map(|n| n as usize)
                    .unwrap_or_else(|| estimate_tokens(content));
                let updated_at = parse_timestamp(entry, "updatedAt")?;
                sections.push(Section {
                    name: name.clone(),
                    content: content.to_string(),
                    token_count,
                    updated_at,
                });
            }
        }

        Ok(Self {
            id,
            target_path,
            sections,
            max_tokens,
            overflow_factor: DEFAULT_OVERFLOW_FACTOR,
            created_at,
            updated_at,
        })
    }

    /// Construct a pre-populated blackboard from a name → content map, in
    /// replace mode for every entry. All-or-nothing: if any entry would
    /// breach the hard cap, the whole construction fails with an aggregate
    /// error naming every failing section.
    pub fn seed(
        target_path: impl Into<String>,
        entries: impl IntoIterator<Item = (String, String)>,
        max_tokens: Option<usize>,
    ) -> Result<Self, String> {
        let mut board = Blackboard::new(target_path, max_tokens.unwrap_or(DEFAULT_MAX_TOKENS));
        let mut failures = Vec::new();
        for (name, content) in entries {
            let outcome = board.update_section(&name, &content, true);
            if !outcome.success {
                failures.push(format!("'{name}': {}", outcome.message));
            }
        }
        if failures.is_empty() {
            Ok(board)
        } else {
            Err(format!(
                "Blackboard seeding failed for {} section(s): {}",
                failures.len(),
                failures.join("; ")
            ))
        }
    }
}

fn parse_timestamp(data: &Value, key: &str) -> Result<DateTime<Utc>, String> {
    let raw = data
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("blackboard JSON missing '{key}'"))?;
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp in '{key}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_write_totals_match_estimate() {
        let mut board = Blackboard::new("/tmp/project", DEFAULT_MAX_TOKENS);
        let outcome = board.update_section("overview", "Project X", true);
        assert!(outcome.success);
        assert_eq!(board.total_tokens(), estimate_tokens("Project X"));
    }

    #[test]
    fn append_accumulates_with_blank_line() {
        let mut board = Blackboard::new("/tmp/project", 1000);
        board.update_section("notes", "a", false);
        board.update_section("notes", "b", false);
        let content = board.get_section("notes");
        assert_eq!(content, "a\n\nb");
    }

    #[test]
    fn replace_is_idempotent() {
        let mut board = Blackboard::new("/tmp/project", 1000);
        board.update_section("notes", "same content", true);
        let tokens_once = board.total_tokens();
        let content_once = board.get_section("notes");
        board.update_section("notes", "same content", true);
        assert_eq!(board.total_tokens(), tokens_once);
        assert_eq!(board.get_section("notes"), content_once);
    }

    #[test]
    fn overflow_write_is_rejected_atomically() {
        let mut board = Blackboard::new("/tmp/project", 100);
        // Hard cap is 120 tokens; 4 chars/token.
        board.update_section("a", &"x".repeat(400), true);
        let total_before = board.total_tokens();
        let outcome = board.update_section("b", &"y".repeat(200), true);
        assert!(!outcome.success);
        assert!(outcome.message.contains("exceed"));
        assert_eq!(board.total_tokens(), total_before);
        assert_eq!(board.get_section("b"), "");
    }

    #[test]
    fn capacity_invariant_holds_across_sequences() {
        let mut board = Blackboard::new("/tmp/project", 50);
        let cap = board.hard_cap();
        for i in 0..20 {
            board.update_section(&format!("s{i}"), &"z".repeat(40), false);
            board.update_section("s0", &"w".repeat(24), false);
            assert!(board.total_tokens() <= cap);
        }
    }

    #[test]
    fn remaining_measured_against_soft_limit() {
        let mut board = Blackboard::new("/tmp/project", 100);
        // 440 chars = 110 tokens: over the soft budget, under the 120 cap.
        let outcome = board.update_section("a", &"x".repeat(440), true);
        assert!(outcome.success);
        assert!(board.total_tokens() > board.max_tokens());
        assert_eq!(board.remaining_tokens(), 0);
    }

    #[test]
    fn empty_sections_hidden_but_key_persists() {
        let mut board = Blackboard::new("/tmp/project", 1000);
        board.update_section("ghost", "", true);
        board.update_section("real", "content", true);
        assert_eq!(board.section_names(), vec!["real"]);
        assert_eq!(board.get_section("ghost"), "");
        // Appending to the empty key does not pick up a separator.
        board.update_section("ghost", "now real", false);
        assert_eq!(board.get_section("ghost"), "now real");
    }

    #[test]
    fn remove_section_reports_existence() {
        let mut board = Blackboard::new("/tmp/project", 1000);
        board.update_section("a", "content", true);
        assert!(board.remove_section("a"));
        assert!(!board.remove_section("a"));
        assert_eq!(board.total_tokens(), 0);
    }

    #[test]
    fn context_dump_has_sentinels_and_upper_headers() {
        let mut board = Blackboard::new("/tmp/project", 1000);
        board.update_section("overview", "an overview", true);
        board.update_section("empty", "", true);
        let dump = board.all_sections_for_context();
        assert!(dump.starts_with(CONTEXT_HEADER));
        assert!(dump.ends_with(CONTEXT_FOOTER));
        assert!(dump.contains("[OVERVIEW]\nan overview"));
        assert!(!dump.contains("[EMPTY]"));
    }

    #[test]
    fn json_round_trip_preserves_state() {
        let mut board = Blackboard::new("/tmp/project", 2000);
        board.update_section("overview", "first section", true);
        board.update_section("details", "second section", true);
        board.update_section("empty", "", true);

        let restored = Blackboard::from_json(&board.to_json()).unwrap();
        assert_eq!(restored.id(), board.id());
        assert_eq!(restored.target_path(), board.target_path());
        assert_eq!(restored.max_tokens(), board.max_tokens());
        assert_eq!(restored.created_at(), board.created_at());
        assert_eq!(restored.updated_at(), board.updated_at());
        assert_eq!(restored.get_section("overview"), "first section");
        assert_eq!(restored.get_section("details"), "second section");
        assert_eq!(restored.total_tokens(), board.total_tokens());
        // Empty sections do not survive the round trip.
        assert_eq!(restored.section_names(), vec!["overview", "details"]);
    }

    #[test]
    fn from_json_rejects_malformed_input() {
        assert!(Blackboard::from_json(&serde_json::json!({"id": "x"})).is_err());
    }

    #[test]
    fn seed_constructs_populated_board() {
        let board = Blackboard::seed(
            "/tmp/project",
            vec![
                ("overview".to_string(), "alpha".to_string()),
                ("findings".to_string(), "beta".to_string()),
            ],
            Some(1000),
        )
        .unwrap();
        assert_eq!(board.section_names(), vec!["overview", "findings"]);
    }

    #[test]
    fn seed_fails_all_or_nothing_with_aggregate_error() {
        let err = Blackboard::seed(
            "/tmp/project",
            vec![
                ("ok".to_string(), "fine".to_string()),
                ("huge".to_string(), "x".repeat(4000)),
            ],
            Some(100),
        )
        .unwrap_err();
        assert!(err.contains("'huge'"));
        assert!(err.contains("1 section(s)"));
    }

    #[test]
    fn session_ids_are_unique() {
        let a = generate_session_id();
        let b = generate_session_id();
        assert_ne!(a, b);
        assert!(a.starts_with("bb-"));
    }
}
