//! System prompt assembly.
//!
//! [`SystemPromptBuilder`] assembles multi-section prompts from headed
//! sections joined by blank lines. [`build_system_prompt`] is the pure
//! function the loop calls every iteration: the blackboard changes between
//! iterations, so the prompt is never reused.

use crate::agent::config::ExplorerConfig;
use crate::agent::profile::ExplorationProfile;
use crate::blackboard::Blackboard;
use crate::tools::ToolSet;

/// Builder for multi-section system prompts.
///
/// Sections are joined with double newlines. Empty sections (from
/// `section_if` with a false condition, or `section_opt` with `None`) are
/// silently skipped.
pub struct SystemPromptBuilder {
    sections: Vec<String>,
    heading_prefix: String,
}

impl SystemPromptBuilder {
    /// Create a new builder with an initial preamble section.
    ///
    /// The preamble is included as-is (no heading). Subsequent sections
    /// added via `section()` get `## ` prefixed headings by default.
    pub fn new(preamble: impl Into<String>) -> Self {
        Self {
            sections: vec![preamble.into()],
            heading_prefix: "##".to_string(),
        }
    }

    /// Set the heading level for subsequent `section()` calls.
    pub fn heading_level(mut self, level: u8) -> Self {
        self.heading_prefix = "#".repeat(level as usize);
        self
    }

    /// Append a named section with a markdown heading. Skipped if
    /// `content` is empty.
    pub fn section(mut self, heading: &str, content: impl Into<String>) -> Self {
        let content = content.into();
        if !content.is_empty() {
            self.sections
                .push(format!("{} {heading}\n\n{content}", self.heading_prefix));
        }
        self
    }

    /// Conditionally append a section. The `content_fn` is only called
    /// when `condition` is true.
    pub fn section_if(
        self,
        condition: bool,
        heading: &str,
        content_fn: impl FnOnce() -> String,
    ) -> Self {
        if condition {
            self.section(heading, content_fn())
        } else {
            self
        }
    }

    /// Append a section only if the content is `Some`.
    pub fn section_opt(self, heading: &str, content: Option<impl Into<String>>) -> Self {
        match content {
            Some(c) => self.section(heading, c),
            None => self,
        }
    }

    /// Append raw text without a heading. Skipped if empty.
    pub fn raw(mut self, content: impl Into<String>) -> Self {
        let content = content.into();
        if !content.is_empty() {
            self.sections.push(content);
        }
        self
    }

    /// Conditionally append raw text.
    pub fn raw_if(self, condition: bool, content_fn: impl FnOnce() -> String) -> Self {
        if condition {
            self.raw(content_fn())
        } else {
            self
        }
    }

    /// Build the final prompt by joining all sections with double newlines.
    pub fn build(self) -> String {
        self.sections.join("\n\n")
    }
}

// ── Exploration prompt ─────────────────────────────────────────────

/// Build the full system prompt for one iteration.
///
/// Pure function of the blackboard, profile, tool catalogue, compacted
/// tool history, and the stall counter. No side effects.
pub fn build_system_prompt(
    board: &Blackboard,
    profile: &ExplorationProfile,
    tools: &ToolSet,
    history_summary: &str,
    iterations_since_write: u32,
    config: &ExplorerConfig,
) -> String {
    let threshold = profile.stall_warning_threshold;
    let utilization_pct = (board.utilization() * 100.0).round() as u32;

    SystemPromptBuilder::new(profile.mission.clone())
        .section("Target", format!("You are exploring: {}", board.target_path()))
        .section(
            "How Your Memory Works",
            "Only the blackboard persists between iterations. The conversation is \
             pruned to your last exchange every turn, so anything you do not record \
             with update_blackboard is lost. Persist findings as soon as you make them.",
        )
        .raw_if(iterations_since_write >= threshold, || {
            stall_warning(iterations_since_write, threshold)
        })
        .section(
            "Blackboard Utilization",
            format!(
                "{} / {} tokens used ({utilization_pct}%). {} tokens remaining.",
                board.total_tokens(),
                board.max_tokens(),
                board.remaining_tokens()
            ),
        )
        .section_if(!profile.suggested_sections.is_empty(), "Suggested Sections", || {
            profile
                .suggested_sections
                .iter()
                .map(|s| format!("- {}: {}", s.name, s.description))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .section("Tools", tool_catalogue(tools))
        .section_if(!profile.hints.is_empty(), "Exploration Hints", || {
            profile
                .hints
                .iter()
                .map(|h| format!("- {h}"))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .section("When To Stop", profile.completion_criteria.clone())
        .section_if(!history_summary.is_empty(), "Recent Tool Activity", || {
            history_summary.to_string()
        })
        .raw_if(!board.sections().is_empty(), || {
            board.all_sections_for_context()
        })
        .raw_if(config.max_nudges > 0 && board.utilization() < config.gate_threshold, || {
            format!(
                "Note: the blackboard is under {}% utilized. Keep exploring until your \
                 findings justify stopping.",
                (config.gate_threshold * 100.0).round() as u32
            )
        })
        .build()
}

/// Escalating stall warning: firm at `threshold`, critical at `threshold + 2`.
fn stall_warning(iterations_since_write: u32, threshold: u32) -> String {
    if iterations_since_write >= threshold + 2 {
        format!(
            "CRITICAL: {iterations_since_write} iterations without a blackboard write. \
             Everything you have learned in those iterations is about to be lost. \
             Call update_blackboard NOW before doing anything else."
        )
    } else {
        format!(
            "Warning: {iterations_since_write} iterations without a blackboard write. \
             Record your findings with update_blackboard before continuing to explore."
        )
    }
}

/// Render the tool catalogue: name, parameter names, and purpose line.
fn tool_catalogue(tools: &ToolSet) -> String {
    tools
        .definitions()
        .iter()
        .map(|def| {
            let params = def.function.parameters["properties"]
                .as_object()
                .map(|props| props.keys().cloned().collect::<Vec<_>>().join(", "))
                .unwrap_or_default();
            let purpose = def.function.description.lines().next().unwrap_or_default();
            format!("- {}({params}): {purpose}", def.function.name)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::profile::ProfileRegistry;
    use crate::blackboard::Blackboard;
    use crate::tools::exploration_tool_set;
    use std::sync::{Arc, Mutex};

    fn fixtures() -> (Arc<Mutex<Blackboard>>, ToolSet, ProfileRegistry, ExplorerConfig) {
        let board = Arc::new(Mutex::new(Blackboard::new("/srv/app", 1000)));
        let tools = exploration_tool_set("/srv/app", board.clone());
        (board, tools, ProfileRegistry::with_defaults(), ExplorerConfig::default())
    }

    #[test]
    fn builder_joins_sections() {
        let prompt = SystemPromptBuilder::new("Preamble")
            .section("Context", "Some context")
            .build();
        assert_eq!(prompt, "Preamble\n\n## Context\n\nSome context");
    }

    #[test]
    fn builder_skips_empty_and_false_sections() {
        let prompt = SystemPromptBuilder::new("P")
            .section("Empty", "")
            .section_if(false, "Hidden", || "nope".into())
            .section_opt("Missing", None::<String>)
            .raw_if(false, || "hidden raw".into())
            .build();
        assert_eq!(prompt, "P");
    }

    #[test]
    fn prompt_contains_mission_target_and_tools() {
        let (board, tools, registry, config) = fixtures();
        let board = board.lock().unwrap();
        let prompt =
            build_system_prompt(&board, registry.default_profile(), &tools, "", 0, &config);
        assert!(prompt.contains("/srv/app"));
        assert!(prompt.contains("list_dir("));
        assert!(prompt.contains("update_blackboard("));
        assert!(prompt.contains("## Suggested Sections"));
        assert!(prompt.contains("0 / 1000 tokens"));
    }

    #[test]
    fn blackboard_dump_only_when_non_empty() {
        let (board, tools, registry, config) = fixtures();
        let profile = registry.default_profile();
        {
            let board = board.lock().unwrap();
            let prompt = build_system_prompt(&board, profile, &tools, "", 0, &config);
            assert!(!prompt.contains("BLACKBOARD STATE"));
        }
        board
            .lock()
            .unwrap()
            .update_section("overview", "a workspace", true);
        let board = board.lock().unwrap();
        let prompt = build_system_prompt(&board, profile, &tools, "", 0, &config);
        assert!(prompt.contains("BLACKBOARD STATE"));
        assert!(prompt.contains("[OVERVIEW]"));
    }

    #[test]
    fn stall_warning_appears_at_threshold_and_escalates() {
        let (board, tools, registry, config) = fixtures();
        let profile = registry.default_profile();
        let threshold = profile.stall_warning_threshold;
        let board = board.lock().unwrap();

        let calm = build_system_prompt(&board, profile, &tools, "", threshold - 1, &config);
        assert!(!calm.contains("without a blackboard write"));

        let warned = build_system_prompt(&board, profile, &tools, "", threshold, &config);
        assert!(warned.contains("Warning:"));
        assert!(!warned.contains("CRITICAL"));

        let critical = build_system_prompt(&board, profile, &tools, "", threshold + 2, &config);
        assert!(critical.contains("CRITICAL"));
    }

    #[test]
    fn history_summary_injected_when_present() {
        let (board, tools, registry, config) = fixtures();
        let board = board.lock().unwrap();
        let prompt = build_system_prompt(
            &board,
            registry.default_profile(),
            &tools,
            "✓ list_dir(.) → Found 3 items",
            0,
            &config,
        );
        assert!(prompt.contains("## Recent Tool Activity"));
        assert!(prompt.contains("Found 3 items"));
    }
}
