//! Run artifacts.
//!
//! Every run gets its own timestamp-named directory containing the full
//! transcript, blackboard snapshots (JSON + Markdown), run metadata, the
//! tool-call history, and a model-generated summary. Persistence is
//! best-effort: a failed write is logged and the remaining artifacts are
//! still attempted, so a disk problem never masks the run's own outcome.

use crate::agent::explorer::RunReport;
use crate::blackboard::Blackboard;
use crate::{ChatRequest, Message, OpenRouterClient, SUMMARY_MAX_TOKENS};
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Run metadata, written as `metadata.json`.
#[derive(Debug, Serialize)]
pub struct RunMetadata<'a> {
    pub target_path: &'a str,
    pub model: &'a str,
    pub profile: &'a str,
    pub iterations: u32,
    pub tool_calls: u32,
    pub nudges: u32,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cache_creation_tokens: u64,
    pub cache_read_tokens: u64,
    pub duration_ms: u64,
    pub completed_naturally: bool,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
}

/// Writes one run's artifacts into a fresh timestamp-named directory.
pub struct ArtifactWriter {
    output_dir: PathBuf,
}

impl ArtifactWriter {
    /// Create a writer, ensuring the output root exists.
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self, String> {
        let output_dir = output_dir.into();
        std::fs::create_dir_all(&output_dir)
            .map_err(|e| format!("Failed to create output dir: {e}"))?;
        Ok(Self { output_dir })
    }

    pub fn dir(&self) -> &Path {
        &self.output_dir
    }

    /// Persist everything a run produced. Only a failure to create the run
    /// directory is fatal; individual artifact failures are logged and the
    /// rest are still written.
    pub fn persist_run(
        &self,
        report: &RunReport,
        board: &Blackboard,
        model: &str,
        profile: &str,
        summary: &str,
        error: Option<&str>,
    ) -> Result<PathBuf, String> {
        let run_dir = self
            .output_dir
            .join(format!("run-{}", Utc::now().format("%Y%m%d-%H%M%S")));
        std::fs::create_dir_all(&run_dir)
            .map_err(|e| format!("Failed to create run dir: {e}"))?;

        let metadata = RunMetadata {
            target_path: board.target_path(),
            model,
            profile,
            iterations: report.stats.iterations,
            tool_calls: report.stats.tool_calls,
            nudges: report.stats.nudges,
            prompt_tokens: report.stats.prompt_tokens,
            completion_tokens: report.stats.completion_tokens,
            cache_creation_tokens: report.stats.cache_creation_tokens,
            cache_read_tokens: report.stats.cache_read_tokens,
            duration_ms: report.stats.duration_ms(),
            completed_naturally: report.completed_naturally,
            success: error.is_none(),
            error,
        };

        write_json(&run_dir.join("transcript.json"), &report.transcript);
        write_json(&run_dir.join("blackboard.json"), &board.to_json());
        write_text(&run_dir.join("blackboard.md"), &report.blackboard_markdown);
        write_json(&run_dir.join("metadata.json"), &metadata);
        write_json(&run_dir.join("tool_history.json"), &report.tool_history);
        write_text(&run_dir.join("summary.md"), summary);

        info!("Run artifacts written to {}", run_dir.display());
        Ok(run_dir)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => write_text(path, &json),
        Err(e) => warn!("Failed to serialize {}: {e}", path.display()),
    }
}

fn write_text(path: &Path, content: &str) {
    if let Err(e) = std::fs::write(path, content) {
        warn!("Failed to write {}: {e}", path.display());
    }
}

// ── Summary generation ─────────────────────────────────────────────

const SUMMARY_SYSTEM_PROMPT: &str =
    "You are a technical writer. You receive the exploration notes an agent \
     collected about a project and produce a clear, well-organized Markdown \
     summary for a developer encountering the project for the first time. \
     Keep it factual; do not invent details that are not in the notes.";

/// Generate a natural-language summary of the final blackboard with one
/// extra model call. Best-effort — callers fall back to
/// [`placeholder_summary`] on error.
pub async fn generate_summary(
    client: &OpenRouterClient,
    model: &str,
    blackboard_markdown: &str,
) -> Result<String, String> {
    let body = ChatRequest {
        model: model.to_string(),
        messages: vec![
            Message::system(SUMMARY_SYSTEM_PROMPT),
            Message::user(format!(
                "Summarize these exploration notes:\n\n{blackboard_markdown}"
            )),
        ],
        max_tokens: SUMMARY_MAX_TOKENS,
        temperature: 0.3,
        ..Default::default()
    };
    let completion = client.chat(&body).await?;
    completion
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| "empty summary response".to_string())
}

/// Fallback summary: a placeholder note plus the raw blackboard Markdown,
/// so the artifact is still useful when the summary call fails.
pub fn placeholder_summary(blackboard_markdown: &str, error: &str) -> String {
    format!(
        "# Summary unavailable\n\nSummary generation failed: {error}\n\n\
         The raw exploration notes follow.\n\n---\n\n{blackboard_markdown}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::explorer::RunStats;
    use crate::tools::core::ToolRecord;
    use tempfile::tempdir;

    fn sample_report() -> (RunReport, Blackboard) {
        let mut board = Blackboard::new("/tmp/project", 4000);
        board.update_section("overview", "A CLI tool.", false);
        let report = RunReport {
            stats: RunStats {
                iterations: 3,
                tool_calls: 5,
                nudges: 1,
                prompt_tokens: 1200,
                completion_tokens: 300,
                cache_creation_tokens: 0,
                cache_read_tokens: 0,
                started_at: Utc::now(),
                ended_at: Utc::now(),
            },
            transcript: vec![Message::user("explore /tmp/project")],
            tool_history: vec![ToolRecord {
                timestamp: Utc::now(),
                iteration: 1,
                name: "list_dir".into(),
                input: r#"{"path": "."}"#.into(),
                success: true,
                output: "Found 2 items".into(),
                duration_ms: 4,
            }],
            blackboard_markdown: board.to_markdown(),
            completed_naturally: true,
        };
        (report, board)
    }

    #[test]
    fn persist_run_writes_all_artifacts() {
        let dir = tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path()).unwrap();
        let (report, board) = sample_report();

        let run_dir = writer
            .persist_run(&report, &board, "test/model", "codebase", "A summary.", None)
            .unwrap();

        for name in [
            "transcript.json",
            "blackboard.json",
            "blackboard.md",
            "metadata.json",
            "tool_history.json",
            "summary.md",
        ] {
            assert!(run_dir.join(name).exists(), "missing artifact: {name}");
        }

        let metadata: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(run_dir.join("metadata.json")).unwrap())
                .unwrap();
        assert_eq!(metadata["iterations"], 3);
        assert_eq!(metadata["success"], true);
        assert!(metadata.get("error").is_none());
    }

    #[test]
    fn failed_run_metadata_carries_error() {
        let dir = tempdir().unwrap();
        let writer = ArtifactWriter::new(dir.path()).unwrap();
        let (report, board) = sample_report();

        let run_dir = writer
            .persist_run(
                &report,
                &board,
                "test/model",
                "codebase",
                "placeholder",
                Some("API HTTP 500"),
            )
            .unwrap();

        let metadata: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(run_dir.join("metadata.json")).unwrap())
                .unwrap();
        assert_eq!(metadata["success"], false);
        assert_eq!(metadata["error"], "API HTTP 500");
    }

    #[test]
    fn placeholder_keeps_raw_notes() {
        let text = placeholder_summary("# Notes\n\ncontent", "timeout");
        assert!(text.contains("timeout"));
        assert!(text.contains("# Notes"));
    }
}
