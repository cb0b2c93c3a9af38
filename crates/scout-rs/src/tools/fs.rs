//! Filesystem inspection tools.
//!
//! | Tool | Name | Purpose |
//! |------|------|---------|
//! | [`ListDir`] | `list_dir` | Recursive directory listing |
//! | [`FileRead`] | `file_read` | Read a file with line numbers |
//! | [`GrepSearch`] | `grep_search` | Case-insensitive regex search |
//!
//! All paths resolve against the target base path; `..` traversal is
//! rejected. Dotfiles and build/dependency directories are skipped by the
//! recursive tools.

use crate::ToolDef;
use crate::tools::core::{Tool, ToolFuture, parse_tool_args};
use crate::tools::spec::ToolSpec;
use regex::RegexBuilder;
use schemars::JsonSchema;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Directories never descended into.
pub const IGNORED_DIRS: &[&str] = &[
    "node_modules",
    "target",
    "dist",
    "build",
    "__pycache__",
    "venv",
    "vendor",
    "coverage",
];

/// Default and maximum recursion depth for `list_dir`.
pub const DEFAULT_LIST_DEPTH: u32 = 3;
pub const MAX_LIST_DEPTH: u32 = 5;

/// Default match limit for `grep_search`.
pub const DEFAULT_MAX_MATCHES: usize = 50;

/// Files larger than this are skipped by `grep_search`.
const MAX_GREP_FILE_BYTES: u64 = 1_048_576;

/// Resolve a model-supplied relative path against the base, blocking
/// traversal out of the target.
fn resolve(base: &Path, path: &str) -> Result<PathBuf, String> {
    let parent_dir = Path::new(path)
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir));
    if parent_dir {
        return Err("path traversal not allowed".to_string());
    }
    if path.is_empty() || path == "." {
        Ok(base.to_path_buf())
    } else {
        Ok(base.join(path))
    }
}

fn skip_entry(name: &str, is_dir: bool) -> bool {
    name.starts_with('.') || (is_dir && IGNORED_DIRS.contains(&name))
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1_048_576 {
        format!("{:.1} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}

// ── ListDir ─────────────────────────────────────────────────────────

/// Typed arguments for `list_dir`.
#[derive(Deserialize, JsonSchema)]
pub struct ListDirArgs {
    /// Directory path relative to the target root (default '.').
    #[serde(default)]
    pub path: Option<String>,
    /// How many directory levels to descend (default 3, max 5).
    #[serde(default)]
    pub max_depth: Option<u32>,
}

/// Recursive directory listing, grouped by directory with type and size.
pub struct ListDir {
    base: PathBuf,
}

impl ListDir {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn walk(
        dir: &Path,
        rel: &str,
        depth: u32,
        max_depth: u32,
        groups: &mut Vec<(String, Vec<String>)>,
        count: &mut usize,
    ) -> Result<(), String> {
        let mut entries: Vec<_> = std::fs::read_dir(dir)
            .map_err(|e| format!("cannot read directory '{rel}': {e}"))?
            .filter_map(|e| e.ok())
            .collect();
        entries.sort_by_key(|e| e.file_name());

        let mut lines = Vec::new();
        let mut subdirs = Vec::new();
        for entry in entries {
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if skip_entry(&name, is_dir) {
                continue;
            }
            *count += 1;
            if is_dir {
                lines.push(format!("  [dir] {name}/"));
                if depth < max_depth {
                    let child_rel = if rel == "." {
                        name.clone()
                    } else {
                        format!("{rel}/{name}")
                    };
                    subdirs.push((entry.path(), child_rel));
                }
            } else {
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                lines.push(format!("  [file] {name} ({})", format_size(size)));
            }
        }

        if !lines.is_empty() {
            groups.push((format!("{rel}/"), lines));
        }
        for (path, child_rel) in subdirs {
            // Unreadable subdirectories are skipped, not fatal.
            let _ = Self::walk(&path, &child_rel, depth + 1, max_depth, groups, count);
        }
        Ok(())
    }
}

impl Tool for ListDir {
    fn definition(&self) -> ToolDef {
        ToolSpec::builder("list_dir")
            .purpose("List the contents of a directory recursively")
            .when_to_use(
                "At the start of exploration to map the project layout, or to \
                 inspect a subdirectory you have not seen yet",
            )
            .when_not_to_use(
                "When you need file contents — use file_read. When hunting for \
                 a specific string — use grep_search",
            )
            .parameters_for::<ListDirArgs>()
            .example(
                "list_dir(path='src', max_depth=2)",
                "Entries under src/ grouped by directory, two levels deep",
            )
            .output_format(
                "'Found N items' followed by per-directory groups of \
                 [dir]/[file] entries with sizes",
            )
            .to_tool_def()
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let base = self.base.clone();
        let arguments = arguments.to_string();
        Box::pin(async move {
            let args: ListDirArgs = parse_tool_args(&arguments)?;
            let rel = args.path.unwrap_or_default();
            let root = resolve(&base, &rel)?;
            if !root.is_dir() {
                return Err(format!("'{rel}' is not a directory"));
            }
            let max_depth = args
                .max_depth
                .unwrap_or(DEFAULT_LIST_DEPTH)
                .clamp(1, MAX_LIST_DEPTH);

            let display_rel = if rel.is_empty() || rel == "." {
                ".".to_string()
            } else {
                rel.clone()
            };
            let mut groups = Vec::new();
            let mut count = 0usize;
            Self::walk(&root, &display_rel, 1, max_depth, &mut groups, &mut count)?;

            let mut out = format!("Found {count} items");
            for (dir, lines) in groups {
                out.push_str(&format!("\n\n{dir}:\n{}", lines.join("\n")));
            }
            Ok(out)
        })
    }
}

// ── FileRead ────────────────────────────────────────────────────────

/// Typed arguments for `file_read`.
#[derive(Deserialize, JsonSchema)]
pub struct FileReadArgs {
    /// File path relative to the target root.
    pub path: String,
    /// First line to read, 1-indexed inclusive (default: start of file).
    #[serde(default)]
    pub start_line: Option<usize>,
    /// Last line to read, 1-indexed inclusive (default: end of file).
    #[serde(default)]
    pub end_line: Option<usize>,
}

/// Read a file with 1-indexed line-number prefixes.
pub struct FileRead {
    base: PathBuf,
}

impl FileRead {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

impl Tool for FileRead {
    fn definition(&self) -> ToolDef {
        ToolSpec::builder("file_read")
            .purpose("Read a file, whole or by line range")
            .when_to_use("When you need the contents of a specific file you already located")
            .when_not_to_use(
                "When searching for a pattern across files — use grep_search. \
                 When browsing a directory — use list_dir",
            )
            .parameters_for::<FileReadArgs>()
            .example(
                "file_read(path='src/main.rs', start_line=1, end_line=40)",
                "The first 40 lines, each prefixed with its line number",
            )
            .output_format("Lines prefixed 'NNN | content'")
            .to_tool_def()
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let base = self.base.clone();
        let arguments = arguments.to_string();
        Box::pin(async move {
            let args: FileReadArgs = parse_tool_args(&arguments)?;
            let full_path = resolve(&base, &args.path)?;

            // Catch directories early so the model gets an actionable hint
            // instead of the raw OS error.
            if full_path.is_dir() {
                return Err(format!(
                    "'{}' is a directory, not a file. Use list_dir to browse directories.",
                    args.path
                ));
            }

            let content = tokio::fs::read_to_string(&full_path)
                .await
                .map_err(|e| format!("cannot read '{}': {e}", args.path))?;

            let lines: Vec<&str> = content.lines().collect();
            let total = lines.len();
            let start = args.start_line.unwrap_or(1);
            let end = args.end_line.unwrap_or(total).min(total);
            if start < 1 {
                return Err("start_line must be >= 1".to_string());
            }
            if start > total && total > 0 {
                return Err(format!(
                    "start_line {start} is past the end of '{}' ({total} lines)",
                    args.path
                ));
            }
            if start > end && total > 0 {
                return Err(format!("start_line {start} is greater than end_line {end}"));
            }

            let numbered: Vec<String> = lines
                .iter()
                .enumerate()
                .skip(start.saturating_sub(1))
                .take(end.saturating_sub(start) + 1)
                .map(|(i, line)| format!("{:>4} | {line}", i + 1))
                .collect();
            Ok(numbered.join("\n"))
        })
    }
}

// ── GrepSearch ──────────────────────────────────────────────────────

/// Typed arguments for `grep_search`.
#[derive(Deserialize, JsonSchema)]
pub struct GrepSearchArgs {
    /// Regex pattern (matched case-insensitively).
    pub pattern: String,
    /// File or directory to search, relative to the target root (default '.').
    #[serde(default)]
    pub path: Option<String>,
    /// Stop after this many matches (default 50).
    #[serde(default)]
    pub max_results: Option<usize>,
}

/// Case-insensitive regex search over text-like files.
pub struct GrepSearch {
    base: PathBuf,
}

impl GrepSearch {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Collect searchable files under `path`, bounded by the ignore rules.
    fn collect_files(path: &Path, out: &mut Vec<PathBuf>) {
        if path.is_file() {
            out.push(path.to_path_buf());
            return;
        }
        let Ok(entries) = std::fs::read_dir(path) else {
            return;
        };
        let mut entries: Vec<_> = entries.filter_map(|e| e.ok()).collect();
        entries.sort_by_key(|e| e.file_name());
        for entry in entries {
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if skip_entry(&name, is_dir) {
                continue;
            }
            if is_dir {
                Self::collect_files(&entry.path(), out);
            } else if entry.metadata().map(|m| m.len()).unwrap_or(0) <= MAX_GREP_FILE_BYTES {
                out.push(entry.path());
            }
        }
    }
}

impl Tool for GrepSearch {
    fn definition(&self) -> ToolDef {
        ToolSpec::builder("grep_search")
            .purpose("Search file contents by regex pattern, case-insensitively")
            .when_to_use(
                "When hunting for where a symbol, string, or concept appears \
                 across the target",
            )
            .when_not_to_use(
                "When you already know the file — use file_read. Searches are \
                 capped at max_results; narrow the path for busy patterns",
            )
            .parameters_for::<GrepSearchArgs>()
            .example(
                "grep_search(pattern='fn main', path='src')",
                "Matching lines as 'file:line: text'",
            )
            .output_format(
                "'Found N matches' followed by file:line: trimmed line and the \
                 matched substring",
            )
            .to_tool_def()
    }

    fn execute(&self, arguments: &str) -> ToolFuture<'_> {
        let base = self.base.clone();
        let arguments = arguments.to_string();
        Box::pin(async move {
            let args: GrepSearchArgs = parse_tool_args(&arguments)?;
            let rel = args.path.unwrap_or_default();
            let root = resolve(&base, &rel)?;
            if !root.exists() {
                return Err(format!("'{rel}' does not exist"));
            }
            let max_results = args.max_results.unwrap_or(DEFAULT_MAX_MATCHES).max(1);

            let regex = RegexBuilder::new(&args.pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| format!("invalid regex pattern '{}': {e}", args.pattern))?;

            let mut files = Vec::new();
            Self::collect_files(&root, &mut files);

            let mut matches = Vec::new();
            'outer: for file in &files {
                // Binary files fail UTF-8 decoding and are skipped.
                let Ok(content) = std::fs::read_to_string(file) else {
                    continue;
                };
                let display = file
                    .strip_prefix(&base)
                    .unwrap_or(file)
                    .display()
                    .to_string();
                for (idx, line) in content.lines().enumerate() {
                    if let Some(m) = regex.find(line) {
                        matches.push(format!(
                            "{display}:{}: {} [match: '{}']",
                            idx + 1,
                            line.trim(),
                            m.as_str()
                        ));
                        if matches.len() >= max_results {
                            break 'outer;
                        }
                    }
                }
            }

            if matches.is_empty() {
                return Ok(format!("No matches found for pattern: {}", args.pattern));
            }
            Ok(format!(
                "Found {} matches for pattern '{}'\n\n{}",
                matches.len(),
                args.pattern,
                matches.join("\n")
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::core::{ToolRecord, ToolSet};
    use std::fs;
    use tempfile::tempdir;

    fn fixture() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        fs::create_dir(dir.path().join("node_modules")).unwrap();
        fs::write(dir.path().join("Cargo.toml"), "[package]\nname = \"demo\"\n").unwrap();
        fs::write(
            dir.path().join("src/main.rs"),
            "fn main() {\n    println!(\"Hello\");\n}\n",
        )
        .unwrap();
        fs::write(dir.path().join(".hidden"), "secret").unwrap();
        fs::write(dir.path().join("node_modules/dep.js"), "ignored").unwrap();
        dir
    }

    async fn run(tool: impl Tool + 'static, name: &str, args: serde_json::Value) -> ToolRecord {
        ToolSet::new()
            .with(tool)
            .execute(0, name, &args.to_string())
            .await
    }

    #[tokio::test]
    async fn list_dir_groups_and_counts() {
        let dir = fixture();
        let record = run(ListDir::new(dir.path()), "list_dir", serde_json::json!({})).await;
        assert!(record.success, "{}", record.output);
        // Cargo.toml, src/, src/main.rs — dotfiles and node_modules skipped.
        assert!(record.output.starts_with("Found 3 items"));
        assert!(record.output.contains("[dir] src/"));
        assert!(record.output.contains("src/:"));
        assert!(record.output.contains("[file] main.rs"));
        assert!(!record.output.contains("node_modules"));
        assert!(!record.output.contains(".hidden"));
    }

    #[tokio::test]
    async fn list_dir_empty_directory() {
        let dir = tempdir().unwrap();
        let record = run(ListDir::new(dir.path()), "list_dir", serde_json::json!({})).await;
        assert!(record.success);
        assert_eq!(record.output, "Found 0 items");
    }

    #[tokio::test]
    async fn list_dir_rejects_traversal() {
        let dir = fixture();
        let record = run(
            ListDir::new(dir.path()),
            "list_dir",
            serde_json::json!({"path": "../outside"}),
        )
        .await;
        assert!(!record.success);
        assert!(record.output.contains("traversal"));
    }

    #[tokio::test]
    async fn file_read_allows_double_dot_in_filename() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("notes..md"), "double dot\n").unwrap();
        let record = run(
            FileRead::new(dir.path()),
            "file_read",
            serde_json::json!({"path": "notes..md"}),
        )
        .await;
        assert!(record.success, "got: {}", record.output);
        assert!(record.output.contains("double dot"));
    }

    #[tokio::test]
    async fn list_dir_respects_max_depth() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("a/b/deep.txt"), "x").unwrap();
        let record = run(
            ListDir::new(dir.path()),
            "list_dir",
            serde_json::json!({"max_depth": 1}),
        )
        .await;
        assert!(record.success);
        assert!(record.output.contains("[dir] a/"));
        assert!(!record.output.contains("deep.txt"));
    }

    #[tokio::test]
    async fn file_read_numbers_lines() {
        let dir = fixture();
        let record = run(
            FileRead::new(dir.path()),
            "file_read",
            serde_json::json!({"path": "src/main.rs"}),
        )
        .await;
        assert!(record.success);
        assert!(record.output.contains("   1 | fn main() {"));
        assert!(record.output.contains("   3 | }"));
    }

    #[tokio::test]
    async fn file_read_honors_range() {
        let dir = fixture();
        let record = run(
            FileRead::new(dir.path()),
            "file_read",
            serde_json::json!({"path": "src/main.rs", "start_line": 2, "end_line": 2}),
        )
        .await;
        assert!(record.success);
        assert!(record.output.contains("   2 |"));
        assert!(!record.output.contains("   1 |"));
        assert!(!record.output.contains("   3 |"));
    }

    #[tokio::test]
    async fn file_read_missing_file_fails() {
        let dir = fixture();
        let record = run(
            FileRead::new(dir.path()),
            "file_read",
            serde_json::json!({"path": "nope.rs"}),
        )
        .await;
        assert!(!record.success);
        assert!(record.output.starts_with("Error:"));
    }

    #[tokio::test]
    async fn file_read_directory_gets_hint() {
        let dir = fixture();
        let record = run(
            FileRead::new(dir.path()),
            "file_read",
            serde_json::json!({"path": "src"}),
        )
        .await;
        assert!(!record.success);
        assert!(record.output.contains("list_dir"));
    }

    #[tokio::test]
    async fn grep_finds_case_insensitive_matches() {
        let dir = fixture();
        let record = run(
            GrepSearch::new(dir.path()),
            "grep_search",
            serde_json::json!({"pattern": "HELLO"}),
        )
        .await;
        assert!(record.success);
        assert!(record.output.starts_with("Found 1 matches"));
        assert!(record.output.contains("main.rs:2:"));
        assert!(record.output.contains("[match: 'Hello']"));
    }

    #[tokio::test]
    async fn grep_reports_no_matches() {
        let dir = tempdir().unwrap();
        let record = run(
            GrepSearch::new(dir.path()),
            "grep_search",
            serde_json::json!({"pattern": "absent_symbol"}),
        )
        .await;
        assert!(record.success);
        assert_eq!(record.output, "No matches found for pattern: absent_symbol");
    }

    #[tokio::test]
    async fn grep_rejects_invalid_regex() {
        let dir = fixture();
        let record = run(
            GrepSearch::new(dir.path()),
            "grep_search",
            serde_json::json!({"pattern": "[unclosed"}),
        )
        .await;
        assert!(!record.success);
        assert!(record.output.contains("invalid regex"));
    }

    #[tokio::test]
    async fn grep_short_circuits_at_max_results() {
        let dir = tempdir().unwrap();
        let many = "needle\n".repeat(20);
        fs::write(dir.path().join("a.txt"), &many).unwrap();
        fs::write(dir.path().join("b.txt"), &many).unwrap();
        let record = run(
            GrepSearch::new(dir.path()),
            "grep_search",
            serde_json::json!({"pattern": "needle", "max_results": 5}),
        )
        .await;
        assert!(record.success);
        assert!(record.output.starts_with("Found 5 matches"));
    }
}
