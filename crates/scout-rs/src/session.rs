//! Blackboard session persistence.
//!
//! One JSON file per session, named `{id}.json`, holding the full
//! [`Blackboard::to_json`] shape. Sessions are keyed by their generated id
//! and looked up by id or by target path, so a later run can resume from
//! the most recent blackboard for the same target.

use crate::blackboard::Blackboard;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One line of the session listing: enough to pick a session without
/// loading its full content.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: String,
    pub target_path: String,
    pub total_tokens: usize,
    pub updated_at: DateTime<Utc>,
}

/// A directory of `{id}.json` session files.
pub struct SessionStore {
    sessions_dir: PathBuf,
}

impl SessionStore {
    /// Create a store, ensuring the sessions directory exists.
    pub fn new(sessions_dir: impl Into<PathBuf>) -> Result<Self, String> {
        let sessions_dir = sessions_dir.into();
        std::fs::create_dir_all(&sessions_dir)
            .map_err(|e| format!("Failed to create sessions dir: {e}"))?;
        Ok(Self { sessions_dir })
    }

    pub fn dir(&self) -> &Path {
        &self.sessions_dir
    }

    fn session_path(&self, id: &str) -> PathBuf {
        self.sessions_dir.join(format!("{id}.json"))
    }

    /// Atomic write: serialize to a temp file, then rename into place.
    pub fn save(&self, board: &Blackboard) -> Result<PathBuf, String> {
        let final_path = self.session_path(board.id());
        let tmp_path = self.sessions_dir.join(format!(".{}.json.tmp", board.id()));

        let json = serde_json::to_string_pretty(&board.to_json())
            .map_err(|e| format!("Failed to serialize session: {e}"))?;
        std::fs::write(&tmp_path, json)
            .map_err(|e| format!("Failed to write temp session file: {e}"))?;
        std::fs::rename(&tmp_path, &final_path)
            .map_err(|e| format!("Failed to rename session file: {e}"))?;

        debug!("Session {} saved to {}", board.id(), final_path.display());
        Ok(final_path)
    }

    /// Load a session by id. Returns `None` if the file doesn't exist.
    pub fn load(&self, id: &str) -> Result<Option<Blackboard>, String> {
        let path = self.session_path(id);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read session file: {e}"))?;
        let value: serde_json::Value =
            serde_json::from_str(&json).map_err(|e| format!("Failed to parse session file: {e}"))?;
        Blackboard::from_json(&value).map(Some)
    }

    /// The most recently updated session for a target path, if any.
    pub fn find_latest_for_target(&self, target_path: &str) -> Result<Option<Blackboard>, String> {
        let mut latest: Option<Blackboard> = None;
        for board in self.load_all()? {
            if board.target_path() != target_path {
                continue;
            }
            match latest {
                Some(ref best) if best.updated_at() >= board.updated_at() => {}
                _ => latest = Some(board),
            }
        }
        Ok(latest)
    }

    /// Summaries of every session, most recently updated first. Malformed
    /// files are skipped with a warning, never fatal.
    pub fn list(&self) -> Result<Vec<SessionSummary>, String> {
        let mut summaries: Vec<SessionSummary> = self
            .load_all()?
            .into_iter()
            .map(|board| SessionSummary {
                id: board.id().to_string(),
                target_path: board.target_path().to_string(),
                total_tokens: board.total_tokens(),
                updated_at: board.updated_at(),
            })
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    /// Delete a session by id. Deleting a missing session is not an error.
    pub fn delete(&self, id: &str) -> Result<(), String> {
        let path = self.session_path(id);
        if !path.exists() {
            return Ok(());
        }
        std::fs::remove_file(&path).map_err(|e| format!("Failed to delete session: {e}"))
    }

    fn load_all(&self) -> Result<Vec<Blackboard>, String> {
        let entries = std::fs::read_dir(&self.sessions_dir)
            .map_err(|e| format!("Failed to read sessions dir: {e}"))?;

        let mut boards = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| format!("Failed to read entry: {e}"))?;
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let parsed = std::fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|json| {
                    serde_json::from_str::<serde_json::Value>(&json).map_err(|e| e.to_string())
                })
                .and_then(|value| Blackboard::from_json(&value));
            match parsed {
                Ok(board) => boards.push(board),
                Err(e) => {
                    warn!("Skipping malformed session at {}: {e}", path.display());
                }
            }
        }
        Ok(boards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn board_for(target: &str) -> Blackboard {
        let mut board = Blackboard::new(target, 4000);
        board.update_section("overview", "A small project.", false);
        board
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        let board = board_for("/tmp/alpha");

        store.save(&board).unwrap();
        let loaded = store.load(board.id()).unwrap().unwrap();

        assert_eq!(loaded.id(), board.id());
        assert_eq!(loaded.target_path(), "/tmp/alpha");
        assert_eq!(loaded.get_section("overview"), "A small project.");
    }

    #[test]
    fn missing_session_returns_none() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        assert!(store.load("bb-nope").unwrap().is_none());
    }

    #[test]
    fn find_latest_picks_most_recent_for_target() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();

        let older = board_for("/tmp/alpha");
        store.save(&older).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let mut newer = board_for("/tmp/alpha");
        newer.update_section("extra", "later finding", false);
        store.save(&newer).unwrap();
        store.save(&board_for("/tmp/beta")).unwrap();

        let found = store.find_latest_for_target("/tmp/alpha").unwrap().unwrap();
        assert_eq!(found.id(), newer.id());
        assert!(store.find_latest_for_target("/tmp/gamma").unwrap().is_none());
    }

    #[test]
    fn list_sorts_by_recency_and_skips_malformed() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();

        let first = board_for("/tmp/alpha");
        store.save(&first).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = board_for("/tmp/beta");
        store.save(&second).unwrap();
        std::fs::write(dir.path().join("garbage.json"), "not json").unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id());
        assert_eq!(listed[1].id, first.id());
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        let board = board_for("/tmp/alpha");
        store.save(&board).unwrap();

        store.delete(board.id()).unwrap();
        assert!(store.load(board.id()).unwrap().is_none());
        store.delete(board.id()).unwrap();
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path()).unwrap();
        store.save(&board_for("/tmp/alpha")).unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
