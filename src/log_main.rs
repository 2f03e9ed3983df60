//! Session history

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::utils::path::get_data_dir;

/// One run of the macro
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub start: String,
    pub stop: Option<String>,
    #[serde(default)]
    pub fish: u32,
    #[serde(default)]
    pub fruits: u32,
}

/// Get sessions file path
pub fn get_sessions_path() -> PathBuf {
    get_data_dir().join("logs").join("sessions.json")
}

/// Load sessions from file, empty when missing or unreadable
pub fn load_sessions(path: &Path) -> Vec<Session> {
    fs::read_to_string(path)
        .ok()
        .and_then(|content| serde_json::from_str(&content).ok())
        .unwrap_or_default()
}

/// Save sessions to file
pub fn save_sessions(path: &Path, sessions: &[Session]) {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    match serde_json::to_string_pretty(sessions) {
        Ok(content) => {
            if let Err(e) = fs::write(path, content) {
                tracing::warn!("[SESSION] Failed to write {:?}: {}", path, e);
            }
        }
        Err(e) => tracing::warn!("[SESSION] Failed to serialize sessions: {}", e),
    }
}

/// Append an open session starting now
pub fn begin_session(path: &Path) {
    let mut sessions = load_sessions(path);
    sessions.push(Session {
        start: Utc::now().to_rfc3339(),
        stop: None,
        fish: 0,
        fruits: 0,
    });
    save_sessions(path, &sessions);
}

/// Close the most recent open session with the run's totals
pub fn end_session(path: &Path, fish: u32, fruits: u32) {
    let mut sessions = load_sessions(path);
    match sessions.iter_mut().rev().find(|s| s.stop.is_none()) {
        Some(open) => {
            open.stop = Some(Utc::now().to_rfc3339());
            open.fish = fish;
            open.fruits = fruits;
            save_sessions(path, &sessions);
        }
        None => tracing::debug!("[SESSION] No open session to close"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_sessions_missing_file() {
        let path = std::env::temp_dir().join("haiku-fishing-no-such-dir/sessions.json");
        assert!(load_sessions(&path).is_empty());
    }

    #[test]
    fn test_begin_then_end_session() {
        let dir = std::env::temp_dir().join(format!("haiku-fishing-sessions-{}", std::process::id()));
        let path = dir.join("sessions.json");
        let _ = fs::remove_file(&path);

        begin_session(&path);
        end_session(&path, 12, 1);
        begin_session(&path);

        let sessions = load_sessions(&path);
        assert_eq!(sessions.len(), 2);
        assert!(sessions[0].stop.is_some());
        assert_eq!(sessions[0].fish, 12);
        assert_eq!(sessions[0].fruits, 1);
        assert!(sessions[1].stop.is_none());

        let _ = fs::remove_dir_all(&dir);
    }
}
