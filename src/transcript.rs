//! In-process chat transcripts, keyed by session id.
//!
//! Turns are append-only and ordered by insertion; a session starts empty
//! the first time its id is seen and lives until the process exits.
//! Nothing is persisted.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who produced a transcript turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One dated turn of a chat session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Default)]
pub struct TranscriptStore {
    sessions: Mutex<HashMap<String, Vec<Turn>>>,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, session_id: &str, role: Role, content: impl Into<String>) {
        let turn = Turn {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        };

        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.entry(session_id.to_string()).or_default().push(turn);
        }
    }

    /// All turns for a session, oldest first. Unknown ids yield an empty
    /// transcript.
    pub fn turns(&self, session_id: &str) -> Vec<Turn> {
        self.sessions
            .lock()
            .map(|sessions| sessions.get(session_id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().map(|sessions| sessions.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_stay_ordered_per_session() {
        let store = TranscriptStore::new();
        store.append("s1", Role::User, "first");
        store.append("s1", Role::Assistant, "second");
        store.append("s2", Role::User, "other session");

        let turns = store.turns("s1");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].content, "first");
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[1].content, "second");
        assert!(turns[0].timestamp <= turns[1].timestamp);

        assert_eq!(store.turns("s2").len(), 1);
        assert_eq!(store.session_count(), 2);
    }

    #[test]
    fn unknown_session_is_empty() {
        let store = TranscriptStore::new();
        assert!(store.turns("never-seen").is_empty());
        assert_eq!(store.session_count(), 0);
    }

    #[test]
    fn roles_serialize_lowercase() {
        let turn = Turn {
            role: Role::Assistant,
            content: "hi".to_string(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"], "hi");
    }
}
