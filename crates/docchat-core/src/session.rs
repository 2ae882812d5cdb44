//! Process-lifetime conversation history, keyed by session id.
//!
//! A [`SessionStore`] is created by the hosting process and handed to the
//! conversation pipeline by reference. Sessions are created lazily by
//! [`SessionStore::get_or_create`] and live until the store is dropped;
//! there is no eviction and no delete operation.
//!
//! The map is guarded by a `std::sync::RwLock`. Turns for different
//! session ids never touch each other's entries. Overlapping turns for the
//! *same* id are the caller's responsibility to serialize.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{Transcript, Turn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),
}

/// One conversation and its bookkeeping timestamps.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub transcript: Transcript,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl Session {
    fn new(id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            transcript: Vec::new(),
            created_at: now,
            last_active_at: now,
        }
    }
}

/// In-memory map from session id to [`Session`].
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a snapshot of the transcript for `id`, creating an empty
    /// session on first reference.
    pub fn get_or_create(&self, id: &str) -> Transcript {
        if let Some(session) = self.read().get(id) {
            return session.transcript.clone();
        }
        let mut sessions = self.write();
        sessions
            .entry(id.to_string())
            .or_insert_with(|| Session::new(id))
            .transcript
            .clone()
    }

    /// Append a turn to the end of the transcript for `id`.
    pub fn append(&self, id: &str, turn: Turn) -> Result<(), SessionError> {
        let mut sessions = self.write();
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        session.transcript.push(turn);
        session.last_active_at = Utc::now();
        Ok(())
    }

    /// Snapshot of the transcript for `id`, without creating it.
    pub fn transcript(&self, id: &str) -> Option<Transcript> {
        self.read().get(id).map(|s| s.transcript.clone())
    }

    /// Snapshot of the full session for `id`, without creating it.
    pub fn session(&self, id: &str) -> Option<Session> {
        self.read().get(id).cloned()
    }

    /// All known session ids, sorted.
    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Session>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Session>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::Role;

    #[test]
    fn test_get_or_create_is_idempotent() {
        let store = SessionStore::new();
        let first = store.get_or_create("s1");
        let second = store.get_or_create("s1");
        assert!(first.is_empty());
        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_append_round_trip() {
        let store = SessionStore::new();
        store.get_or_create("s1");
        store.append("s1", Turn::user("X")).unwrap();
        store.append("s1", Turn::assistant("Y")).unwrap();

        let transcript = store.get_or_create("s1");
        let n = transcript.len();
        assert_eq!(transcript[n - 2], Turn::user("X"));
        assert_eq!(transcript[n - 1], Turn::assistant("Y"));
        assert_eq!(transcript[n - 1].role, Role::Assistant);
    }

    #[test]
    fn test_append_to_unknown_session_fails() {
        let store = SessionStore::new();
        let err = store.append("ghost", Turn::user("hello")).unwrap_err();
        assert_eq!(err, SessionError::NotFound("ghost".to_string()));
        assert!(store.transcript("ghost").is_none());
    }

    #[test]
    fn test_sessions_are_isolated() {
        let store = SessionStore::new();
        store.get_or_create("a");
        store.get_or_create("b");
        store.append("a", Turn::user("only in a")).unwrap();

        assert_eq!(store.transcript("a").unwrap().len(), 1);
        assert!(store.transcript("b").unwrap().is_empty());
        assert_eq!(store.session_ids(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_turns_keep_order() {
        let store = SessionStore::new();
        store.get_or_create("s");
        for i in 0..10 {
            store.append("s", Turn::user(format!("m{}", i))).unwrap();
        }
        let contents: Vec<String> = store
            .transcript("s")
            .unwrap()
            .into_iter()
            .map(|t| t.content)
            .collect();
        let expected: Vec<String> = (0..10).map(|i| format!("m{}", i)).collect();
        assert_eq!(contents, expected);
    }

    #[test]
    fn test_concurrent_sessions_do_not_interfere() {
        let store = Arc::new(SessionStore::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let id = format!("session-{}", t);
                    store.get_or_create(&id);
                    for i in 0..50 {
                        store.append(&id, Turn::user(format!("{}-{}", t, i))).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.len(), 8);
        for t in 0..8 {
            let transcript = store.transcript(&format!("session-{}", t)).unwrap();
            assert_eq!(transcript.len(), 50);
            assert!(transcript
                .iter()
                .all(|turn| turn.content.starts_with(&format!("{}-", t))));
        }
    }
}
