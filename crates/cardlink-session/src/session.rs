//! The session token: the one piece of state a client keeps across
//! restarts.
//!
//! When the server accepts an `openSession`, it replies with a session id.
//! Presenting that id on the next connection lets the server put the player
//! back into the game they were in, even after the process restarted.

use std::sync::Arc;

use crate::{KeyValueStore, SessionError};

/// The well-known key the token is stored under.
pub const DEFAULT_SESSION_KEY: &str = "isa_game_session_id";

/// Reads and writes the session token through a [`KeyValueStore`].
///
/// Cheap to clone; clones share the same backing store.
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn KeyValueStore>,
    key: String,
}

impl SessionStore {
    /// A session store using [`DEFAULT_SESSION_KEY`].
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_key(store, DEFAULT_SESSION_KEY)
    }

    pub fn with_key(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The persisted token, if any. An empty stored value counts as none.
    pub fn load(&self) -> Result<Option<String>, SessionError> {
        Ok(self.store.get(&self.key)?.filter(|token| !token.is_empty()))
    }

    /// Persists `session_id`, replacing any earlier token.
    pub fn save(&self, session_id: &str) -> Result<(), SessionError> {
        self.store.set(&self.key, session_id)?;
        tracing::debug!(key = %self.key, "session token saved");
        Ok(())
    }

    /// Forgets the token so the next connection starts a fresh session.
    pub fn clear(&self) -> Result<(), SessionError> {
        self.store.remove(&self.key)
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").field("key", &self.key).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FileStore, MemoryStore};

    #[test]
    fn test_session_store_load_empty_is_none() {
        let sessions = SessionStore::new(Arc::new(MemoryStore::new()));
        assert_eq!(sessions.load().unwrap(), None);
    }

    #[test]
    fn test_session_store_save_then_load() {
        let backing = Arc::new(MemoryStore::new());
        let sessions = SessionStore::new(backing.clone());
        sessions.save("sess-1").unwrap();

        assert_eq!(sessions.load().unwrap().as_deref(), Some("sess-1"));
        assert_eq!(backing.get(DEFAULT_SESSION_KEY).unwrap().as_deref(), Some("sess-1"));
    }

    #[test]
    fn test_session_store_empty_value_is_none() {
        let backing = Arc::new(MemoryStore::new());
        backing.set(DEFAULT_SESSION_KEY, "").unwrap();
        assert_eq!(SessionStore::new(backing).load().unwrap(), None);
    }

    #[test]
    fn test_session_store_clear() {
        let sessions = SessionStore::new(Arc::new(MemoryStore::new()));
        sessions.save("sess-1").unwrap();
        sessions.clear().unwrap();
        assert_eq!(sessions.load().unwrap(), None);
    }

    #[test]
    fn test_session_store_custom_key() {
        let backing = Arc::new(MemoryStore::new());
        let sessions = SessionStore::with_key(backing.clone(), "other");
        sessions.save("x").unwrap();
        assert_eq!(backing.get("other").unwrap().as_deref(), Some("x"));
        assert_eq!(backing.get(DEFAULT_SESSION_KEY).unwrap(), None);
    }

    #[test]
    fn test_session_store_survives_restart_with_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        SessionStore::new(Arc::new(FileStore::new(&path))).save("sess-9").unwrap();

        let restarted = SessionStore::new(Arc::new(FileStore::new(&path)));
        assert_eq!(restarted.load().unwrap().as_deref(), Some("sess-9"));
    }
}
