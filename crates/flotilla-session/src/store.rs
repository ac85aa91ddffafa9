//! Token storage: where the issued JWT lives between connects.
//!
//! The token is written only when the server grants one (login, register)
//! and cleared only on logout or an explicit auth rejection. Nothing else
//! in the client mutates the store, so a reconnect can always re-present
//! whatever is here.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::SessionError;

/// A persisted login: the issued token plus enough metadata to decide
/// whether presenting it again is worthwhile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    /// The JWT issued by the server, stored verbatim.
    pub token: String,
    /// Username the token was issued for.
    pub username: String,
    /// Unix seconds after which the token is dead, if known. The token is
    /// opaque to the client, so this is recorded at save time from the
    /// server's stated lifetime rather than parsed out of the JWT.
    pub expires_at: Option<u64>,
}

impl StoredSession {
    /// Creates a session with no known expiry.
    pub fn new(token: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            username: username.into(),
            expires_at: None,
        }
    }

    /// True once the recorded expiry has passed. A session with no
    /// recorded expiry never reports expired — the server is the judge.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(at) => now_unix() >= at,
            None => false,
        }
    }

    /// True when the token is expired or dies within `leeway`. Callers
    /// inside that window should re-authenticate with credentials instead
    /// of presenting a token that will die mid-game.
    pub fn is_near_expiry(&self, leeway: Duration) -> bool {
        match self.expires_at {
            Some(at) => now_unix() + leeway.as_secs() >= at,
            None => false,
        }
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Where a [`StoredSession`] lives between runs.
///
/// The client only ever calls three things: load on startup, save on a
/// successful auth, clear on logout. Implementations must make a missing
/// session an `Ok(None)`, not an error — "not logged in" is a normal state.
pub trait TokenStore: Send + Sync + 'static {
    /// Loads the persisted session, if any.
    fn load(&self) -> Result<Option<StoredSession>, SessionError>;

    /// Persists a session, replacing any previous one.
    fn save(&self, session: &StoredSession) -> Result<(), SessionError>;

    /// Removes the persisted session. Clearing an empty store is fine.
    fn clear(&self) -> Result<(), SessionError>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Keeps the session in process memory. For tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryTokenStore {
    session: Mutex<Option<StoredSession>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<StoredSession>, SessionError> {
        Ok(self.session.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn save(&self, session: &StoredSession) -> Result<(), SessionError> {
        *self.session.lock().unwrap_or_else(|e| e.into_inner()) =
            Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        *self.session.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

/// Persists the session as a JSON file.
///
/// A missing file loads as `None`; a corrupt file loads as an error so the
/// caller can decide to discard it (the client treats both as logged out).
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<StoredSession>, SessionError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let session = serde_json::from_str(&raw)?;
        Ok(Some(session))
    }

    fn save(&self, session: &StoredSession) -> Result<(), SessionError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let raw = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, raw)?;
        tracing::debug!(path = %self.path.display(), "session saved");
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_session_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("flotilla-session-test-{name}-{}", std::process::id()))
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryTokenStore::new();
        assert!(store.load().unwrap().is_none());

        let session = StoredSession::new("jwt-abc", "captain");
        store.save(&session).unwrap();
        assert_eq!(store.load().unwrap(), Some(session));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_file_store_round_trip() {
        let path = temp_session_path("round-trip");
        let store = FileTokenStore::new(&path);

        assert!(store.load().unwrap().is_none());

        let mut session = StoredSession::new("jwt-xyz", "captain");
        session.expires_at = Some(4_000_000_000);
        store.save(&session).unwrap();
        assert_eq!(store.load().unwrap(), Some(session));

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        // Clearing twice is not an error.
        store.clear().unwrap();
    }

    #[test]
    fn test_file_store_corrupt_file_is_an_error_not_a_panic() {
        let path = temp_session_path("corrupt");
        std::fs::write(&path, "not json {").unwrap();
        let store = FileTokenStore::new(&path);
        assert!(matches!(store.load(), Err(SessionError::Corrupt(_))));
        store.clear().unwrap();
    }

    #[test]
    fn test_save_replaces_previous_session() {
        let store = MemoryTokenStore::new();
        store.save(&StoredSession::new("old", "alice")).unwrap();
        store.save(&StoredSession::new("new", "alice")).unwrap();
        assert_eq!(store.load().unwrap().unwrap().token, "new");
    }

    #[test]
    fn test_expiry_checks() {
        let leeway = Duration::from_secs(60);
        let mut session = StoredSession::new("t", "u");
        assert!(!session.is_expired());
        assert!(!session.is_near_expiry(leeway));

        session.expires_at = Some(0);
        assert!(session.is_expired());
        assert!(session.is_near_expiry(leeway));

        session.expires_at = Some(u64::MAX);
        assert!(!session.is_expired());
        assert!(!session.is_near_expiry(leeway));

        // Inside the leeway window: usable but due for refresh.
        session.expires_at = Some(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_secs()
                + 30,
        );
        assert!(!session.is_expired());
        assert!(session.is_near_expiry(leeway));
        assert!(!session.is_near_expiry(Duration::from_secs(5)));
    }
}
