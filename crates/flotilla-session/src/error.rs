//! Error types for the session layer.

/// Errors that can occur while persisting or loading a session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Reading or writing the session file failed.
    #[error("session storage failed: {0}")]
    Storage(#[from] std::io::Error),

    /// The stored session could not be parsed. Treated as "not logged in"
    /// by callers, never as a fatal error.
    #[error("stored session is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}
