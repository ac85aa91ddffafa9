//! Connection lifecycle states.

use std::fmt;

/// Where the client is in its connection lifecycle.
///
/// Transitions are driven by the [`Client`](crate::Client): callers observe
/// states through [`Client::on_state_change`](crate::Client::on_state_change)
/// but never set them directly.
///
/// ```text
/// initializing → connecting → connected ⇄ reconnecting
///                    ↓            ↓            ↓
///                  error     disconnected    failed
///                              logged_out
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Constructed, no connection attempted yet.
    Initializing,
    /// First dial in progress.
    Connecting,
    /// Socket open, frames flowing.
    Connected,
    /// Lost the socket, retrying on a fixed delay.
    Reconnecting,
    /// Closed, either by the caller or by the server, with no retry pending.
    Disconnected,
    /// The last connect attempt failed.
    Error,
    /// Every reconnect attempt was exhausted. Terminal until the caller
    /// calls connect again.
    Failed,
    /// The caller logged out. The session is cleared and no reconnect will
    /// run; this is announced before the socket closes.
    LoggedOut,
}

impl ConnectionState {
    /// True for states where no further transition happens on its own.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Disconnected | Self::Failed | Self::LoggedOut
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initializing => "initializing",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
            Self::Failed => "failed",
            Self::LoggedOut => "logged_out",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_are_lowercase() {
        assert_eq!(ConnectionState::Initializing.to_string(), "initializing");
        assert_eq!(ConnectionState::Reconnecting.to_string(), "reconnecting");
        assert_eq!(ConnectionState::LoggedOut.to_string(), "logged_out");
    }

    #[test]
    fn test_terminal_states() {
        assert!(ConnectionState::Failed.is_terminal());
        assert!(ConnectionState::LoggedOut.is_terminal());
        assert!(ConnectionState::Disconnected.is_terminal());
        assert!(!ConnectionState::Connected.is_terminal());
        assert!(!ConnectionState::Reconnecting.is_terminal());
    }
}
