//! Error types for the client.

/// Errors surfaced by [`Client`](crate::Client) operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The client has no open connection. Sends are rejected rather than
    /// queued; the caller decides whether to wait for a reconnect.
    #[error("not connected")]
    NotConnected,

    /// The transport failed to dial, send, or receive.
    #[error("transport error: {0}")]
    Transport(#[from] flotilla_transport::TransportError),

    /// A frame could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] flotilla_protocol::ProtocolError),

    /// Session persistence failed.
    #[error("session error: {0}")]
    Session(#[from] flotilla_session::SessionError),

    /// The server did not answer a request within the configured timeout.
    #[error("timed out waiting for server reply")]
    Timeout,

    /// The server rejected the credentials, with its stated reason.
    #[error("authentication rejected: {0}")]
    AuthRejected(String),
}
