use thiserror::Error;

/// Errors that can occur while decoding wire frames.
///
/// Encoding is infallible by construction, so only the decode direction has
/// an error type. There is deliberately no "unknown tag" variant — an
/// unrecognized tag decodes to [`crate::Message::Unknown`] so a newer peer
/// does not kill the read loop.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The buffer is not exactly one frame. The protocol has no length
    /// prefix, so a wrong-sized buffer cannot be resynchronized and must
    /// be dropped whole.
    #[error("invalid frame length: got {got} bytes, expected {expected}")]
    FrameLength { got: usize, expected: usize },
}
