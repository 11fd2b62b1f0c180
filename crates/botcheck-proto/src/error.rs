use thiserror::Error;

/// Result type alias for transport operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Errors a conversation transport can surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Credential setup has not been completed for the underlying link.
    #[error("not authorized: run `botcheck login` to create a session first")]
    NotAuthorized,

    /// No reply arrived before the conversation deadline.
    #[error("no reply within {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The conversation target could not be resolved.
    #[error("conversation target not found: {0}")]
    TargetNotFound(String),

    /// The transport was used before `connect()` or after `disconnect()`.
    #[error("transport is not connected")]
    NotConnected,

    /// Network or link failure.
    #[error("connection error: {0}")]
    Connection(String),

    /// The remote side rejected or failed a request.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    /// Returns true if this error is a reply deadline expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }
}
