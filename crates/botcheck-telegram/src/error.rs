use botcheck_proto::TransportError;
use thiserror::Error;

/// Result type alias for telegram operations.
pub type TelegramResult<T> = std::result::Result<T, TelegramError>;

/// Errors that can occur while talking to Telegram as a user.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// A required credential is missing from the environment.
    #[error("{0} is not set")]
    MissingCredential(&'static str),

    /// A credential is present but malformed.
    #[error("invalid value for {var}: {value}")]
    InvalidCredential { var: &'static str, value: String },

    /// Failed to load or save the session file.
    #[error("session file error: {0}")]
    Session(#[source] std::io::Error),

    /// Failed to reach Telegram.
    #[error("failed to connect to telegram: {0}")]
    Connect(String),

    /// Connecting took longer than the configured timeout.
    #[error("timed out connecting to telegram after {timeout_secs}s")]
    ConnectTimeout { timeout_secs: u64 },

    /// The session is not signed in.
    #[error("session is not authorized; run `botcheck login`")]
    NotAuthorized,

    /// The client was used before `connect()` or after `disconnect()`.
    #[error("telegram client is not connected")]
    NotConnected,

    /// A Telegram API call failed.
    #[error("telegram request failed: {0}")]
    Invocation(String),

    /// The username does not resolve to a chat.
    #[error("no chat found for username {0}")]
    UnknownUsername(String),

    /// Signing in failed.
    #[error("sign-in failed: {0}")]
    SignIn(String),

    /// Reading interactive input failed.
    #[error("failed to read input: {0}")]
    Prompt(#[source] std::io::Error),
}

impl From<TelegramError> for TransportError {
    fn from(err: TelegramError) -> Self {
        match err {
            TelegramError::NotAuthorized => TransportError::NotAuthorized,
            TelegramError::NotConnected => TransportError::NotConnected,
            TelegramError::UnknownUsername(name) => TransportError::TargetNotFound(name),
            TelegramError::Invocation(reason) => TransportError::Protocol(reason),
            other => TransportError::Connection(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_to_transport_errors() {
        assert_eq!(
            TransportError::from(TelegramError::NotAuthorized),
            TransportError::NotAuthorized
        );
        assert_eq!(
            TransportError::from(TelegramError::UnknownUsername("@ghost_bot".into())),
            TransportError::TargetNotFound("@ghost_bot".into())
        );
        assert!(matches!(
            TransportError::from(TelegramError::ConnectTimeout { timeout_secs: 20 }),
            TransportError::Connection(reason) if reason.contains("20s")
        ));
    }
}
