use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{TelegramError, TelegramResult};

/// Credentials and session settings for the user-account client.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub api_id: i32,
    pub api_hash: String,
    pub session_file: PathBuf,
    pub connect_timeout: Duration,
}

impl TelegramConfig {
    /// Load configuration from environment variables.
    ///
    /// `TELEGRAM_API_ID` and `TELEGRAM_API_HASH` are required (`API_ID` and
    /// `API_HASH` are accepted as fallbacks).
    pub fn from_env() -> TelegramResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> TelegramResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |primary: &str, fallback: &str| {
            lookup(primary)
                .or_else(|| lookup(fallback))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_id = get("TELEGRAM_API_ID", "API_ID")
            .ok_or(TelegramError::MissingCredential("TELEGRAM_API_ID"))?;
        let api_id = api_id
            .parse()
            .map_err(|_| TelegramError::InvalidCredential {
                var: "TELEGRAM_API_ID",
                value: api_id.clone(),
            })?;

        let api_hash = get("TELEGRAM_API_HASH", "API_HASH")
            .ok_or(TelegramError::MissingCredential("TELEGRAM_API_HASH"))?;

        let session_file = lookup("TELEGRAM_SESSION_FILE")
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| PathBuf::from("sessions/tester.session"), PathBuf::from);

        let connect_timeout = lookup("TELEGRAM_CONNECT_TIMEOUT")
            .and_then(|s| s.trim().parse().ok())
            .map_or(Duration::from_secs(20), Duration::from_secs);

        Ok(Self {
            api_id,
            api_hash,
            session_file,
            connect_timeout,
        })
    }
}
