//! Scenario outcomes.

use std::time::Duration;

use botcheck_proto::TransportError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event_log::REPLY_PREVIEW_CHARS;
use crate::flow::FlowError;
use crate::text::truncate_chars;

/// Why a scenario stopped early. Every variant is fatal to its scenario.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureKind {
    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error("button '{label}' not found")]
    ButtonNotFound { label: String },

    #[error("reply has no buttons to press '{label}'")]
    NoButtons { label: String },

    #[error("button step names no quoted label")]
    MissingButtonLabel,

    #[error("timed out waiting for a reply after {timeout_secs}s")]
    ReplyTimeout { timeout_secs: u64 },

    #[error("expected: {expected} | got: {}", truncate_chars(.actual, REPLY_PREVIEW_CHARS))]
    ReplyMismatch { expected: String, actual: String },

    #[error("transport fault: {0}")]
    Transport(TransportError),

    #[error("UNTIL_REPLY retry budget of {limit} exhausted")]
    RetryBudgetExhausted { limit: usize },
}

impl From<TransportError> for FailureKind {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout { timeout_secs } => FailureKind::ReplyTimeout { timeout_secs },
            other => FailureKind::Transport(other),
        }
    }
}

/// A fatal failure, located at the step where it happened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}")]
pub struct ScenarioFailure {
    /// Ordinal of the failing step; `None` when the conversation could not be opened.
    pub step: Option<i64>,
    /// The failing step's error label.
    pub error_label: Option<String>,
    pub kind: FailureKind,
}

impl ScenarioFailure {
    pub fn at_step(step: i64, error_label: &str, kind: impl Into<FailureKind>) -> Self {
        Self {
            step: Some(step),
            error_label: Some(error_label.to_string()),
            kind: kind.into(),
        }
    }

    pub fn before_steps(kind: impl Into<FailureKind>) -> Self {
        Self {
            step: None,
            error_label: None,
            kind: kind.into(),
        }
    }
}

/// Serializable summary of a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReport {
    pub step: Option<i64>,
    pub error_label: Option<String>,
    pub reason: String,
}

impl From<&ScenarioFailure> for FailureReport {
    fn from(failure: &ScenarioFailure) -> Self {
        Self {
            step: failure.step,
            error_label: failure.error_label.clone(),
            reason: failure.kind.to_string(),
        }
    }
}

/// Result of running one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReport>,
    /// Interpreter iterations, directives included.
    pub steps_executed: usize,
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

/// Serde helper for Duration serialization.
pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(secs))
    }
}
