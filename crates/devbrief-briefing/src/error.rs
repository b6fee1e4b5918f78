use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::types::Briefing;

/// Which collaborator call a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Generation,
    Evaluation,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Generation => f.write_str("generation"),
            Stage::Evaluation => f.write_str("evaluation"),
        }
    }
}

/// Failure of a generation or evaluation call.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The LLM API answered with a non-success status.
    #[error("LLM API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The LLM API answered but produced no text.
    #[error("LLM response contained no text")]
    EmptyResponse,

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid LLM base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// The evaluator returned a score outside `0..=10` or a non-finite one.
    #[error("evaluation score {0} is outside 0..=10")]
    InvalidScore(f64),

    #[error("{stage} call timed out after {after:?}")]
    Timeout { stage: Stage, after: Duration },

    #[error("{stage} call cancelled")]
    Cancelled { stage: Stage },

    /// Catch-all for collaborator implementations without a richer error.
    #[error("{stage} failed: {message}")]
    Failed { stage: Stage, message: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    #[error("approval threshold {0} is outside 0..=10")]
    ThresholdOutOfRange(f64),

    #[error("max attempts must be at least 1")]
    ZeroAttempts,
}

/// A run that stopped because a collaborator call failed.
///
/// Every attempt completed before the failure stays available in
/// `briefing`; `pending_draft` holds a draft that was generated but never
/// scored.
#[derive(Debug, Error)]
#[error(
    "briefing run {} aborted after {} completed attempt(s): {}",
    .briefing.run_id,
    .briefing.attempts().len(),
    .error
)]
pub struct RunAborted {
    pub briefing: Briefing,
    pub pending_draft: Option<String>,
    #[source]
    pub error: CollaboratorError,
}
