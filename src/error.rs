//! Error taxonomy for the agent.
//!
//! A missing or unreadable state document is deliberately *not* an error:
//! readers get `Ok(None)` and fall back to an empty default, because a fresh
//! repository has no state yet. Everything that is an error falls into one of
//! the variants below. `ModelResponseFormat` keeps the raw model output so a
//! bad reply can be diagnosed after the fact.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    /// The model's reply could not be parsed into the expected JSON shape.
    /// Fatal to the current operation; no mutation is performed.
    #[error("model response format error: {reason}")]
    ModelResponseFormat { reason: String, raw: String },

    /// A single file write/delete failed while applying a task. The task is
    /// aborted at this file; earlier writes in the same task stay committed.
    #[error("file operation failed for '{path}': {reason}")]
    FileOperation { path: String, reason: String },

    /// An optional collaborator (search, deploy) is unreachable. Callers
    /// degrade to a textual notice instead of failing the surrounding flow.
    #[error("external service unavailable: {0}")]
    ServiceUnavailable(String),

    /// The remote file host rejected a request (auth, conflict, rate limit).
    #[error("remote host error ({status}): {message}")]
    Host { status: u16, message: String },

    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AgentError {
    /// Shorthand for a model-format failure, retaining the raw reply.
    pub fn bad_model_response(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::ModelResponseFormat {
            reason: reason.into(),
            raw: raw.into(),
        }
    }

    /// Shorthand for a per-file failure during task application.
    pub fn file_op(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FileOperation {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
