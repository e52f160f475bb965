//! Error taxonomy shared by the client, the store, the session controller and
//! the rendering pipeline.
//!
//! `Display` output for every variant is a normalized, human-readable summary.
//! Raw backend or transport text is kept in `detail` fields for logging and is
//! never part of the summary.

use std::path::PathBuf;
use thiserror::Error;

/// A single converse or tool call failed. The session stays usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("the answering service could not be reached")]
    Transport { detail: String },

    #[error("the answering service did not respond in time")]
    Timeout,

    #[error("the answering service returned HTTP {status}")]
    Status { status: u16, detail: Option<String> },

    #[error("the answering service returned an unreadable response")]
    Malformed { detail: String },

    #[error("the answering service returned an empty response")]
    Empty,

    #[error("the answering service reported an error")]
    Backend { detail: String },

    #[error("arguments for tool '{tool}' are invalid: {detail}")]
    InvalidArguments { tool: String, detail: String },
}

impl RequestError {
    pub(crate) fn transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            RequestError::Timeout
        } else {
            RequestError::Transport {
                detail: err.to_string(),
            }
        }
    }

    /// Raw text that explains the failure, for logs only.
    pub fn detail(&self) -> Option<&str> {
        match self {
            RequestError::Transport { detail }
            | RequestError::Malformed { detail }
            | RequestError::Backend { detail }
            | RequestError::InvalidArguments { detail, .. } => Some(detail),
            RequestError::Status { detail, .. } => detail.as_deref(),
            RequestError::Timeout | RequestError::Empty => None,
        }
    }

    /// Text stored as the content of the synthetic assistant turn.
    pub fn user_message(&self) -> String {
        format!("⚠️ No answer this time: {self}. Send your message again to retry.")
    }
}

/// Discovery or liveness failed; the session cannot be used until
/// `initialize()` succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("capability discovery failed: {0}")]
    Discovery(#[source] RequestError),

    #[error("the answering service did not pass its health check")]
    Unhealthy,

    #[error("the answering service does not offer any models")]
    NoModels,
}

/// An operation outside the turn flow was refused or failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("the session is not connected")]
    NotReady,

    #[error(transparent)]
    Request(#[from] RequestError),
}

/// Rendering one assistant turn failed; only that turn's display is affected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("could not highlight {language} code: {message}")]
    Highlight { language: String, message: String },

    #[error("content nests {depth} blocks deep (limit {limit})")]
    NestingTooDeep { depth: usize, limit: usize },

    #[error("renderer failed: {0}")]
    Internal(String),
}

/// Reading or writing the persisted conversation failed. Logged and
/// swallowed by the session controller.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode conversation: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode conversation at {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported conversation record version {0}")]
    UnsupportedVersion(u32),
}
