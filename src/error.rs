// src/error.rs
//! Cycle-scoped error taxonomy. Nothing here is fatal to the process:
//! every variant aborts the current poll cycle, leaves the cursor
//! untouched, and self-heals on the next scheduled tick.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PollError {
    /// Network failure, timeout, or non-2xx from a source API.
    #[error("{src}: transient fetch failure: {reason}")]
    Fetch { src: String, reason: String },

    /// Token exchange for the search-feed source did not succeed.
    #[error("{src}: authentication failed: {reason}")]
    Auth { src: String, reason: String },

    /// The notification channel rejected or failed a send.
    #[error("dispatch to {channel} failed: {reason}")]
    Dispatch { channel: String, reason: String },

    /// Malformed cursor value, or the cursor store itself failed.
    #[error("{src}: cursor error: {reason}")]
    Cursor { src: String, reason: String },
}

impl PollError {
    pub fn fetch(source: impl Into<String>, reason: impl ToString) -> Self {
        Self::Fetch {
            src: source.into(),
            reason: reason.to_string(),
        }
    }

    pub fn auth(source: impl Into<String>, reason: impl ToString) -> Self {
        Self::Auth {
            src: source.into(),
            reason: reason.to_string(),
        }
    }

    pub fn dispatch(channel: impl Into<String>, reason: impl ToString) -> Self {
        Self::Dispatch {
            channel: channel.into(),
            reason: reason.to_string(),
        }
    }

    pub fn cursor(source: impl Into<String>, reason: impl ToString) -> Self {
        Self::Cursor {
            src: source.into(),
            reason: reason.to_string(),
        }
    }

    /// Stable short tag for logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => "fetch",
            Self::Auth { .. } => "auth",
            Self::Dispatch { .. } => "dispatch",
            Self::Cursor { .. } => "cursor",
        }
    }
}
