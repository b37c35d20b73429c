//! Commit status verdicts
//!
//! A [`Verdict`] serializes to the exact commit status payload GitHub
//! expects: `{"state", "description", "context"}`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Context under which every status is published
pub const STATUS_CONTEXT: &str = "zappr";

/// Commit status state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitState {
    Pending,
    Success,
    Failure,
    Error,
}

impl fmt::Display for CommitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CommitState::Pending => "pending",
            CommitState::Success => "success",
            CommitState::Failure => "failure",
            CommitState::Error => "error",
        };
        f.write_str(s)
    }
}

/// The computed commit status for a pull request head
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub state: CommitState,
    pub description: String,
    pub context: String,
}

impl Verdict {
    pub fn new(state: CommitState, description: impl Into<String>) -> Self {
        Self {
            state,
            description: description.into(),
            context: STATUS_CONTEXT.to_string(),
        }
    }

    pub fn pending(description: impl Into<String>) -> Self {
        Self::new(CommitState::Pending, description)
    }

    pub fn success(description: impl Into<String>) -> Self {
        Self::new(CommitState::Success, description)
    }

    pub fn failure(description: impl Into<String>) -> Self {
        Self::new(CommitState::Failure, description)
    }

    pub fn error(description: impl Into<String>) -> Self {
        Self::new(CommitState::Error, description)
    }
}
