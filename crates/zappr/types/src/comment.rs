//! Pull request comments and frozen snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// GitHub issue comment identifier. Two comments are the same entity
/// across fetches iff their ids match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(pub u64);

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "comment:{}", self.0)
    }
}

/// A pull request comment as seen by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub body: String,
    /// Author login
    pub user: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Comment {
    pub fn new(
        id: u64,
        user: impl Into<String>,
        body: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CommentId(id),
            body: body.into(),
            user: user.into(),
            created_at,
            updated_at: None,
        }
    }

    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    /// A comment nobody has edited since it was posted. Comments without an
    /// `updated_at` are treated as untouched.
    pub fn is_pristine(&self) -> bool {
        self.updated_at.map_or(true, |updated| updated == self.created_at)
    }
}

/// Immutable snapshot of a comment's content taken when someone other than
/// its author edited or deleted it. Supersedes any later state of the same
/// comment id for tallying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrozenComment {
    pub id: CommentId,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub user: String,
}

impl From<&FrozenComment> for Comment {
    fn from(frozen: &FrozenComment) -> Self {
        Comment {
            id: frozen.id,
            body: frozen.body.clone(),
            user: frozen.user.clone(),
            created_at: frozen.created_at,
            updated_at: None,
        }
    }
}
