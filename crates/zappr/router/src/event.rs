//! GitHub webhook events understood by the approval check
//!
//! Payloads are deserialized into the subset of GitHub's JSON the check
//! needs. Actions form a closed set; anything the check does not react to
//! maps to a `Skip` variant instead of an error.

use crate::error::{RouterError, RouterResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zappr_approval::{CommentChange, CommentEdit};
use zappr_types::Comment;

/// `X-GitHub-Event` value for pull request events
pub const PULL_REQUEST: &str = "pull_request";
/// `X-GitHub-Event` value for issue and pull request comments
pub const ISSUE_COMMENT: &str = "issue_comment";

// ── Payload model ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub login: String,
}

impl User {
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub owner: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PullRequestState {
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Head {
    pub sha: String,
}

/// A pull request as carried by webhooks and returned by the GitHub API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub state: PullRequestState,
    /// The opener
    pub user: User,
    pub head: Head,
    #[serde(default)]
    pub merged: bool,
}

impl PullRequest {
    pub fn is_open(&self) -> bool {
        self.state == PullRequestState::Open
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestPayload {
    pub action: String,
    pub number: u64,
    pub repository: Repository,
    pub pull_request: PullRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
}

/// Comment as carried by `issue_comment` webhooks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentPayload {
    pub id: u64,
    #[serde(default)]
    pub body: String,
    pub user: User,
    /// Required: frozen snapshots are dated by it
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CommentPayload {
    pub fn to_comment(&self) -> Comment {
        let comment = Comment::new(self.id, self.user.login.clone(), self.body.clone(), self.created_at);
        match self.updated_at {
            Some(updated_at) => comment.with_updated_at(updated_at),
            None => comment,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyChange {
    pub from: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changes {
    #[serde(default)]
    pub body: Option<BodyChange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCommentPayload {
    pub action: String,
    pub repository: Repository,
    pub issue: Issue,
    pub comment: CommentPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<Changes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<User>,
}

impl IssueCommentPayload {
    /// The edit/delete described by this payload. Without a `sender` the
    /// change is attributed to the comment author.
    pub fn comment_edit(&self, action: &CommentAction) -> Option<CommentEdit> {
        let change = match action {
            CommentAction::Edited => CommentChange::Edited {
                previous_body: self
                    .changes
                    .as_ref()
                    .and_then(|c| c.body.as_ref())
                    .map(|b| b.from.clone()),
            },
            CommentAction::Deleted => CommentChange::Deleted,
            CommentAction::Created | CommentAction::Skip(_) => return None,
        };
        let sender = self
            .sender
            .as_ref()
            .map_or_else(|| self.comment.user.login.clone(), |s| s.login.clone());
        Some(CommentEdit {
            change,
            comment: self.comment.to_comment(),
            sender,
        })
    }
}

// ── Actions ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullRequestAction {
    Opened,
    Reopened,
    Synchronize,
    Labeled,
    Unlabeled,
    /// `closed` with `merged: true`
    Merged,
    /// Anything else, including a plain `closed`
    Skip(String),
}

impl PullRequestAction {
    fn from_payload(payload: &PullRequestPayload) -> Self {
        match payload.action.as_str() {
            "opened" => Self::Opened,
            "reopened" => Self::Reopened,
            "synchronize" => Self::Synchronize,
            "labeled" => Self::Labeled,
            "unlabeled" => Self::Unlabeled,
            "closed" if payload.pull_request.merged => Self::Merged,
            other => Self::Skip(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentAction {
    Created,
    Edited,
    Deleted,
    Skip(String),
}

impl CommentAction {
    fn parse(action: &str) -> Self {
        match action {
            "created" => Self::Created,
            "edited" => Self::Edited,
            "deleted" => Self::Deleted,
            other => Self::Skip(other.to_string()),
        }
    }
}

// ── Event ──────────────────────────────────────────────────────────────

/// A webhook delivery the approval check may react to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    PullRequest {
        action: PullRequestAction,
        payload: PullRequestPayload,
    },
    IssueComment {
        action: CommentAction,
        payload: IssueCommentPayload,
    },
    /// An event type the check does not handle
    Unsupported(String),
}

impl WebhookEvent {
    /// Build an event from the `X-GitHub-Event` name and the JSON body
    pub fn parse(event: &str, payload: serde_json::Value) -> RouterResult<Self> {
        let invalid = |source| RouterError::Payload {
            event: event.to_string(),
            source,
        };
        match event {
            PULL_REQUEST => {
                let payload: PullRequestPayload = serde_json::from_value(payload).map_err(invalid)?;
                Ok(Self::PullRequest {
                    action: PullRequestAction::from_payload(&payload),
                    payload,
                })
            }
            ISSUE_COMMENT => {
                let payload: IssueCommentPayload = serde_json::from_value(payload).map_err(invalid)?;
                Ok(Self::IssueComment {
                    action: CommentAction::parse(&payload.action),
                    payload,
                })
            }
            other => Ok(Self::Unsupported(other.to_string())),
        }
    }

    pub fn repository(&self) -> Option<&Repository> {
        match self {
            Self::PullRequest { payload, .. } => Some(&payload.repository),
            Self::IssueComment { payload, .. } => Some(&payload.repository),
            Self::Unsupported(_) => None,
        }
    }
}
