//! Store trait definitions

use crate::error::CollaboratorResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zappr_types::FrozenComment;

/// Persisted state of one pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRecord {
    pub id: i64,
    pub repository_id: i64,
    pub number: u64,
    /// Time of the most recent push; comments before it no longer count
    pub last_push: DateTime<Utc>,
}

/// Storage for pull request records and their frozen comments
#[async_trait]
pub trait PullRequestStore: Send + Sync {
    /// Get a record by repository and PR number
    async fn get_pull_request(&self, repository_id: i64, number: u64) -> CollaboratorResult<Option<PullRequestRecord>>;

    /// Get a record, creating it if missing
    async fn get_or_create_pull_request(&self, repository_id: i64, number: u64) -> CollaboratorResult<PullRequestRecord>;

    /// Create (or reset) the record of a newly opened PR
    async fn create_pull_request(&self, repository_id: i64, number: u64) -> CollaboratorResult<PullRequestRecord>;

    /// Record a push: `last_push` becomes now
    async fn add_commit(&self, repository_id: i64, number: u64) -> CollaboratorResult<()>;

    /// Delete a record together with its frozen comments
    async fn delete_pull_request(&self, repository_id: i64, number: u64) -> CollaboratorResult<()>;

    /// Frozen comments of a record whose comment was created at or after `since`
    async fn get_frozen_comments(&self, pr_id: i64, since: DateTime<Utc>) -> CollaboratorResult<Vec<FrozenComment>>;

    async fn add_frozen_comment(&self, pr_id: i64, comment: FrozenComment) -> CollaboratorResult<()>;

    async fn remove_frozen_comments(&self, pr_id: i64) -> CollaboratorResult<()>;
}
