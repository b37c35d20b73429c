//! In-memory store implementation

use super::traits::*;
use crate::error::{CollaboratorError, CollaboratorResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;
use tracing::info;
use zappr_types::FrozenComment;

/// One call made against [`InMemoryPullRequestStore`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum StoreCall {
    GetPullRequest { repository_id: i64, number: u64 },
    GetOrCreatePullRequest { repository_id: i64, number: u64 },
    CreatePullRequest { repository_id: i64, number: u64 },
    AddCommit { repository_id: i64, number: u64 },
    DeletePullRequest { repository_id: i64, number: u64 },
    GetFrozenComments { pr_id: i64, since: DateTime<Utc> },
    AddFrozenComment { pr_id: i64, comment: FrozenComment },
    RemoveFrozenComments { pr_id: i64 },
}

impl StoreCall {
    fn name(&self) -> &'static str {
        match self {
            StoreCall::GetPullRequest { .. } => "get_pull_request",
            StoreCall::GetOrCreatePullRequest { .. } => "get_or_create_pull_request",
            StoreCall::CreatePullRequest { .. } => "create_pull_request",
            StoreCall::AddCommit { .. } => "add_commit",
            StoreCall::DeletePullRequest { .. } => "delete_pull_request",
            StoreCall::GetFrozenComments { .. } => "get_frozen_comments",
            StoreCall::AddFrozenComment { .. } => "add_frozen_comment",
            StoreCall::RemoveFrozenComments { .. } => "remove_frozen_comments",
        }
    }
}

/// In-memory record store for development and testing
#[derive(Debug)]
pub struct InMemoryPullRequestStore {
    records: RwLock<HashMap<(i64, u64), PullRequestRecord>>,
    frozen: RwLock<HashMap<i64, Vec<FrozenComment>>>,
    calls: RwLock<Vec<StoreCall>>,
    failing: RwLock<HashMap<&'static str, String>>,
    next_id: AtomicI64,
    /// `last_push` of records created by this store; `None` means now
    initial_push: Option<DateTime<Utc>>,
}

impl Default for InMemoryPullRequestStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPullRequestStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            frozen: RwLock::new(HashMap::new()),
            calls: RwLock::new(Vec::new()),
            failing: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            initial_push: None,
        }
    }

    /// Create records with a fixed `last_push` instead of the current time
    pub fn with_initial_push(mut self, last_push: DateTime<Utc>) -> Self {
        self.initial_push = Some(last_push);
        self
    }

    /// Insert a record as-is, replacing any existing one
    pub async fn insert(&self, record: PullRequestRecord) {
        let mut records = self.records.write().await;
        records.insert((record.repository_id, record.number), record);
    }

    /// Frozen comments of a record, regardless of age
    pub async fn frozen_comments(&self, pr_id: i64) -> Vec<FrozenComment> {
        self.frozen.read().await.get(&pr_id).cloned().unwrap_or_default()
    }

    pub async fn set_frozen_comments(&self, pr_id: i64, comments: Vec<FrozenComment>) {
        self.frozen.write().await.insert(pr_id, comments);
    }

    /// Make every call to `operation` fail with `message`
    pub async fn fail(&self, operation: &'static str, message: &str) {
        self.failing.write().await.insert(operation, message.to_string());
    }

    pub async fn calls(&self) -> Vec<StoreCall> {
        self.calls.read().await.clone()
    }

    pub async fn call_count(&self, operation: &str) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|call| call.name() == operation)
            .count()
    }

    async fn record(&self, call: StoreCall) -> CollaboratorResult<()> {
        let operation = call.name();
        self.calls.write().await.push(call);
        match self.failing.read().await.get(operation) {
            Some(message) => Err(CollaboratorError::Store(message.clone())),
            None => Ok(()),
        }
    }

    async fn new_record(&self, repository_id: i64, number: u64) -> PullRequestRecord {
        let record = PullRequestRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            repository_id,
            number,
            last_push: self.initial_push.unwrap_or_else(Utc::now),
        };
        let mut records = self.records.write().await;
        records.insert((repository_id, number), record.clone());
        info!(pr_id = record.id, repository_id, number, "Created pull request record");
        record
    }
}

#[async_trait]
impl PullRequestStore for InMemoryPullRequestStore {
    async fn get_pull_request(&self, repository_id: i64, number: u64) -> CollaboratorResult<Option<PullRequestRecord>> {
        self.record(StoreCall::GetPullRequest { repository_id, number }).await?;
        Ok(self.records.read().await.get(&(repository_id, number)).cloned())
    }

    async fn get_or_create_pull_request(&self, repository_id: i64, number: u64) -> CollaboratorResult<PullRequestRecord> {
        self.record(StoreCall::GetOrCreatePullRequest { repository_id, number })
            .await?;
        let existing = self.records.read().await.get(&(repository_id, number)).cloned();
        match existing {
            Some(record) => Ok(record),
            None => Ok(self.new_record(repository_id, number).await),
        }
    }

    async fn create_pull_request(&self, repository_id: i64, number: u64) -> CollaboratorResult<PullRequestRecord> {
        self.record(StoreCall::CreatePullRequest { repository_id, number }).await?;
        Ok(self.new_record(repository_id, number).await)
    }

    async fn add_commit(&self, repository_id: i64, number: u64) -> CollaboratorResult<()> {
        self.record(StoreCall::AddCommit { repository_id, number }).await?;
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(&(repository_id, number)) {
            record.last_push = Utc::now();
        }
        Ok(())
    }

    async fn delete_pull_request(&self, repository_id: i64, number: u64) -> CollaboratorResult<()> {
        self.record(StoreCall::DeletePullRequest { repository_id, number }).await?;
        let removed = self.records.write().await.remove(&(repository_id, number));
        if let Some(record) = removed {
            self.frozen.write().await.remove(&record.id);
            info!(pr_id = record.id, repository_id, number, "Deleted pull request record");
        }
        Ok(())
    }

    async fn get_frozen_comments(&self, pr_id: i64, since: DateTime<Utc>) -> CollaboratorResult<Vec<FrozenComment>> {
        self.record(StoreCall::GetFrozenComments { pr_id, since }).await?;
        let frozen = self.frozen.read().await;
        Ok(frozen
            .get(&pr_id)
            .map(|comments| comments.iter().filter(|c| c.created_at >= since).cloned().collect())
            .unwrap_or_default())
    }

    async fn add_frozen_comment(&self, pr_id: i64, comment: FrozenComment) -> CollaboratorResult<()> {
        self.record(StoreCall::AddFrozenComment {
            pr_id,
            comment: comment.clone(),
        })
        .await?;
        self.frozen.write().await.entry(pr_id).or_default().push(comment);
        Ok(())
    }

    async fn remove_frozen_comments(&self, pr_id: i64) -> CollaboratorResult<()> {
        self.record(StoreCall::RemoveFrozenComments { pr_id }).await?;
        self.frozen.write().await.remove(&pr_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use zappr_types::CommentId;

    fn frozen(id: u64, created_at: DateTime<Utc>) -> FrozenComment {
        FrozenComment {
            id: CommentId(id),
            body: ":-1:".to_string(),
            created_at,
            user: "foo".to_string(),
        }
    }

    #[tokio::test]
    async fn test_get_or_create_is_stable() {
        let store = InMemoryPullRequestStore::new();
        let first = store.get_or_create_pull_request(341, 1).await.unwrap();
        let second = store.get_or_create_pull_request(341, 1).await.unwrap();
        assert_eq!(first, second);

        let other = store.get_or_create_pull_request(341, 2).await.unwrap();
        assert_ne!(first.id, other.id);
    }

    #[tokio::test]
    async fn test_add_commit_advances_last_push() {
        let pushed = Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap();
        let store = InMemoryPullRequestStore::new().with_initial_push(pushed);
        store.create_pull_request(341, 1).await.unwrap();
        store.add_commit(341, 1).await.unwrap();

        let record = store.get_pull_request(341, 1).await.unwrap().unwrap();
        assert!(record.last_push > pushed);
    }

    #[tokio::test]
    async fn test_frozen_comments_filtered_by_since() {
        let store = InMemoryPullRequestStore::new();
        let old = Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap();
        let new = Utc.with_ymd_and_hms(2016, 6, 1, 0, 0, 0).unwrap();
        store.add_frozen_comment(7, frozen(1, old)).await.unwrap();
        store.add_frozen_comment(7, frozen(2, new)).await.unwrap();

        let since = Utc.with_ymd_and_hms(2016, 3, 1, 0, 0, 0).unwrap();
        let relevant = store.get_frozen_comments(7, since).await.unwrap();
        assert_eq!(relevant, vec![frozen(2, new)]);

        store.remove_frozen_comments(7).await.unwrap();
        assert!(store.frozen_comments(7).await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_drops_frozen_comments() {
        let store = InMemoryPullRequestStore::new();
        let record = store.create_pull_request(341, 3).await.unwrap();
        store.add_frozen_comment(record.id, frozen(1, Utc::now())).await.unwrap();

        store.delete_pull_request(341, 3).await.unwrap();
        assert!(store.get_pull_request(341, 3).await.unwrap().is_none());
        assert!(store.frozen_comments(record.id).await.is_empty());
        assert_eq!(store.call_count("delete_pull_request").await, 1);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = InMemoryPullRequestStore::new();
        store.fail("get_frozen_comments", "connection reset").await;
        let err = store.get_frozen_comments(1, Utc::now()).await.unwrap_err();
        assert_eq!(err, CollaboratorError::Store("connection reset".to_string()));
    }
}
