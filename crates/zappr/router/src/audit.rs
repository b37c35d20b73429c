//! Audit trail of published verdicts
//!
//! Every evaluation logs the status it is about to publish together with
//! the tally behind it; merges are logged when the PR record is dropped.

use crate::error::{CollaboratorError, CollaboratorResult};
use crate::github::RepoRef;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;
use zappr_types::{Tally, Verdict};

/// What happened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventKind {
    CommitStatusUpdate {
        sha: String,
        status: Verdict,
        tally: Tally,
    },
    PullRequestMerged {
        sha: String,
    },
}

/// One audit log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub repository: RepoRef,
    pub pull_request: u64,
    #[serde(flatten)]
    pub kind: AuditEventKind,
}

impl AuditEvent {
    pub fn new(repository: RepoRef, pull_request: u64, kind: AuditEventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            repository,
            pull_request,
            kind,
        }
    }

    pub fn commit_status_update(
        repository: RepoRef,
        pull_request: u64,
        sha: impl Into<String>,
        status: Verdict,
        tally: Tally,
    ) -> Self {
        Self::new(
            repository,
            pull_request,
            AuditEventKind::CommitStatusUpdate {
                sha: sha.into(),
                status,
                tally,
            },
        )
    }

    pub fn pull_request_merged(repository: RepoRef, pull_request: u64, sha: impl Into<String>) -> Self {
        Self::new(repository, pull_request, AuditEventKind::PullRequestMerged { sha: sha.into() })
    }
}

/// Destination of audit events
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn log(&self, event: AuditEvent) -> CollaboratorResult<()>;
}

/// Keeps audit events in memory
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    events: RwLock<Vec<AuditEvent>>,
    failure: RwLock<Option<String>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every subsequent event with `message`
    pub async fn fail_with(&self, message: &str) {
        *self.failure.write().await = Some(message.to_string());
    }

    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn log(&self, event: AuditEvent) -> CollaboratorResult<()> {
        if let Some(message) = self.failure.read().await.as_ref() {
            return Err(CollaboratorError::Audit(message.clone()));
        }
        self.events.write().await.push(event);
        Ok(())
    }
}
