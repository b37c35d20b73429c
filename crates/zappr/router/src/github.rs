//! GitHub integration: trait and simulated implementation.
//!
//! The `VcsClient` trait is everything the approval check needs from the
//! GitHub API: reading comments, labels and changed files, resolving
//! organization membership, and publishing commit statuses and comment
//! edits. `SimulatedGitHub` serves canned data and records every call, for
//! tests and for the `zappr-eval` dry run.

use crate::error::{CollaboratorError, CollaboratorResult};
use crate::event::{PullRequest, Repository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tokio::sync::RwLock;
use tracing::debug;
use zappr_types::{Comment, CommentId, Verdict};

/// Owner and name of a repository
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl From<&Repository> for RepoRef {
    fn from(repository: &Repository) -> Self {
        Self::new(repository.owner.login.clone(), repository.name.clone())
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

// ── VcsClient Trait ────────────────────────────────────────────────────

/// GitHub operations used by the approval check.
#[async_trait]
pub trait VcsClient: Send + Sync {
    /// Issue comments created or updated at or after `since`, oldest first
    async fn get_comments(
        &self,
        repo: &RepoRef,
        number: u64,
        since: DateTime<Utc>,
        token: &str,
    ) -> CollaboratorResult<Vec<Comment>>;

    /// `None` if the pull request does not exist
    async fn get_pull_request(
        &self,
        repo: &RepoRef,
        number: u64,
        token: &str,
    ) -> CollaboratorResult<Option<PullRequest>>;

    async fn get_issue_labels(&self, repo: &RepoRef, number: u64, token: &str) -> CollaboratorResult<Vec<String>>;

    /// Paths of the files changed by the pull request
    async fn get_pull_request_files(
        &self,
        repo: &RepoRef,
        number: u64,
        token: &str,
    ) -> CollaboratorResult<Vec<String>>;

    async fn is_member_of_org(&self, org: &str, user: &str, token: &str) -> CollaboratorResult<bool>;

    async fn is_collaborator(&self, repo: &RepoRef, user: &str, token: &str) -> CollaboratorResult<bool>;

    /// Login of whoever authored the last commit, if known
    async fn fetch_last_committer(
        &self,
        repo: &RepoRef,
        number: u64,
        token: &str,
    ) -> CollaboratorResult<Option<String>>;

    async fn set_commit_status(
        &self,
        repo: &RepoRef,
        sha: &str,
        status: &Verdict,
        token: &str,
    ) -> CollaboratorResult<()>;

    async fn set_issue_comment_body(
        &self,
        repo: &RepoRef,
        issue_number: u64,
        comment_id: CommentId,
        body: &str,
        token: &str,
    ) -> CollaboratorResult<()>;
}

// ── Recorded calls ─────────────────────────────────────────────────────

/// One call made against [`SimulatedGitHub`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum VcsCall {
    GetComments {
        repo: RepoRef,
        number: u64,
        since: DateTime<Utc>,
        token: String,
    },
    GetPullRequest {
        repo: RepoRef,
        number: u64,
        token: String,
    },
    GetIssueLabels {
        number: u64,
    },
    GetPullRequestFiles {
        number: u64,
    },
    IsMemberOfOrg {
        org: String,
        user: String,
    },
    IsCollaborator {
        user: String,
    },
    FetchLastCommitter {
        number: u64,
    },
    SetCommitStatus {
        repo: RepoRef,
        sha: String,
        status: Verdict,
        token: String,
    },
    SetIssueCommentBody {
        repo: RepoRef,
        issue_number: u64,
        comment_id: CommentId,
        body: String,
        token: String,
    },
}

impl VcsCall {
    fn name(&self) -> &'static str {
        match self {
            VcsCall::GetComments { .. } => "get_comments",
            VcsCall::GetPullRequest { .. } => "get_pull_request",
            VcsCall::GetIssueLabels { .. } => "get_issue_labels",
            VcsCall::GetPullRequestFiles { .. } => "get_pull_request_files",
            VcsCall::IsMemberOfOrg { .. } => "is_member_of_org",
            VcsCall::IsCollaborator { .. } => "is_collaborator",
            VcsCall::FetchLastCommitter { .. } => "fetch_last_committer",
            VcsCall::SetCommitStatus { .. } => "set_commit_status",
            VcsCall::SetIssueCommentBody { .. } => "set_issue_comment_body",
        }
    }
}

// ── Fixture ────────────────────────────────────────────────────────────

/// The GitHub side of a scenario, as loaded by `zappr-eval`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitHubFixture {
    #[serde(default)]
    pub pull_requests: Vec<PullRequest>,
    /// Comments per pull request number
    #[serde(default)]
    pub comments: HashMap<u64, Vec<Comment>>,
    #[serde(default)]
    pub labels: HashMap<u64, Vec<String>>,
    #[serde(default)]
    pub files: HashMap<u64, Vec<String>>,
    /// Members per organization
    #[serde(default)]
    pub org_members: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub collaborators: Vec<String>,
    #[serde(default)]
    pub last_committer: Option<String>,
}

// ── Simulated GitHub ───────────────────────────────────────────────────

#[derive(Debug, Default)]
struct GitHubState {
    pull_requests: HashMap<u64, PullRequest>,
    comments: HashMap<u64, Vec<Comment>>,
    labels: HashMap<u64, Vec<String>>,
    files: HashMap<u64, Vec<String>>,
    org_members: HashSet<(String, String)>,
    collaborators: HashSet<String>,
    last_committer: Option<String>,
    failing: HashMap<&'static str, String>,
}

/// A simulated GitHub for testing.
///
/// Serves whatever was loaded into it and records every call, in order.
#[derive(Debug, Default)]
pub struct SimulatedGitHub {
    state: RwLock<GitHubState>,
    calls: RwLock<Vec<VcsCall>>,
}

impl SimulatedGitHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: GitHubFixture) -> Self {
        let state = GitHubState {
            pull_requests: fixture
                .pull_requests
                .into_iter()
                .map(|pr| (pr.number, pr))
                .collect(),
            comments: fixture.comments,
            labels: fixture.labels,
            files: fixture.files,
            org_members: fixture
                .org_members
                .into_iter()
                .flat_map(|(org, users)| users.into_iter().map(move |user| (org.clone(), user)))
                .collect(),
            collaborators: fixture.collaborators.into_iter().collect(),
            last_committer: fixture.last_committer,
            failing: HashMap::new(),
        };
        Self {
            state: RwLock::new(state),
            calls: RwLock::new(Vec::new()),
        }
    }

    pub async fn add_pull_request(&self, pull_request: PullRequest) {
        let mut state = self.state.write().await;
        state.pull_requests.insert(pull_request.number, pull_request);
    }

    /// Replace the comments of a pull request
    pub async fn set_comments(&self, number: u64, comments: Vec<Comment>) {
        self.state.write().await.comments.insert(number, comments);
    }

    pub async fn set_labels(&self, number: u64, labels: &[&str]) {
        let labels = labels.iter().map(|l| l.to_string()).collect();
        self.state.write().await.labels.insert(number, labels);
    }

    pub async fn set_files(&self, number: u64, files: &[&str]) {
        let files = files.iter().map(|f| f.to_string()).collect();
        self.state.write().await.files.insert(number, files);
    }

    pub async fn add_org_member(&self, org: &str, user: &str) {
        let mut state = self.state.write().await;
        state.org_members.insert((org.to_string(), user.to_string()));
    }

    pub async fn add_collaborator(&self, user: &str) {
        self.state.write().await.collaborators.insert(user.to_string());
    }

    pub async fn set_last_committer(&self, user: &str) {
        self.state.write().await.last_committer = Some(user.to_string());
    }

    /// Make every call to `operation` fail with `message`
    pub async fn fail(&self, operation: &'static str, message: &str) {
        let mut state = self.state.write().await;
        state.failing.insert(operation, message.to_string());
    }

    /// All calls so far, in order
    pub async fn calls(&self) -> Vec<VcsCall> {
        self.calls.read().await.clone()
    }

    /// Number of calls made to `operation`
    pub async fn call_count(&self, operation: &str) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|call| call.name() == operation)
            .count()
    }

    /// Statuses posted so far, in order
    pub async fn statuses(&self) -> Vec<Verdict> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|call| match call {
                VcsCall::SetCommitStatus { status, .. } => Some(status.clone()),
                _ => None,
            })
            .collect()
    }

    /// Comment bodies written so far, in order
    pub async fn comment_edits(&self) -> Vec<(CommentId, String)> {
        self.calls
            .read()
            .await
            .iter()
            .filter_map(|call| match call {
                VcsCall::SetIssueCommentBody { comment_id, body, .. } => Some((*comment_id, body.clone())),
                _ => None,
            })
            .collect()
    }

    pub async fn clear_calls(&self) {
        self.calls.write().await.clear();
    }

    async fn record(&self, call: VcsCall) -> CollaboratorResult<()> {
        let operation = call.name();
        debug!(operation, "Simulated GitHub call");
        self.calls.write().await.push(call);
        match self.state.read().await.failing.get(operation) {
            Some(message) => Err(CollaboratorError::Vcs(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl VcsClient for SimulatedGitHub {
    async fn get_comments(
        &self,
        repo: &RepoRef,
        number: u64,
        since: DateTime<Utc>,
        token: &str,
    ) -> CollaboratorResult<Vec<Comment>> {
        self.record(VcsCall::GetComments {
            repo: repo.clone(),
            number,
            since,
            token: token.to_string(),
        })
        .await?;
        let state = self.state.read().await;
        Ok(state
            .comments
            .get(&number)
            .map(|comments| {
                comments
                    .iter()
                    .filter(|c| c.updated_at.unwrap_or(c.created_at) >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_pull_request(
        &self,
        repo: &RepoRef,
        number: u64,
        token: &str,
    ) -> CollaboratorResult<Option<PullRequest>> {
        self.record(VcsCall::GetPullRequest {
            repo: repo.clone(),
            number,
            token: token.to_string(),
        })
        .await?;
        Ok(self.state.read().await.pull_requests.get(&number).cloned())
    }

    async fn get_issue_labels(&self, _repo: &RepoRef, number: u64, _token: &str) -> CollaboratorResult<Vec<String>> {
        self.record(VcsCall::GetIssueLabels { number }).await?;
        Ok(self.state.read().await.labels.get(&number).cloned().unwrap_or_default())
    }

    async fn get_pull_request_files(
        &self,
        _repo: &RepoRef,
        number: u64,
        _token: &str,
    ) -> CollaboratorResult<Vec<String>> {
        self.record(VcsCall::GetPullRequestFiles { number }).await?;
        Ok(self.state.read().await.files.get(&number).cloned().unwrap_or_default())
    }

    async fn is_member_of_org(&self, org: &str, user: &str, _token: &str) -> CollaboratorResult<bool> {
        self.record(VcsCall::IsMemberOfOrg {
            org: org.to_string(),
            user: user.to_string(),
        })
        .await?;
        let state = self.state.read().await;
        Ok(state.org_members.contains(&(org.to_string(), user.to_string())))
    }

    async fn is_collaborator(&self, _repo: &RepoRef, user: &str, _token: &str) -> CollaboratorResult<bool> {
        self.record(VcsCall::IsCollaborator {
            user: user.to_string(),
        })
        .await?;
        Ok(self.state.read().await.collaborators.contains(user))
    }

    async fn fetch_last_committer(
        &self,
        _repo: &RepoRef,
        number: u64,
        _token: &str,
    ) -> CollaboratorResult<Option<String>> {
        self.record(VcsCall::FetchLastCommitter { number }).await?;
        Ok(self.state.read().await.last_committer.clone())
    }

    async fn set_commit_status(
        &self,
        repo: &RepoRef,
        sha: &str,
        status: &Verdict,
        token: &str,
    ) -> CollaboratorResult<()> {
        self.record(VcsCall::SetCommitStatus {
            repo: repo.clone(),
            sha: sha.to_string(),
            status: status.clone(),
            token: token.to_string(),
        })
        .await
    }

    async fn set_issue_comment_body(
        &self,
        repo: &RepoRef,
        issue_number: u64,
        comment_id: CommentId,
        body: &str,
        token: &str,
    ) -> CollaboratorResult<()> {
        self.record(VcsCall::SetIssueCommentBody {
            repo: repo.clone(),
            issue_number,
            comment_id,
            body: body.to_string(),
            token: token.to_string(),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn repo() -> RepoRef {
        RepoRef::new("mfellner", "hello-world")
    }

    #[tokio::test]
    async fn test_comments_filtered_by_since() {
        let github = SimulatedGitHub::new();
        let old = Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap();
        let new = Utc.with_ymd_and_hms(2016, 6, 1, 0, 0, 0).unwrap();
        github
            .set_comments(
                1,
                vec![
                    Comment::new(1, "foo", ":+1:", old),
                    Comment::new(2, "bar", ":+1:", new),
                    Comment::new(3, "baz", ":+1:", old).with_updated_at(new),
                ],
            )
            .await;

        let since = Utc.with_ymd_and_hms(2016, 3, 1, 0, 0, 0).unwrap();
        let comments = github.get_comments(&repo(), 1, since, "abcd").await.unwrap();
        let ids: Vec<_> = comments.iter().map(|c| c.id.0).collect();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(github.call_count("get_comments").await, 1);
    }

    #[tokio::test]
    async fn test_failure_injection_still_records_call() {
        let github = SimulatedGitHub::new();
        github.fail("set_commit_status", "API rate limit exceeded").await;

        let err = github
            .set_commit_status(&repo(), "abcd1234", &Verdict::pending("x"), "abcd")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "API rate limit exceeded");
        assert_eq!(github.statuses().await.len(), 1);
    }

    #[tokio::test]
    async fn test_fixture_membership() {
        let fixture: GitHubFixture = serde_json::from_value(serde_json::json!({
            "org_members": {"zalando": ["foo"]},
            "collaborators": ["bar"],
            "labels": {"1": ["goodlabel"]}
        }))
        .unwrap();
        let github = SimulatedGitHub::from_fixture(fixture);

        assert!(github.is_member_of_org("zalando", "foo", "t").await.unwrap());
        assert!(!github.is_member_of_org("zalando", "bar", "t").await.unwrap());
        assert!(github.is_collaborator(&repo(), "bar", "t").await.unwrap());
        assert_eq!(github.get_issue_labels(&repo(), 1, "t").await.unwrap(), vec!["goodlabel"]);
    }
}
