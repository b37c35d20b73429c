//! Event router: the approval check
//!
//! Maps each webhook to the work it implies:
//!
//! | event           | action                                      | effect                               |
//! |-----------------|---------------------------------------------|--------------------------------------|
//! | `pull_request`  | opened                                      | new record, evaluate without comments |
//! | `pull_request`  | reopened, labeled, unlabeled                | evaluate                             |
//! | `pull_request`  | synchronize                                 | record push, drop frozen, evaluate   |
//! | `pull_request`  | closed and merged                           | delete record, audit                 |
//! | `issue_comment` | created, edited, deleted (open PR only)     | freeze if tampered, evaluate         |
//! | anything else   |                                             | nothing                              |
//!
//! An evaluation always posts two statuses for the PR head: `pending`
//! first, then the verdict. Record store and GitHub failures after the
//! first status, including loading the PR record, turn the second one into
//! an `error` status carrying the failure message. Only failures before the
//! head sha is known (fetching the PR of a comment) escape as errors.
//!
//! Evaluations of the same pull request must be serialized by the caller;
//! the frozen comment read-reconcile-write is not atomic.

use crate::audit::{AuditEvent, AuditSink};
use crate::error::{CollaboratorError, CollaboratorResult, RouterResult};
use crate::event::{CommentAction, IssueCommentPayload, PullRequest, PullRequestAction, PullRequestPayload, WebhookEvent};
use crate::github::{RepoRef, VcsClient};
use crate::store::{PullRequestRecord, PullRequestStore};
use futures::future::try_join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use zappr_approval::{
    membership_queries, BadgeRenderer, CommentClassifier, CommentEdit, CommentFreezer, ConditionMatcher, Membership,
    PullRequestFacts, TallyEngine, VerdictRenderer,
};
use zappr_types::{ApprovalPolicy, Comment, Verdict};

/// What the check did with an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    /// Nothing to do; no status was posted
    Skipped { reason: String },
    /// A verdict was computed and posted
    Evaluated { verdict: Verdict },
    /// The PR was merged and its record deleted
    Deleted,
}

impl Outcome {
    fn skipped(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        debug!(reason = %reason, "Skipping event");
        Outcome::Skipped { reason }
    }

    pub fn verdict(&self) -> Option<&Verdict> {
        match self {
            Outcome::Evaluated { verdict } => Some(verdict),
            _ => None,
        }
    }
}

/// Which comments an evaluation considers
enum CommentSource<'a> {
    /// A freshly opened PR: nothing to fetch
    Empty,
    Fetch {
        /// Edit or delete to run through the freezer first
        edit: Option<&'a CommentEdit>,
        /// Newly created comment that may receive badges
        badge_candidate: Option<&'a Comment>,
    },
}

impl CommentSource<'_> {
    fn fetch() -> Self {
        CommentSource::Fetch {
            edit: None,
            badge_candidate: None,
        }
    }
}

/// How the PR record is obtained once the evaluation has started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordStep {
    /// Newly opened PR: start a fresh record
    Create,
    /// New push: advance `last_push` and drop frozen comments
    Push,
    /// Existing record, created if missing
    Existing,
}

/// Per-invocation inputs shared by every step
struct Evaluation<'a> {
    policy: &'a ApprovalPolicy,
    repo: RepoRef,
    pull_request: &'a PullRequest,
    repository_id: i64,
    token: &'a str,
}

/// The approval check
pub struct ApprovalCheck {
    github: Arc<dyn VcsClient>,
    store: Arc<dyn PullRequestStore>,
    audit: Arc<dyn AuditSink>,
}

impl ApprovalCheck {
    pub fn new(github: Arc<dyn VcsClient>, store: Arc<dyn PullRequestStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { github, store, audit }
    }

    /// Parse a raw webhook and handle it
    pub async fn handle(
        &self,
        policy: &ApprovalPolicy,
        event_name: &str,
        payload: serde_json::Value,
        token: &str,
        repository_id: i64,
    ) -> RouterResult<Outcome> {
        let event = WebhookEvent::parse(event_name, payload)?;
        self.execute(policy, &event, token, repository_id).await
    }

    /// Handle one webhook event for the repository identified by
    /// `repository_id` in the record store
    pub async fn execute(
        &self,
        policy: &ApprovalPolicy,
        event: &WebhookEvent,
        token: &str,
        repository_id: i64,
    ) -> RouterResult<Outcome> {
        match event {
            WebhookEvent::PullRequest { action, payload } => {
                self.on_pull_request(policy, action, payload, token, repository_id).await
            }
            WebhookEvent::IssueComment { action, payload } => {
                self.on_issue_comment(policy, action, payload, token, repository_id).await
            }
            WebhookEvent::Unsupported(name) => Ok(Outcome::skipped(format!("unsupported event {}", name))),
        }
    }

    async fn on_pull_request(
        &self,
        policy: &ApprovalPolicy,
        action: &PullRequestAction,
        payload: &PullRequestPayload,
        token: &str,
        repository_id: i64,
    ) -> RouterResult<Outcome> {
        let repo = RepoRef::from(&payload.repository);
        let pull_request = &payload.pull_request;
        let number = payload.number;

        let (step, source) = match action {
            PullRequestAction::Skip(name) => return Ok(Outcome::skipped(format!("pull_request {}", name))),
            PullRequestAction::Merged => {
                self.store.delete_pull_request(repository_id, number).await?;
                self.audit
                    .log(AuditEvent::pull_request_merged(repo.clone(), number, &pull_request.head.sha))
                    .await?;
                info!(repo = %repo, number, "Pull request merged, record deleted");
                return Ok(Outcome::Deleted);
            }
            PullRequestAction::Opened => (RecordStep::Create, CommentSource::Empty),
            PullRequestAction::Synchronize => (RecordStep::Push, CommentSource::fetch()),
            PullRequestAction::Reopened | PullRequestAction::Labeled | PullRequestAction::Unlabeled => {
                (RecordStep::Existing, CommentSource::fetch())
            }
        };

        let evaluation = Evaluation {
            policy,
            repo,
            pull_request,
            repository_id,
            token,
        };
        let verdict = self.evaluate(&evaluation, step, source).await?;
        Ok(Outcome::Evaluated { verdict })
    }

    async fn on_issue_comment(
        &self,
        policy: &ApprovalPolicy,
        action: &CommentAction,
        payload: &IssueCommentPayload,
        token: &str,
        repository_id: i64,
    ) -> RouterResult<Outcome> {
        if let CommentAction::Skip(name) = action {
            return Ok(Outcome::skipped(format!("issue_comment {}", name)));
        }
        let author = &payload.comment.user.login;
        if policy.is_bot(author) {
            return Ok(Outcome::skipped(format!("comment by bot user {}", author)));
        }

        let repo = RepoRef::from(&payload.repository);
        let pull_request = match self.github.get_pull_request(&repo, payload.issue.number, token).await? {
            Some(pr) if pr.is_open() => pr,
            Some(_) => return Ok(Outcome::skipped("pull request is not open")),
            None => return Ok(Outcome::skipped("no pull request for issue")),
        };

        let edit = payload.comment_edit(action);
        let created = payload.comment.to_comment();
        let source = CommentSource::Fetch {
            edit: edit.as_ref(),
            badge_candidate: (*action == CommentAction::Created).then_some(&created),
        };

        let evaluation = Evaluation {
            policy,
            repo,
            pull_request: &pull_request,
            repository_id,
            token,
        };
        let verdict = self.evaluate(&evaluation, RecordStep::Existing, source).await?;
        Ok(Outcome::Evaluated { verdict })
    }

    /// Post `pending`, compute, post the verdict
    async fn evaluate(
        &self,
        evaluation: &Evaluation<'_>,
        step: RecordStep,
        source: CommentSource<'_>,
    ) -> RouterResult<Verdict> {
        let renderer = VerdictRenderer::new();
        let sha = &evaluation.pull_request.head.sha;

        self.github
            .set_commit_status(&evaluation.repo, sha, &renderer.in_progress(), evaluation.token)
            .await?;

        let verdict = match self.compute(evaluation, step, source, &renderer).await {
            Ok(verdict) => verdict,
            Err(err) => {
                warn!(
                    repo = %evaluation.repo,
                    number = evaluation.pull_request.number,
                    error = %err,
                    "Evaluation failed, reporting error status"
                );
                Verdict::error(err.to_string())
            }
        };

        self.github
            .set_commit_status(&evaluation.repo, sha, &verdict, evaluation.token)
            .await?;
        info!(
            repo = %evaluation.repo,
            number = evaluation.pull_request.number,
            sha = %sha,
            state = %verdict.state,
            "Published approval status"
        );
        Ok(verdict)
    }

    async fn compute(
        &self,
        evaluation: &Evaluation<'_>,
        step: RecordStep,
        source: CommentSource<'_>,
        renderer: &VerdictRenderer,
    ) -> CollaboratorResult<Verdict> {
        let Evaluation {
            policy,
            repo,
            pull_request,
            token,
            ..
        } = evaluation;
        let number = pull_request.number;

        let record = self.load_record(evaluation, step).await?;
        let (comments, badge_candidate) = match source {
            CommentSource::Empty => (Vec::new(), None),
            CommentSource::Fetch { edit, badge_candidate } => {
                (self.reconcile_comments(evaluation, &record, edit).await?, badge_candidate)
            }
        };

        let ignored = self.ignored_users(evaluation).await?;
        let (facts, membership) = futures::try_join!(
            self.pull_request_facts(evaluation),
            self.resolve_membership(evaluation, &ignored, &comments)
        )?;

        let classifier = CommentClassifier::new(policy, &ignored, &membership);
        let tally = TallyEngine::new(classifier.clone()).count(&comments);
        let active_groups = ConditionMatcher::new().active_groups(policy, &facts);
        let verdict = renderer.render(policy, &tally, &active_groups);

        if let Some(comment) = badge_candidate {
            let kind = classifier.kind(&comment.body);
            if let Some(body) = BadgeRenderer::new().annotate(policy, &tally, comment, kind) {
                self.github
                    .set_issue_comment_body(repo, number, comment.id, &body, token)
                    .await?;
                info!(repo = %repo, number, comment = %comment.id, "Added badges to comment");
            }
        }

        self.audit
            .log(AuditEvent::commit_status_update(
                repo.clone(),
                number,
                &pull_request.head.sha,
                verdict.clone(),
                tally,
            ))
            .await?;

        debug!(pr_id = record.id, "Evaluation complete");
        Ok(verdict)
    }

    async fn load_record(&self, evaluation: &Evaluation<'_>, step: RecordStep) -> CollaboratorResult<PullRequestRecord> {
        let repository_id = evaluation.repository_id;
        let number = evaluation.pull_request.number;
        match step {
            RecordStep::Create => self.store.create_pull_request(repository_id, number).await,
            RecordStep::Existing => self.store.get_or_create_pull_request(repository_id, number).await,
            RecordStep::Push => {
                self.store.add_commit(repository_id, number).await?;
                let record = self.store.get_or_create_pull_request(repository_id, number).await?;
                self.store.remove_frozen_comments(record.id).await?;
                info!(repo = %evaluation.repo, number, pr_id = record.id, "New push, frozen comments dropped");
                Ok(record)
            }
        }
    }

    /// Live comments since the last push merged with frozen snapshots. A
    /// snapshot triggered by `edit` is persisted.
    async fn reconcile_comments(
        &self,
        evaluation: &Evaluation<'_>,
        record: &PullRequestRecord,
        edit: Option<&CommentEdit>,
    ) -> CollaboratorResult<Vec<Comment>> {
        let frozen = self.store.get_frozen_comments(record.id, record.last_push).await?;

        let live = self
            .github
            .get_comments(&evaluation.repo, evaluation.pull_request.number, record.last_push, evaluation.token)
            .await?;

        let reconciled = CommentFreezer::new().reconcile(&live, &frozen, edit, record.last_push);
        if let Some(snapshot) = reconciled.new_frozen {
            info!(pr_id = record.id, comment = %snapshot.id, "Freezing comment");
            self.store.add_frozen_comment(record.id, snapshot).await?;
        }
        Ok(reconciled.comments)
    }

    /// `[last_committer, pr_opener]`, as configured
    async fn ignored_users(&self, evaluation: &Evaluation<'_>) -> CollaboratorResult<Vec<String>> {
        let ignore = evaluation.policy.ignore;
        let mut ignored = Vec::new();
        if ignore.ignores_last_committer() {
            let committer = self
                .github
                .fetch_last_committer(&evaluation.repo, evaluation.pull_request.number, evaluation.token)
                .await?;
            ignored.extend(committer);
        }
        if ignore.ignores_pr_opener() {
            ignored.push(evaluation.pull_request.user.login.clone());
        }
        Ok(ignored)
    }

    /// Labels and changed files, fetched only when some group needs them
    async fn pull_request_facts(&self, evaluation: &Evaluation<'_>) -> CollaboratorResult<PullRequestFacts> {
        let Evaluation {
            policy,
            repo,
            pull_request,
            token,
            ..
        } = evaluation;
        let labels = async {
            if policy.needs_labels() {
                self.github.get_issue_labels(repo, pull_request.number, token).await
            } else {
                Ok(Vec::new())
            }
        };
        let files = async {
            if policy.needs_files() {
                self.github.get_pull_request_files(repo, pull_request.number, token).await
            } else {
                Ok(Vec::new())
            }
        };
        let (labels, files) = futures::try_join!(labels, files)?;
        Ok(PullRequestFacts::new(labels, files))
    }

    async fn resolve_membership(
        &self,
        evaluation: &Evaluation<'_>,
        ignored: &[String],
        comments: &[Comment],
    ) -> CollaboratorResult<Membership> {
        let queries = membership_queries(evaluation.policy, ignored, comments);
        let mut membership = Membership::new();
        if queries.is_empty() {
            return Ok(membership);
        }

        let token = evaluation.token;
        let orgs = try_join_all(queries.org_checks.iter().map(|(org, user)| async move {
            let member = self.github.is_member_of_org(org, user, token).await?;
            Ok::<_, CollaboratorError>((org, user, member))
        }));
        let collaborators = try_join_all(queries.collaborator_checks.iter().map(|user| async move {
            let collaborator = self.github.is_collaborator(&evaluation.repo, user, token).await?;
            Ok::<_, CollaboratorError>((user, collaborator))
        }));
        let (orgs, collaborators) = futures::try_join!(orgs, collaborators)?;

        for (org, user, member) in orgs {
            if member {
                membership.add_org_member(org.clone(), user.clone());
            }
        }
        for (user, collaborator) in collaborators {
            if collaborator {
                membership.add_collaborator(user.clone());
            }
        }
        debug!(lookups = queries.org_checks.len() + queries.collaborator_checks.len(), "Resolved membership");
        Ok(membership)
    }
}
