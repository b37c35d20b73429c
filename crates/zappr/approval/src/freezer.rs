//! Comment freezer
//!
//! Without freezing, someone could post a veto, let it be counted, then
//! quietly edit or delete it before a reviewer looks at the status. When a
//! comment is edited or deleted by anyone other than its author, its
//! pre-change content is frozen and from then on replaces whatever GitHub
//! reports for that comment id.
//!
//! Frozen comments are read and written through the PR record store; the
//! freezer only decides what to freeze and how to merge.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{debug, warn};
use zappr_types::{Comment, FrozenComment};

/// What happened to a comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentChange {
    /// The body changed. `previous_body` is GitHub's `changes.body.from`,
    /// absent when something other than the body was edited.
    Edited { previous_body: Option<String> },
    Deleted,
}

/// An `issue_comment` edit or delete event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentEdit {
    pub change: CommentChange,
    /// The comment as carried by the webhook (post-edit body)
    pub comment: Comment,
    /// Login of whoever performed the change
    pub sender: String,
}

impl CommentEdit {
    pub fn is_self_edit(&self) -> bool {
        self.sender == self.comment.user
    }

    /// The content the comment had before this change
    fn original_body(&self) -> &str {
        match &self.change {
            CommentChange::Edited {
                previous_body: Some(previous),
            } => previous,
            _ => &self.comment.body,
        }
    }
}

/// Working comment set for one evaluation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciled {
    /// Frozen snapshots first, then live comments whose id is not frozen
    pub comments: Vec<Comment>,
    /// Snapshot created by this reconciliation, to be persisted
    pub new_frozen: Option<FrozenComment>,
}

/// Decides what to freeze and merges frozen state with live comments
#[derive(Clone, Debug, Default)]
pub struct CommentFreezer;

impl CommentFreezer {
    pub fn new() -> Self {
        Self
    }

    /// The snapshot to persist for `edit`, if any.
    ///
    /// Nothing is frozen for self-edits or for comment ids that are already
    /// frozen, so repeated tampering never produces duplicates.
    pub fn freeze(&self, edit: &CommentEdit, frozen: &[FrozenComment]) -> Option<FrozenComment> {
        if frozen.iter().any(|f| f.id == edit.comment.id) {
            debug!(comment = %edit.comment.id, "Comment already frozen");
            return None;
        }
        if edit.is_self_edit() {
            debug!(comment = %edit.comment.id, user = %edit.sender, "Author changed own comment");
            return None;
        }

        warn!(
            comment = %edit.comment.id,
            author = %edit.comment.user,
            sender = %edit.sender,
            change = ?edit.change,
            "Comment changed by someone other than its author, freezing"
        );

        Some(FrozenComment {
            id: edit.comment.id,
            body: edit.original_body().to_string(),
            created_at: edit.comment.created_at,
            user: edit.comment.user.clone(),
        })
    }

    /// Frozen comments union live comments; a frozen snapshot replaces any
    /// live comment with the same id.
    pub fn merge(&self, frozen: &[FrozenComment], live: &[Comment]) -> Vec<Comment> {
        let frozen_ids: HashSet<_> = frozen.iter().map(|f| f.id).collect();
        frozen
            .iter()
            .map(Comment::from)
            .chain(live.iter().filter(|c| !frozen_ids.contains(&c.id)).cloned())
            .collect()
    }

    /// Apply an optional edit event, then merge.
    ///
    /// A new snapshot is always returned for persisting, but it only joins
    /// the working set when the comment was created at or after `since`;
    /// older comments belong to a previous push and no longer count.
    pub fn reconcile(
        &self,
        live: &[Comment],
        frozen: &[FrozenComment],
        edit: Option<&CommentEdit>,
        since: DateTime<Utc>,
    ) -> Reconciled {
        let new_frozen = edit.and_then(|edit| self.freeze(edit, frozen));
        let relevant = new_frozen.as_ref().filter(|snapshot| snapshot.created_at >= since);
        let comments = match relevant {
            Some(snapshot) => {
                let mut all = frozen.to_vec();
                all.push(snapshot.clone());
                self.merge(&all, live)
            }
            None => self.merge(frozen, live),
        };
        Reconciled {
            comments,
            new_frozen,
        }
    }
}
