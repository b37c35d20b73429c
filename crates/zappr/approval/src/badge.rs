//! Comment badges
//!
//! When a group member posts a fresh approval or veto, the comment body is
//! extended with the badge images of every group that counted the vote.

use crate::classifier::CommentKind;
use tracing::debug;
use zappr_types::{ApprovalPolicy, Comment, Tally};

const APPROVE_ALT: &str = "Approved with Zappr";
const VETO_ALT: &str = "Vetoed with Zappr";

/// Builds badge-annotated comment bodies
#[derive(Clone, Debug, Default)]
pub struct BadgeRenderer;

impl BadgeRenderer {
    pub fn new() -> Self {
        Self
    }

    /// The new body for `comment`, or `None` when nothing should change.
    ///
    /// Only pristine comments get badges. A group contributes when its tally
    /// list for `kind` contains the author and it declares a badge URL for
    /// that kind. Duplicate URLs are emitted once.
    pub fn annotate(
        &self,
        policy: &ApprovalPolicy,
        tally: &Tally,
        comment: &Comment,
        kind: CommentKind,
    ) -> Option<String> {
        if !comment.is_pristine() {
            debug!(comment = %comment.id, "Comment was edited, no badges");
            return None;
        }

        let (votes, alt) = match kind {
            CommentKind::Approval => (&tally.approvals, APPROVE_ALT),
            CommentKind::Veto => (&tally.vetoes, VETO_ALT),
            CommentKind::Neither => return None,
        };

        let mut urls: Vec<&str> = Vec::new();
        for group in &policy.groups {
            if !votes.group(&group.name).iter().any(|u| *u == comment.user) {
                continue;
            }
            let url = group.badge.as_ref().and_then(|badge| match kind {
                CommentKind::Approval => badge.approve.as_deref(),
                _ => badge.veto.as_deref(),
            });
            if let Some(url) = url {
                if !urls.contains(&url) {
                    urls.push(url);
                }
            }
        }

        if urls.is_empty() {
            return None;
        }

        let badges = urls
            .iter()
            .map(|url| format!("![{}]({}) ", alt, url))
            .collect::<Vec<_>>()
            .join(" ");
        debug!(comment = %comment.id, badges = urls.len(), "Adding badges");
        Some(format!("{}\n\n{}", comment.body, badges))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{CommentClassifier, Membership};
    use crate::tally::TallyEngine;
    use chrono::{TimeZone, Utc};
    use zappr_types::RepositoryConfig;

    const BADGES: &str = r#"
approvals:
  minimum: 2
  pattern: '^:\+1:$'
  veto:
    pattern: '^:\-1:$'
  groups:
    foo:
      minimum: 1
      from:
        users: [foo, mr-foo]
      badge:
        approve: https://example.com/foo-approve.svg
        veto: https://example.com/foo-veto.svg
    bar:
      minimum: 1
      from:
        users: [foo, baz]
      badge:
        approve: https://example.com/bar-approve.svg
    shared:
      from:
        users: [foo]
      badge:
        approve: https://example.com/foo-approve.svg
    plain:
      from:
        users: [qux]
"#;

    fn policy() -> ApprovalPolicy {
        RepositoryConfig::from_yaml(BADGES)
            .unwrap()
            .approvals
            .compile()
            .unwrap()
    }

    fn comment(id: u64, user: &str, body: &str) -> Comment {
        Comment::new(id, user, body, Utc.with_ymd_and_hms(2016, 8, 15, 13, 3, 28).unwrap())
    }

    fn tally(policy: &ApprovalPolicy, comments: &[Comment]) -> Tally {
        let membership = Membership::new();
        TallyEngine::new(CommentClassifier::new(policy, &[], &membership)).count(comments)
    }

    #[test]
    fn test_approval_badges_deduplicated_in_group_order() {
        let policy = policy();
        let approval = comment(1, "foo", ":+1:");
        let tally = tally(&policy, &[approval.clone()]);

        let body = BadgeRenderer::new()
            .annotate(&policy, &tally, &approval, CommentKind::Approval)
            .unwrap();
        assert_eq!(
            body,
            ":+1:\n\n![Approved with Zappr](https://example.com/foo-approve.svg)  \
             ![Approved with Zappr](https://example.com/bar-approve.svg) "
        );
    }

    #[test]
    fn test_veto_badge() {
        let policy = policy();
        let veto = comment(2, "mr-foo", ":-1:");
        let tally = tally(&policy, &[veto.clone()]);

        let body = BadgeRenderer::new()
            .annotate(&policy, &tally, &veto, CommentKind::Veto)
            .unwrap();
        assert_eq!(body, ":-1:\n\n![Vetoed with Zappr](https://example.com/foo-veto.svg) ");
    }

    #[test]
    fn test_no_badge_for_edited_comment() {
        let policy = policy();
        let edited = comment(1, "foo", ":+1:")
            .with_updated_at(Utc.with_ymd_and_hms(2016, 8, 15, 14, 0, 0).unwrap());
        let tally = tally(&policy, &[edited.clone()]);
        assert!(BadgeRenderer::new()
            .annotate(&policy, &tally, &edited, CommentKind::Approval)
            .is_none());
    }

    #[test]
    fn test_no_badge_outside_groups_or_without_urls() {
        let policy = policy();
        let stranger = comment(3, "stranger", ":+1:");
        let qux = comment(4, "qux", ":+1:");
        let tally = tally(&policy, &[stranger.clone(), qux.clone()]);
        let renderer = BadgeRenderer::new();

        assert!(renderer
            .annotate(&policy, &tally, &stranger, CommentKind::Approval)
            .is_none());
        assert!(renderer
            .annotate(&policy, &tally, &qux, CommentKind::Approval)
            .is_none());
    }

    #[test]
    fn test_no_veto_badge_for_approval_only_group() {
        let policy = policy();
        let veto = comment(5, "baz", ":-1:");
        let tally = tally(&policy, &[veto.clone()]);
        assert!(BadgeRenderer::new()
            .annotate(&policy, &tally, &veto, CommentKind::Veto)
            .is_none());
    }
}
