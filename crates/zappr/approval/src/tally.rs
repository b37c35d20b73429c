//! Tally engine: counts distinct approvers and vetoers
//!
//! Comments are processed in the order given. Each comment id is counted at
//! most once; when the same id appears twice the first occurrence wins,
//! which is the frozen snapshot for sets produced by
//! [`CommentFreezer::merge`](crate::freezer::CommentFreezer::merge).
//! A user is counted at most once per vote kind, however many qualifying
//! comments they post.

use crate::classifier::CommentClassifier;
use std::collections::HashSet;
use tracing::debug;
use zappr_types::{Comment, Tally};

/// Counts approvals and vetoes for one evaluation
#[derive(Debug, Clone)]
pub struct TallyEngine<'a> {
    classifier: CommentClassifier<'a>,
}

impl<'a> TallyEngine<'a> {
    pub fn new(classifier: CommentClassifier<'a>) -> Self {
        Self { classifier }
    }

    pub fn count(&self, comments: &[Comment]) -> Tally {
        let policy = self.classifier.policy();
        let mut tally = Tally::for_groups(policy.groups.iter().map(|g| g.name.as_str()));
        let mut seen = HashSet::new();

        for comment in comments {
            if !seen.insert(comment.id) {
                debug!(comment = %comment.id, "Skipping repeated comment id");
                continue;
            }

            let classification = self.classifier.classify(comment);
            let groups: Vec<&str> = classification.groups.iter().map(String::as_str).collect();

            let newly_counted = if classification.is_veto() {
                tally.vetoes.record(&comment.user, &groups)
            } else if classification.is_approval() {
                tally.approvals.record(&comment.user, &groups)
            } else {
                false
            };

            if newly_counted {
                tally.counted.push(comment.id);
            }
        }

        debug!(
            approvals = tally.approvals.count(),
            vetoes = tally.vetoes.count(),
            "Counted comments"
        );
        tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Membership;
    use crate::freezer::CommentFreezer;
    use chrono::{TimeZone, Utc};
    use zappr_types::{ApprovalPolicy, CommentId, FrozenComment, RepositoryConfig};

    const DEFAULT: &str = "approvals:\n  minimum: 2\n  pattern: '^:\\+1:$'\n  veto:\n    pattern: '^:\\-1:$'\n";

    const GROUPS: &str = r#"
  groups:
    foo:
      minimum: 1
      from:
        users: [foo, mr-foo]
    bar:
      minimum: 1
      from:
        users: [bar, baz]
    zalando:
      minimum: 2
      from:
        orgs: [zalando]
"#;

    fn policy(yaml: &str) -> ApprovalPolicy {
        RepositoryConfig::from_yaml(yaml)
            .unwrap()
            .approvals
            .compile()
            .unwrap()
    }

    fn comment(id: u64, user: &str, body: &str) -> Comment {
        Comment::new(id, user, body, Utc.with_ymd_and_hms(2016, 8, 15, 13, 3, 28).unwrap())
    }

    fn count(policy: &ApprovalPolicy, ignored: &[String], membership: &Membership, comments: &[Comment]) -> Tally {
        TallyEngine::new(CommentClassifier::new(policy, ignored, membership)).count(comments)
    }

    #[test]
    fn test_honors_pattern_and_counts_user_once() {
        let policy = policy(DEFAULT);
        let comments = vec![
            comment(1, "prayerslayer", "awesome :+1:"),
            comment(2, "mfellner", ":+1:"),
            comment(3, "mfellner", ":+1:"),
        ];
        let tally = count(&policy, &[], &Membership::new(), &comments);
        assert_eq!(tally.approvals.total, vec!["mfellner"]);
        assert_eq!(tally.counted, vec![CommentId(2)]);
    }

    #[test]
    fn test_duplicate_approvers() {
        let policy = policy(DEFAULT);
        let comments = vec![
            comment(1, "foo", ":+1:"),
            comment(2, "bar", ":+1:"),
            comment(3, "bar", ":+1:"),
        ];
        let tally = count(&policy, &[], &Membership::new(), &comments);
        assert_eq!(tally.approvals.total, vec!["foo", "bar"]);
        assert!(!tally.has_vetoes());
    }

    #[test]
    fn test_vetoes_and_groups() {
        let policy = policy(&format!("{}{}", DEFAULT, GROUPS));
        let mut membership = Membership::new();
        for user in ["foo", "bar", "mr-foo"] {
            membership.add_org_member("zalando", user);
        }
        let comments = vec![
            comment(1, "foo", ":+1:"),
            comment(2, "bar", ":+1:"),
            comment(3, "mr-foo", ":-1:"),
        ];
        let tally = count(&policy, &[], &membership, &comments);

        assert_eq!(tally.approvals.total, vec!["foo", "bar"]);
        assert_eq!(tally.approvals.group("foo"), ["foo".to_string()]);
        assert_eq!(tally.approvals.group("bar"), ["bar".to_string()]);
        assert_eq!(tally.approvals.group("zalando").len(), 2);
        assert_eq!(tally.vetoes.total, vec!["mr-foo"]);
        assert_eq!(tally.vetoes.group("foo"), ["mr-foo".to_string()]);
    }

    #[test]
    fn test_ignored_users_do_not_count() {
        let policy = policy(DEFAULT);
        let ignored = vec!["mark".to_string(), "stranger".to_string()];
        let comments = vec![
            comment(1, "mark", ":+1:"),
            comment(2, "stranger", ":-1:"),
            comment(3, "bar", ":+1:"),
        ];
        let tally = count(&policy, &ignored, &Membership::new(), &comments);
        assert_eq!(tally.approvals.total, vec!["bar"]);
        assert!(!tally.has_vetoes());
    }

    #[test]
    fn test_frozen_snapshot_counted_instead_of_live_edit() {
        let policy = policy(DEFAULT);
        let frozen = vec![
            FrozenComment {
                id: CommentId(1),
                body: ":-1:".to_string(),
                created_at: Utc.with_ymd_and_hms(2016, 8, 15, 13, 3, 28).unwrap(),
                user: "foo".to_string(),
            },
            FrozenComment {
                id: CommentId(2),
                body: "This does not look good.".to_string(),
                created_at: Utc.with_ymd_and_hms(2016, 8, 15, 13, 3, 28).unwrap(),
                user: "bar".to_string(),
            },
        ];
        let live = vec![comment(2, "bar", ":+1:"), comment(3, "baz", ":+1:")];
        let merged = CommentFreezer::new().merge(&frozen, &live);
        let tally = count(&policy, &[], &Membership::new(), &merged);

        assert_eq!(tally.vetoes.total, vec!["foo"]);
        assert_eq!(tally.approvals.total, vec!["baz"]);
    }

    #[test]
    fn test_repeated_id_counted_once_first_wins() {
        let policy = policy(DEFAULT);
        let comments = vec![comment(1, "foo", ":-1:"), comment(1, "foo", ":+1:")];
        let tally = count(&policy, &[], &Membership::new(), &comments);
        assert_eq!(tally.vetoes.total, vec!["foo"]);
        assert!(tally.approvals.is_empty());
    }
}
