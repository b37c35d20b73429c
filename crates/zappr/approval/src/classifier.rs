//! Comment classifier
//!
//! Decides whether a comment is an approval, a veto or neither, whether its
//! author is eligible to count, and which approval groups the author
//! belongs to. Group membership is independent of whether a group is
//! active; activity only gates enforcement of the group's minimum.

use std::collections::{BTreeSet, HashSet};
use tracing::debug;
use zappr_types::{ApprovalPolicy, Comment, FromRule};

/// What a comment body expresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommentKind {
    Approval,
    Veto,
    Neither,
}

/// Outcome of classifying one comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: CommentKind,
    /// Whether the author may count at all (ignore list, bot pattern,
    /// top-level `from`)
    pub eligible: bool,
    /// Groups the author belongs to, in declaration order
    pub groups: Vec<String>,
}

impl Classification {
    pub fn is_approval(&self) -> bool {
        self.eligible && self.kind == CommentKind::Approval
    }

    pub fn is_veto(&self) -> bool {
        self.eligible && self.kind == CommentKind::Veto
    }
}

// ── Membership ─────────────────────────────────────────────────────────

/// Resolved organization memberships and repository collaborators.
///
/// Lookups are performed by the caller before classification; anything not
/// recorded here is treated as "not a member".
#[derive(Debug, Clone, Default)]
pub struct Membership {
    org_members: HashSet<(String, String)>,
    collaborators: HashSet<String>,
}

impl Membership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_org_member(&mut self, org: impl Into<String>, user: impl Into<String>) {
        self.org_members.insert((org.into(), user.into()));
    }

    pub fn add_collaborator(&mut self, user: impl Into<String>) {
        self.collaborators.insert(user.into());
    }

    pub fn is_org_member(&self, org: &str, user: &str) -> bool {
        self.org_members.contains(&(org.to_string(), user.to_string()))
    }

    pub fn is_collaborator(&self, user: &str) -> bool {
        self.collaborators.contains(user)
    }

    /// Whether `user` satisfies a `from` rule
    pub fn satisfies(&self, rule: &FromRule, user: &str) -> bool {
        rule.lists_user(user)
            || rule.orgs.iter().any(|org| self.is_org_member(org, user))
            || (rule.collaborators && self.is_collaborator(user))
    }
}

/// Membership lookups the caller must resolve before classifying
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipQueries {
    /// One `(org, user)` pair per distinct combination
    pub org_checks: Vec<(String, String)>,
    /// Distinct users whose collaborator status is needed
    pub collaborator_checks: Vec<String>,
}

impl MembershipQueries {
    pub fn is_empty(&self) -> bool {
        self.org_checks.is_empty() && self.collaborator_checks.is_empty()
    }
}

// ── Classifier ─────────────────────────────────────────────────────────

/// Classifies comments against a policy for one evaluation
#[derive(Debug, Clone)]
pub struct CommentClassifier<'a> {
    policy: &'a ApprovalPolicy,
    ignored: &'a [String],
    membership: &'a Membership,
}

impl<'a> CommentClassifier<'a> {
    pub fn new(policy: &'a ApprovalPolicy, ignored: &'a [String], membership: &'a Membership) -> Self {
        Self {
            policy,
            ignored,
            membership,
        }
    }

    pub fn policy(&self) -> &'a ApprovalPolicy {
        self.policy
    }

    /// Classify a body. Veto wins if both patterns match.
    pub fn kind(&self, body: &str) -> CommentKind {
        body_kind(self.policy, body)
    }

    /// Whether `user` may count towards approvals or vetoes
    pub fn is_eligible(&self, user: &str) -> bool {
        if self.ignored.iter().any(|ignored| ignored == user) {
            return false;
        }
        if self.policy.is_bot(user) {
            return false;
        }
        match &self.policy.from {
            Some(rule) => self.membership.satisfies(rule, user),
            None => true,
        }
    }

    /// Groups `user` belongs to, in declaration order
    pub fn groups_for(&self, user: &str) -> Vec<String> {
        self.policy
            .groups
            .iter()
            .filter(|group| self.membership.satisfies(&group.from, user))
            .map(|group| group.name.clone())
            .collect()
    }

    pub fn classify(&self, comment: &Comment) -> Classification {
        let kind = self.kind(&comment.body);
        let eligible = self.is_eligible(&comment.user);
        let groups = if kind == CommentKind::Neither {
            Vec::new()
        } else {
            self.groups_for(&comment.user)
        };
        debug!(
            comment = %comment.id,
            user = %comment.user,
            kind = ?kind,
            eligible,
            "Classified comment"
        );
        Classification {
            kind,
            eligible,
            groups,
        }
    }
}

fn body_kind(policy: &ApprovalPolicy, body: &str) -> CommentKind {
    let body = body.trim();
    if policy.veto_pattern.is_match(body) {
        CommentKind::Veto
    } else if policy.approval_pattern.is_match(body) {
        CommentKind::Approval
    } else {
        CommentKind::Neither
    }
}

/// Work out which membership lookups an evaluation needs: one per distinct
/// `(org, user)` pair and one collaborator check per distinct user, limited
/// to authors of approval/veto comments who are not ignored or bots.
pub fn membership_queries(
    policy: &ApprovalPolicy,
    ignored: &[String],
    comments: &[Comment],
) -> MembershipQueries {
    let orgs: BTreeSet<&str> = policy
        .from_rules()
        .flat_map(|rule| rule.orgs.iter().map(String::as_str))
        .collect();
    let wants_collaborators = policy.from_rules().any(|rule| rule.collaborators);

    if orgs.is_empty() && !wants_collaborators {
        return MembershipQueries::default();
    }

    let mut seen = HashSet::new();
    let candidates: Vec<&str> = comments
        .iter()
        .filter(|c| body_kind(policy, &c.body) != CommentKind::Neither)
        .map(|c| c.user.as_str())
        .filter(|user| !ignored.iter().any(|i| i == user) && !policy.is_bot(user))
        .filter(|user| seen.insert(*user))
        .collect();

    let mut queries = MembershipQueries::default();
    for user in &candidates {
        for org in &orgs {
            queries.org_checks.push((org.to_string(), user.to_string()));
        }
        if wants_collaborators {
            queries.collaborator_checks.push(user.to_string());
        }
    }
    queries
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use zappr_types::RepositoryConfig;

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

    const DEFAULT: &str = "approvals:\n  minimum: 2\n  pattern: '^:\\+1:$'\n  veto:\n    pattern: '^:\\-1:$'\n";

    #[test]
    fn test_kind_honors_patterns_and_trims() {
        let policy = policy(DEFAULT);
        let membership = Membership::new();
        let classifier = CommentClassifier::new(&policy, &[], &membership);

        assert_eq!(classifier.kind(":+1:"), CommentKind::Approval);
        assert_eq!(classifier.kind("  :+1:\n"), CommentKind::Approval);
        assert_eq!(classifier.kind(":-1:"), CommentKind::Veto);
        assert_eq!(classifier.kind("awesome :+1:"), CommentKind::Neither);
    }

    #[test]
    fn test_veto_takes_precedence() {
        let policy = policy("approvals:\n  pattern: 'ok'\n  veto:\n    pattern: 'not ok'\n");
        let membership = Membership::new();
        let classifier = CommentClassifier::new(&policy, &[], &membership);
        assert_eq!(classifier.kind("not ok"), CommentKind::Veto);
    }

    #[test]
    fn test_ignored_and_bot_users_are_ineligible() {
        let policy = policy(&format!("{}  bot_user_pattern: '-robot$'\n", DEFAULT));
        let membership = Membership::new();
        let ignored = vec!["stranger".to_string()];
        let classifier = CommentClassifier::new(&policy, &ignored, &membership);

        assert!(!classifier.classify(&comment(1, "stranger", ":+1:")).is_approval());
        assert!(!classifier.classify(&comment(2, "bar-robot", ":+1:")).is_approval());
        assert!(classifier.classify(&comment(3, "bar", ":+1:")).is_approval());
    }

    #[test]
    fn test_top_level_from_uses_membership() {
        let policy = policy(&format!("{}  from:\n    orgs: [zalando]\n    users: [alice]\n", DEFAULT));
        let mut membership = Membership::new();
        membership.add_org_member("zalando", "user3");
        let classifier = CommentClassifier::new(&policy, &[], &membership);

        assert!(classifier.is_eligible("user3"));
        assert!(classifier.is_eligible("alice"));
        assert!(!classifier.is_eligible("user1"));
    }

    #[test]
    fn test_group_membership_independent_of_eligibility() {
        let policy = policy(&format!(
            "{}  groups:\n    foo:\n      minimum: 1\n      from:\n        users: [foo, mr-foo]\n    devs:\n      from:\n        collaborators: true\n",
            DEFAULT
        ));
        let mut membership = Membership::new();
        membership.add_collaborator("mr-foo");
        let classifier = CommentClassifier::new(&policy, &[], &membership);

        let veto = classifier.classify(&comment(4, "mr-foo", ":-1:"));
        assert!(veto.is_veto());
        assert_eq!(veto.groups, vec!["foo", "devs"]);

        let chatter = classifier.classify(&comment(5, "mr-foo", "lgtm"));
        assert_eq!(chatter.kind, CommentKind::Neither);
        assert!(chatter.groups.is_empty());
    }

    #[test]
    fn test_membership_queries_one_per_user_and_org() {
        let policy = policy(&format!(
            "{}  from:\n    orgs: [zalando]\n  groups:\n    z:\n      from:\n        orgs: [zalando]\n",
            DEFAULT
        ));
        let comments = vec![
            comment(1, "user1", ":+1:"),
            comment(2, "user2", ":+1:"),
            comment(3, "user3", ":-1:"),
            comment(4, "user1", ":+1:"),
            comment(5, "user4", "just chatting"),
        ];
        let queries = membership_queries(&policy, &[], &comments);
        assert_eq!(queries.org_checks.len(), 3);
        assert!(queries.collaborator_checks.is_empty());
    }

    #[test]
    fn test_membership_queries_skip_when_no_orgs() {
        let policy = policy(DEFAULT);
        let comments = vec![comment(1, "user1", ":+1:")];
        assert!(membership_queries(&policy, &[], &comments).is_empty());
    }
}
