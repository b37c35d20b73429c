//! Condition matcher: decides which approval groups are active
//!
//! A group without conditions is always active. Label and file conditions
//! are combined with AND, and within each kind `exclude` is checked before
//! `include`: a matching exclude deactivates the group regardless of
//! include.

use globset::GlobSet;
use tracing::debug;
use zappr_types::{ApprovalPolicy, ConditionPolicy, FileCondition, LabelCondition};

/// The PR facts conditions are evaluated against. Either list may be left
/// empty when no group declares a condition of that kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequestFacts {
    pub labels: Vec<String>,
    pub files: Vec<String>,
}

impl PullRequestFacts {
    pub fn new(labels: Vec<String>, files: Vec<String>) -> Self {
        Self { labels, files }
    }
}

/// Evaluates group conditions
#[derive(Clone, Debug, Default)]
pub struct ConditionMatcher;

impl ConditionMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Whether all configured conditions hold for the PR
    pub fn matches(&self, conditions: &ConditionPolicy, facts: &PullRequestFacts) -> bool {
        let labels_ok = conditions
            .labels
            .as_ref()
            .map_or(true, |labels| self.labels_match(labels, &facts.labels));
        let files_ok = conditions
            .files
            .as_ref()
            .map_or(true, |files| self.files_match(files, &facts.files));
        labels_ok && files_ok
    }

    /// Names of the groups whose minimum is enforced for this PR, in
    /// declaration order
    pub fn active_groups(&self, policy: &ApprovalPolicy, facts: &PullRequestFacts) -> Vec<String> {
        policy
            .groups
            .iter()
            .filter(|group| {
                let active = self.matches(&group.conditions, facts);
                if !group.conditions.is_unconditional() {
                    debug!(group = %group.name, active, "Evaluated group conditions");
                }
                active
            })
            .map(|group| group.name.clone())
            .collect()
    }

    fn labels_match(&self, condition: &LabelCondition, labels: &[String]) -> bool {
        if let Some(exclude) = &condition.exclude {
            if labels.iter().any(|l| exclude.contains(l)) {
                return false;
            }
        }
        match &condition.include {
            Some(include) => labels.iter().any(|l| include.contains(l)),
            None => true,
        }
    }

    fn files_match(&self, condition: &FileCondition, files: &[String]) -> bool {
        let hit = |set: &GlobSet| {
            files
                .iter()
                .any(|path| set.is_match(path) || set.is_match(basename(path)))
        };
        if let Some(exclude) = &condition.exclude {
            if hit(exclude) {
                return false;
            }
        }
        match &condition.include {
            Some(include) => hit(include),
            None => true,
        }
    }
}

/// Final path component of a repository-relative path
fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use zappr_types::RepositoryConfig;

    fn policy(yaml: &str) -> ApprovalPolicy {
        RepositoryConfig::from_yaml(yaml)
            .unwrap()
            .approvals
            .compile()
            .unwrap()
    }

    fn labels(items: &[&str]) -> PullRequestFacts {
        PullRequestFacts::new(items.iter().map(|s| s.to_string()).collect(), Vec::new())
    }

    fn files(items: &[&str]) -> PullRequestFacts {
        PullRequestFacts::new(Vec::new(), items.iter().map(|s| s.to_string()).collect())
    }

    const LABELS: &str = r#"
approvals:
  groups:
    baz:
      minimum: 1
      from:
        users: [faz]
      conditions:
        labels:
          include: [goodlabel]
          exclude: [badlabel]
"#;

    const FILES: &str = r#"
approvals:
  groups:
    baz:
      minimum: 1
      conditions:
        files:
          include: ["*.foo", ".foo.bar", "foo.bar"]
"#;

    #[test]
    fn test_unconditional_group_is_active() {
        let policy = policy("approvals:\n  groups:\n    core:\n      minimum: 1\n");
        let matcher = ConditionMatcher::new();
        assert_eq!(matcher.active_groups(&policy, &PullRequestFacts::default()), vec!["core"]);
    }

    #[test]
    fn test_label_include() {
        let policy = policy(LABELS);
        let matcher = ConditionMatcher::new();
        assert_eq!(matcher.active_groups(&policy, &labels(&["goodlabel"])), vec!["baz"]);
        assert_eq!(
            matcher.active_groups(&policy, &labels(&["goodlabel", "indifferentlabel"])),
            vec!["baz"]
        );
        assert!(matcher.active_groups(&policy, &labels(&["foolabel"])).is_empty());
        assert!(matcher.active_groups(&policy, &labels(&[])).is_empty());
    }

    #[test]
    fn test_label_exclude_beats_include() {
        let policy = policy(LABELS);
        let matcher = ConditionMatcher::new();
        assert!(matcher
            .active_groups(&policy, &labels(&["goodlabel", "badlabel"]))
            .is_empty());
    }

    #[test]
    fn test_label_exclude_only() {
        let policy = policy(
            "approvals:\n  groups:\n    baz:\n      conditions:\n        labels:\n          exclude: [badlabel]\n",
        );
        let matcher = ConditionMatcher::new();
        assert_eq!(matcher.active_groups(&policy, &labels(&[])), vec!["baz"]);
        assert_eq!(matcher.active_groups(&policy, &labels(&["foolabel"])), vec!["baz"]);
        assert!(matcher
            .active_groups(&policy, &labels(&["badlabel", "indifferentlabel"]))
            .is_empty());
    }

    #[test]
    fn test_file_include_matches_nested_and_root_paths() {
        let policy = policy(FILES);
        let matcher = ConditionMatcher::new();
        assert_eq!(
            matcher.active_groups(&policy, &files(&["foo/dir/a.a", "foo/dir/c.foo"])),
            vec!["baz"]
        );
        assert_eq!(matcher.active_groups(&policy, &files(&["c.foo"])), vec!["baz"]);
        assert!(matcher
            .active_groups(&policy, &files(&["foo/dir/a.a", "foo/dir/c.c"]))
            .is_empty());
    }

    #[test]
    fn test_file_literal_matches_path_or_basename_only() {
        let policy = policy(FILES);
        let matcher = ConditionMatcher::new();
        assert_eq!(matcher.active_groups(&policy, &files(&[".foo.bar"])), vec!["baz"]);
        assert_eq!(matcher.active_groups(&policy, &files(&["x/.foo.bar"])), vec!["baz"]);
        assert!(matcher.active_groups(&policy, &files(&["x.foo.bar.txt"])).is_empty());
    }

    #[test]
    fn test_file_exclude() {
        let policy = policy(
            "approvals:\n  groups:\n    baz:\n      conditions:\n        files:\n          exclude: [\"*.foo\"]\n",
        );
        let matcher = ConditionMatcher::new();
        assert_eq!(matcher.active_groups(&policy, &files(&["foo/dir/c.c"])), vec!["baz"]);
        assert!(matcher
            .active_groups(&policy, &files(&["foo/dir/c.foo", "foo/dir/d.d"]))
            .is_empty());
    }

    #[test]
    fn test_labels_and_files_combine_with_and() {
        let policy = policy(
            r#"
approvals:
  groups:
    baz:
      conditions:
        labels:
          include: [goodlabel]
        files:
          include: ["*.foo"]
"#,
        );
        let matcher = ConditionMatcher::new();
        let both = PullRequestFacts::new(
            vec!["goodlabel".into(), "badlabel".into()],
            vec!["foo/dir/c.foo".into()],
        );
        let label_only = PullRequestFacts::new(vec!["goodlabel".into()], vec!["foo/dir/c.c".into()]);
        let file_only = PullRequestFacts::new(Vec::new(), vec!["foo/dir/c.foo".into()]);

        assert_eq!(matcher.active_groups(&policy, &both), vec!["baz"]);
        assert!(matcher.active_groups(&policy, &label_only).is_empty());
        assert!(matcher.active_groups(&policy, &file_only).is_empty());
    }

    proptest! {
        #[test]
        fn prop_exclude_beats_include(label in "[a-z]{1,8}", others in proptest::collection::vec("[a-z]{1,8}", 0..4)) {
            let policy = policy(&format!(
                "approvals:\n  groups:\n    g:\n      conditions:\n        labels:\n          include: ['{0}']\n          exclude: ['{0}']\n",
                label
            ));
            let mut labels = others;
            labels.push(label);
            let facts = PullRequestFacts::new(labels, Vec::new());
            prop_assert!(ConditionMatcher::new().active_groups(&policy, &facts).is_empty());
        }
    }
}
