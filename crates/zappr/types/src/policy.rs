//! Compiled approval policy
//!
//! An [`ApprovalPolicy`] is built once from an [`ApprovalConfig`] and owns
//! every compiled regex and glob matcher the engine needs. Absent optional
//! sections compile to their "unconstrained" form, so the engine never has
//! to interpret a missing key.

use crate::config::{ApprovalConfig, BadgeConfig, Conditions, FromConfig, IgnoreRule, ListCondition};
use crate::error::{ConfigError, ConfigResult};
use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;
use std::collections::HashSet;

/// Validated, ready-to-evaluate approval policy
#[derive(Debug, Clone)]
pub struct ApprovalPolicy {
    pub minimum: u32,
    pub approval_pattern: Regex,
    pub veto_pattern: Regex,
    pub ignore: IgnoreRule,
    /// `None` means anyone may approve
    pub from: Option<FromRule>,
    pub bot_user_pattern: Option<Regex>,
    /// Groups in declaration order
    pub groups: Vec<GroupPolicy>,
}

/// A compiled approval group
#[derive(Debug, Clone)]
pub struct GroupPolicy {
    pub name: String,
    pub minimum: u32,
    pub from: FromRule,
    pub badge: Option<BadgeConfig>,
    pub conditions: ConditionPolicy,
}

/// Membership rule shared by the top-level `from` and group `from`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FromRule {
    pub users: Vec<String>,
    pub orgs: Vec<String>,
    pub collaborators: bool,
}

impl From<&FromConfig> for FromRule {
    fn from(config: &FromConfig) -> Self {
        Self {
            users: config.users.clone(),
            orgs: config.orgs.clone(),
            collaborators: config.collaborators,
        }
    }
}

impl FromRule {
    pub fn lists_user(&self, login: &str) -> bool {
        self.users.iter().any(|u| u == login)
    }
}

/// Compiled group conditions. Both parts absent means always active.
#[derive(Debug, Clone, Default)]
pub struct ConditionPolicy {
    pub labels: Option<LabelCondition>,
    pub files: Option<FileCondition>,
}

impl ConditionPolicy {
    pub fn is_unconditional(&self) -> bool {
        self.labels.is_none() && self.files.is_none()
    }
}

/// Label include/exclude sets
#[derive(Debug, Clone, Default)]
pub struct LabelCondition {
    pub include: Option<HashSet<String>>,
    pub exclude: Option<HashSet<String>>,
}

/// File include/exclude glob sets
#[derive(Debug, Clone)]
pub struct FileCondition {
    pub include: Option<GlobSet>,
    pub exclude: Option<GlobSet>,
}

impl ApprovalConfig {
    /// Validate and compile this configuration
    pub fn compile(&self) -> ConfigResult<ApprovalPolicy> {
        let approval_pattern = compile_regex("approvals.pattern", &self.pattern)?;
        let veto_pattern = compile_regex("approvals.veto.pattern", &self.veto.pattern)?;
        let bot_user_pattern = self
            .bot_user_pattern
            .as_deref()
            .map(|p| compile_regex("approvals.bot_user_pattern", p))
            .transpose()?;

        let from = self
            .from
            .as_ref()
            .filter(|f| !f.is_empty())
            .map(FromRule::from);

        let mut groups = Vec::with_capacity(self.groups.len());
        for (name, group) in self.groups.iter() {
            let conditions = match &group.conditions {
                Some(conditions) => compile_conditions(name, conditions)?,
                None => ConditionPolicy::default(),
            };
            groups.push(GroupPolicy {
                name: name.to_string(),
                minimum: group.minimum,
                from: FromRule::from(&group.from),
                badge: group.badge.clone(),
                conditions,
            });
        }

        Ok(ApprovalPolicy {
            minimum: self.minimum,
            approval_pattern,
            veto_pattern,
            ignore: self.ignore,
            from,
            bot_user_pattern,
            groups,
        })
    }
}

impl ApprovalPolicy {
    /// Whether any group declares a label condition
    pub fn needs_labels(&self) -> bool {
        self.groups.iter().any(|g| g.conditions.labels.is_some())
    }

    /// Whether any group declares a file condition
    pub fn needs_files(&self) -> bool {
        self.groups.iter().any(|g| g.conditions.files.is_some())
    }

    /// Whether the login matches the configured bot pattern
    pub fn is_bot(&self, login: &str) -> bool {
        self.bot_user_pattern
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(login))
    }

    pub fn group(&self, name: &str) -> Option<&GroupPolicy> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// All `from` rules that take part in evaluation: the top-level rule
    /// (if any) followed by each group's rule
    pub fn from_rules(&self) -> impl Iterator<Item = &FromRule> {
        self.from.iter().chain(self.groups.iter().map(|g| &g.from))
    }
}

fn compile_regex(field: &str, pattern: &str) -> ConfigResult<Regex> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
        field: field.to_string(),
        source,
    })
}

fn compile_conditions(group: &str, conditions: &Conditions) -> ConfigResult<ConditionPolicy> {
    let labels = conditions.labels.as_ref().map(|labels| LabelCondition {
        include: labels.include.as_ref().map(|l| l.iter().cloned().collect()),
        exclude: labels.exclude.as_ref().map(|l| l.iter().cloned().collect()),
    });

    let files = match &conditions.files {
        Some(files) => Some(compile_file_condition(group, files)?),
        None => None,
    };

    Ok(ConditionPolicy { labels, files })
}

fn compile_file_condition(group: &str, files: &ListCondition) -> ConfigResult<FileCondition> {
    let include = files
        .include
        .as_deref()
        .map(|globs| compile_globs(&format!("groups.{}.conditions.files.include", group), globs))
        .transpose()?;
    let exclude = files
        .exclude
        .as_deref()
        .map(|globs| compile_globs(&format!("groups.{}.conditions.files.exclude", group), globs))
        .transpose()?;
    Ok(FileCondition { include, exclude })
}

fn compile_globs(field: &str, globs: &[String]) -> ConfigResult<GlobSet> {
    let invalid = |source| ConfigError::InvalidGlob {
        field: field.to_string(),
        source,
    };
    let mut builder = GlobSetBuilder::new();
    for pattern in globs {
        builder.add(Glob::new(pattern).map_err(invalid)?);
    }
    builder.build().map_err(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepositoryConfig;

    #[test]
    fn test_compile_defaults() {
        let policy = ApprovalConfig::default().compile().unwrap();
        assert_eq!(policy.minimum, 2);
        assert!(policy.approval_pattern.is_match(":+1:"));
        assert!(policy.approval_pattern.is_match("👍"));
        assert!(policy.veto_pattern.is_match(":-1:"));
        assert!(!policy.approval_pattern.is_match("awesome :+1:"));
        assert!(policy.from.is_none());
        assert!(!policy.needs_labels());
        assert!(!policy.needs_files());
    }

    #[test]
    fn test_invalid_pattern_names_field() {
        let config = ApprovalConfig {
            pattern: "(".to_string(),
            ..Default::default()
        };
        match config.compile() {
            Err(ConfigError::InvalidPattern { field, .. }) => assert_eq!(field, "approvals.pattern"),
            other => panic!("expected InvalidPattern, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_glob_names_group() {
        let yaml = r#"
approvals:
  groups:
    docs:
      conditions:
        files:
          include: ["a[b"]
"#;
        let config = RepositoryConfig::from_yaml(yaml).unwrap();
        match config.approvals.compile() {
            Err(ConfigError::InvalidGlob { field, .. }) => {
                assert_eq!(field, "groups.docs.conditions.files.include")
            }
            other => panic!("expected InvalidGlob, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_top_level_from_means_anyone() {
        let config = ApprovalConfig {
            from: Some(FromConfig::default()),
            ..Default::default()
        };
        assert!(config.compile().unwrap().from.is_none());
    }

    #[test]
    fn test_condition_kinds_detected() {
        let yaml = r#"
approvals:
  groups:
    a:
      conditions:
        labels:
          include: [security]
    b:
      minimum: 1
"#;
        let policy = RepositoryConfig::from_yaml(yaml)
            .unwrap()
            .approvals
            .compile()
            .unwrap();
        assert!(policy.needs_labels());
        assert!(!policy.needs_files());
        assert!(policy.group("b").unwrap().conditions.is_unconditional());
    }

    #[test]
    fn test_bot_pattern() {
        let config = ApprovalConfig {
            bot_user_pattern: Some(r"(\[bot\]$|-robot$)".to_string()),
            ..Default::default()
        };
        let policy = config.compile().unwrap();
        assert!(policy.is_bot("codecov[bot]"));
        assert!(policy.is_bot("v-robot"));
        assert!(!policy.is_bot("robotnik"));
    }
}
