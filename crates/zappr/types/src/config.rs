//! Repository policy as written in `.zappr.yaml`
//!
//! These structs mirror the YAML document one-to-one. They are validated
//! and compiled into an [`ApprovalPolicy`](crate::policy::ApprovalPolicy)
//! exactly once, via [`ApprovalConfig::compile`].

use crate::error::ConfigResult;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Top-level `.zappr.yaml` document. Only the `approvals` section is
/// interpreted here; other sections are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryConfig {
    #[serde(default)]
    pub approvals: ApprovalConfig,
}

impl RepositoryConfig {
    /// Parse a `.zappr.yaml` document
    pub fn from_yaml(source: &str) -> ConfigResult<Self> {
        Ok(serde_yaml::from_str(source)?)
    }
}

/// The `approvals` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalConfig {
    /// Repository-wide number of distinct approvers required
    #[serde(default = "default_minimum")]
    pub minimum: u32,

    /// Approval marker, matched against the trimmed comment body
    #[serde(default = "default_approval_pattern")]
    pub pattern: String,

    /// Veto marker
    #[serde(default)]
    pub veto: VetoConfig,

    /// Users whose comments never count
    #[serde(default)]
    pub ignore: IgnoreRule,

    /// Who may approve at all. Absent means anyone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<FromConfig>,

    /// Logins matching this pattern are treated as bots and never count
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_user_pattern: Option<String>,

    /// Named approval groups, in declaration order
    #[serde(default)]
    pub groups: GroupMap,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            minimum: default_minimum(),
            pattern: default_approval_pattern(),
            veto: VetoConfig::default(),
            ignore: IgnoreRule::None,
            from: None,
            bot_user_pattern: None,
            groups: GroupMap::default(),
        }
    }
}

/// The `approvals.veto` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VetoConfig {
    #[serde(default = "default_veto_pattern")]
    pub pattern: String,
}

impl Default for VetoConfig {
    fn default() -> Self {
        Self {
            pattern: default_veto_pattern(),
        }
    }
}

/// Which PR participants are excluded from counting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreRule {
    #[default]
    None,
    LastCommitter,
    PrOpener,
    Both,
}

impl IgnoreRule {
    pub fn ignores_last_committer(&self) -> bool {
        matches!(self, IgnoreRule::LastCommitter | IgnoreRule::Both)
    }

    pub fn ignores_pr_opener(&self) -> bool {
        matches!(self, IgnoreRule::PrOpener | IgnoreRule::Both)
    }
}

/// A `from` block: explicit users, organization members, or repository
/// collaborators
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FromConfig {
    #[serde(default)]
    pub users: Vec<String>,

    #[serde(default)]
    pub orgs: Vec<String>,

    #[serde(default)]
    pub collaborators: bool,
}

impl FromConfig {
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.orgs.is_empty() && !self.collaborators
    }
}

/// One entry of `approvals.groups`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupConfig {
    #[serde(default)]
    pub minimum: u32,

    #[serde(default)]
    pub from: FromConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<BadgeConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Conditions>,
}

/// Badge images appended to approving/vetoing comments of group members
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approve: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub veto: Option<String>,
}

/// Conditions gating whether a group's minimum is enforced
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<ListCondition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<ListCondition>,
}

/// Include/exclude lists for labels (exact names) or files (globs)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListCondition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<Vec<String>>,
}

/// Approval groups keyed by name, keeping YAML declaration order
#[derive(Debug, Clone, Default)]
pub struct GroupMap(Vec<(String, GroupConfig)>);

impl GroupMap {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Add or replace a group. A replaced group keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, group: GroupConfig) {
        let name = name.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = group,
            None => self.0.push((name, group)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&GroupConfig> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, g)| g)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &GroupConfig)> {
        self.0.iter().map(|(n, g)| (n.as_str(), g))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, GroupConfig)> for GroupMap {
    fn from_iter<I: IntoIterator<Item = (String, GroupConfig)>>(iter: I) -> Self {
        let mut map = GroupMap::new();
        for (name, group) in iter {
            map.insert(name, group);
        }
        map
    }
}

impl Serialize for GroupMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, group) in &self.0 {
            map.serialize_entry(name, group)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for GroupMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct GroupMapVisitor;

        impl<'de> Visitor<'de> for GroupMapVisitor {
            type Value = GroupMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of group names to group configurations")
            }

            fn visit_unit<E: serde::de::Error>(self) -> Result<GroupMap, E> {
                Ok(GroupMap::new())
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<GroupMap, A::Error> {
                let mut map = GroupMap::new();
                while let Some((name, group)) = access.next_entry::<String, GroupConfig>()? {
                    map.insert(name, group);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_any(GroupMapVisitor)
    }
}

// Default value helpers
fn default_minimum() -> u32 {
    2
}

fn default_approval_pattern() -> String {
    r"^(:\+1:|👍)$".to_string()
}

fn default_veto_pattern() -> String {
    r"^(:\-1:|👎)$".to_string()
}
