//! Approval and veto tallies

use crate::comment::CommentId;
use serde::{Deserialize, Serialize};

/// Users counted for one group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupVotes {
    pub name: String,
    pub users: Vec<String>,
}

/// Distinct users for one kind of vote, overall and per group.
///
/// `total` never contains a login twice; neither does any group list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCounts {
    pub total: Vec<String>,
    /// One entry per configured group, in declaration order, even if empty.
    /// Serialized as a `{name: [user]}` mapping.
    #[serde(with = "ordered_groups")]
    pub groups: Vec<GroupVotes>,
}

impl VoteCounts {
    /// Empty counts with a slot for every named group
    pub fn for_groups<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            total: Vec::new(),
            groups: names
                .into_iter()
                .map(|name| GroupVotes {
                    name: name.to_string(),
                    users: Vec::new(),
                })
                .collect(),
        }
    }

    /// Record a vote by `user`, attributed to the given groups.
    /// Returns `false` if the user had already been counted.
    pub fn record(&mut self, user: &str, groups: &[&str]) -> bool {
        let first = !self.total.iter().any(|u| u == user);
        if first {
            self.total.push(user.to_string());
        }
        for group in groups {
            if let Some(votes) = self.groups.iter_mut().find(|g| g.name == *group) {
                if !votes.users.iter().any(|u| u == user) {
                    votes.users.push(user.to_string());
                }
            }
        }
        first
    }

    /// Users counted for a group; empty if the group is unknown
    pub fn group(&self, name: &str) -> &[String] {
        self.groups
            .iter()
            .find(|g| g.name == name)
            .map(|g| g.users.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains(&self, user: &str) -> bool {
        self.total.iter().any(|u| u == user)
    }

    pub fn count(&self) -> usize {
        self.total.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total.is_empty()
    }
}

/// Result of counting a pull request's comments
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub approvals: VoteCounts,
    pub vetoes: VoteCounts,
    /// Comment ids that contributed a new approver or vetoer
    pub counted: Vec<CommentId>,
}

impl Tally {
    pub fn for_groups<'a>(names: impl IntoIterator<Item = &'a str> + Clone) -> Self {
        Self {
            approvals: VoteCounts::for_groups(names.clone()),
            vetoes: VoteCounts::for_groups(names),
            counted: Vec::new(),
        }
    }

    pub fn has_vetoes(&self) -> bool {
        !self.vetoes.is_empty()
    }
}

mod ordered_groups {
    use super::GroupVotes;
    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(groups: &[GroupVotes], serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(groups.len()))?;
        for group in groups {
            map.serialize_entry(&group.name, &group.users)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<GroupVotes>, D::Error> {
        struct GroupVotesVisitor;

        impl<'de> Visitor<'de> for GroupVotesVisitor {
            type Value = Vec<GroupVotes>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of group names to user lists")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Vec<GroupVotes>, A::Error> {
                let mut groups = Vec::new();
                while let Some((name, users)) = access.next_entry::<String, Vec<String>>()? {
                    groups.push(GroupVotes { name, users });
                }
                Ok(groups)
            }
        }

        deserializer.deserialize_map(GroupVotesVisitor)
    }
}
