//! Zappr core types
//!
//! This crate holds the data model shared by the approval engine and the
//! webhook router:
//! - Repository policy, both as parsed from `.zappr.yaml` and compiled
//! - Pull request comments and their frozen snapshots
//! - Approval/veto tallies
//! - Commit status verdicts

pub mod comment;
pub mod config;
pub mod error;
pub mod policy;
pub mod tally;
pub mod verdict;

pub use comment::{Comment, CommentId, FrozenComment};
pub use config::{
    ApprovalConfig, BadgeConfig, Conditions, FromConfig, GroupConfig, GroupMap, IgnoreRule,
    ListCondition, RepositoryConfig, VetoConfig,
};
pub use error::{ConfigError, ConfigResult};
pub use policy::{ApprovalPolicy, ConditionPolicy, FileCondition, FromRule, GroupPolicy, LabelCondition};
pub use tally::{GroupVotes, Tally, VoteCounts};
pub use verdict::{CommitState, Verdict, STATUS_CONTEXT};
