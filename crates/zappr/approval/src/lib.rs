//! Zappr approval engine
//!
//! Pure decision logic behind the approval check. Given a compiled
//! [`ApprovalPolicy`](zappr_types::ApprovalPolicy) and data already fetched
//! from GitHub, the engine:
//! - decides which approval groups are active for a PR ([`conditions`])
//! - classifies comments as approvals or vetoes ([`classifier`])
//! - protects counted comments against tampering ([`freezer`])
//! - counts distinct approvers and vetoers ([`tally`])
//! - renders the commit status and comment badges ([`verdict`], [`badge`])
//!
//! It performs no I/O. Fetching inputs and publishing outputs is the job of
//! the router crate.

pub mod badge;
pub mod classifier;
pub mod conditions;
pub mod freezer;
pub mod tally;
pub mod verdict;

pub use badge::BadgeRenderer;
pub use classifier::{
    membership_queries, Classification, CommentClassifier, CommentKind, Membership, MembershipQueries,
};
pub use conditions::{ConditionMatcher, PullRequestFacts};
pub use freezer::{CommentChange, CommentEdit, CommentFreezer, Reconciled};
pub use tally::TallyEngine;
pub use verdict::{VerdictRenderer, IN_PROGRESS_DESCRIPTION};
