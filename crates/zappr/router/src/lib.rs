//! Zappr router
//!
//! Turns GitHub webhook deliveries into approval checks:
//! - webhook payload model and action dispatch ([`event`])
//! - collaborator traits for GitHub, the PR record store and the audit
//!   trail, each with an in-memory implementation
//! - the [`ApprovalCheck`] itself, which drives the approval engine

pub mod audit;
pub mod config;
pub mod error;
pub mod event;
pub mod github;
pub mod router;
pub mod store;

pub use audit::{AuditEvent, AuditEventKind, AuditSink, RecordingAuditSink};
pub use config::{EvalConfig, LoggingConfig};
pub use error::{CollaboratorError, CollaboratorResult, RouterError, RouterResult};
pub use event::{CommentAction, PullRequestAction, WebhookEvent};
pub use github::{GitHubFixture, RepoRef, SimulatedGitHub, VcsCall, VcsClient};
pub use router::{ApprovalCheck, Outcome};
pub use store::{InMemoryPullRequestStore, PullRequestRecord, PullRequestStore, StoreCall};
