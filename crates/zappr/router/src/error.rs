//! Error types for the approval router

use thiserror::Error;

/// Failure reported by a collaborator (GitHub, PR record store, audit sink).
///
/// `Display` is the bare underlying message so it can be published verbatim
/// as the description of an `error` commit status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("{0}")]
    Vcs(String),

    #[error("{0}")]
    Store(String),

    #[error("{0}")]
    Audit(String),
}

/// Result type for collaborator calls
pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

/// Errors that escape [`ApprovalCheck::execute`](crate::router::ApprovalCheck::execute).
///
/// Collaborator failures after the initial `pending` status has been posted
/// are not errors: they become an `error` verdict.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("Invalid {event} payload: {source}")]
    Payload {
        event: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Collaborator failed: {0}")]
    Collaborator(#[from] CollaboratorError),
}

/// Result type for router operations
pub type RouterResult<T> = Result<T, RouterError>;
