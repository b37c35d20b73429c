//! Pull request record store
//!
//! Tracks, per pull request, the time of the last push and the frozen
//! comments taken since then.

mod memory;
mod traits;

pub use memory::{InMemoryPullRequestStore, StoreCall};
pub use traits::{PullRequestRecord, PullRequestStore};
