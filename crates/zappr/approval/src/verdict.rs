//! Verdict renderer
//!
//! Turns a tally into the commit status published for the PR head:
//! - any veto ⇒ `failure`, listing every vetoing user
//! - repository minimum and every active group minimum met ⇒ `success`
//! - otherwise `pending`, naming what is still missing
//!
//! The `error` state is never produced here; it is reserved for
//! collaborator failures and built by the router.

use tracing::info;
use zappr_types::{ApprovalPolicy, Tally, Verdict};

/// Description of the status posted as soon as an evaluation starts
pub const IN_PROGRESS_DESCRIPTION: &str = "Approval validation in progress.";

/// Renders commit status verdicts
#[derive(Clone, Debug, Default)]
pub struct VerdictRenderer;

impl VerdictRenderer {
    pub fn new() -> Self {
        Self
    }

    /// The status posted before any counting happens
    pub fn in_progress(&self) -> Verdict {
        Verdict::pending(IN_PROGRESS_DESCRIPTION)
    }

    /// Final status for a tally. `active_groups` are the groups whose
    /// minimum is enforced; other groups never block.
    pub fn render(&self, policy: &ApprovalPolicy, tally: &Tally, active_groups: &[String]) -> Verdict {
        let verdict = if tally.has_vetoes() {
            Verdict::failure(format!("Vetoes: {}.", mention(&tally.vetoes.total)))
        } else {
            let given = tally.approvals.count();
            let minimum = policy.minimum as usize;
            let missing_groups = self.missing_groups(policy, tally, active_groups);

            if given < minimum {
                Verdict::pending(format!(
                    "This PR needs {} more approvals ({}/{} given).",
                    minimum - given,
                    given,
                    minimum
                ))
            } else if !missing_groups.is_empty() {
                Verdict::pending(format!("This PR needs {}.", missing_groups.join(", ")))
            } else if given == 0 {
                Verdict::success("No approvals required.")
            } else {
                Verdict::success(format!("Approvals: {}.", mention(&tally.approvals.total)))
            }
        };

        info!(state = %verdict.state, description = %verdict.description, "Rendered verdict");
        verdict
    }

    /// "N more approvals from group G (x/m given)" for each active group
    /// below its minimum, in declaration order
    fn missing_groups(&self, policy: &ApprovalPolicy, tally: &Tally, active_groups: &[String]) -> Vec<String> {
        policy
            .groups
            .iter()
            .filter(|group| active_groups.iter().any(|name| *name == group.name))
            .filter_map(|group| {
                let given = tally.approvals.group(&group.name).len();
                let minimum = group.minimum as usize;
                (given < minimum).then(|| {
                    format!(
                        "{} more approvals from group {} ({}/{} given)",
                        minimum - given,
                        group.name,
                        given,
                        minimum
                    )
                })
            })
            .collect()
    }
}

fn mention(users: &[String]) -> String {
    users
        .iter()
        .map(|u| format!("@{}", u))
        .collect::<Vec<_>>()
        .join(", ")
}
