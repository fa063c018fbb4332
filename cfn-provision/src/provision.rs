//! Top-level workflow: validate the template, then create or update the stack.

use anyhow::Result;
use tracing::{info, instrument};

use crate::core::types::{Settlement, StackStatus};
use crate::create::create_stack;
use crate::io::clock::Clock;
use crate::io::cloudformation::CloudFormation;
use crate::io::config::ProvisionConfig;
use crate::io::template::Template;
use crate::probe::{StackPresence, probe_stack};
use crate::session::Session;
use crate::tags::TagOutcome;
use crate::update::{UpdateOutcome, update_stack};
use crate::validate::validate_template;

/// Which mutation the run performed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Created { stack_id: String },
    Updated(UpdateOutcome),
}

/// Summary of one provisioning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionOutcome {
    pub stack_name: String,
    pub mutation: Mutation,
    /// Last status observed for the stack, if the run observed one.
    pub final_status: Option<StackStatus>,
    /// Settlement of the create or update this run applied; `None` when nothing was applied.
    pub settlement: Option<Settlement>,
    pub tags: TagOutcome,
}

impl ProvisionOutcome {
    /// False when the applied mutation or the tag update left the stack anywhere but a
    /// successful state.
    pub fn is_healthy(&self) -> bool {
        matches!(self.settlement, None | Some(Settlement::Succeeded))
            && !matches!(self.tags, TagOutcome::NotApplied { .. })
    }
}

/// Run the full workflow for `config.target`.
///
/// Template validation gates every mutation, and a failed existence check aborts the run
/// rather than falling through to creation.
#[instrument(skip_all, fields(stack_name = %config.target.stack_name))]
pub fn provision<C: CloudFormation, K: Clock>(
    session: &Session<'_, C, K>,
    config: &ProvisionConfig,
    template: &Template,
) -> Result<ProvisionOutcome> {
    validate_template(session, template)?;

    let stack_name = config.target.stack_name.clone();
    let outcome = match probe_stack(session, &stack_name)? {
        StackPresence::Absent => {
            let created = create_stack(session, config, template)?;
            ProvisionOutcome {
                stack_name,
                final_status: Some(final_status(&created.tags, &created.settled.status)),
                settlement: Some(created.settled.settlement),
                mutation: Mutation::Created {
                    stack_id: created.stack_id,
                },
                tags: created.tags,
            }
        }
        StackPresence::Present(existing) => {
            let report = update_stack(session, config, template)?;
            let (final_status, settlement) = match &report.outcome {
                UpdateOutcome::Applied { settled } => (
                    Some(final_status(&report.tags, &settled.status)),
                    Some(settled.settlement),
                ),
                UpdateOutcome::NoChanges | UpdateOutcome::Rejected { .. } => {
                    let status = report
                        .tags
                        .settled_status()
                        .cloned()
                        .unwrap_or(existing.status);
                    (Some(status), None)
                }
            };
            ProvisionOutcome {
                stack_name,
                mutation: Mutation::Updated(report.outcome),
                final_status,
                settlement,
                tags: report.tags,
            }
        }
    };

    info!(
        final_status = ?outcome.final_status,
        settlement = ?outcome.settlement,
        "provisioning finished"
    );
    Ok(outcome)
}

fn final_status(tags: &TagOutcome, mutation_status: &StackStatus) -> StackStatus {
    tags.settled_status().unwrap_or(mutation_status).clone()
}
