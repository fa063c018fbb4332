//! Stack update: wait for a stable state, apply the template, wait again, then tag.

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::core::classifier::ErrorClass;
use crate::core::types::{CAPABILITY_GRANT, Settlement};
use crate::create::status_reason;
use crate::io::clock::Clock;
use crate::io::cloudformation::{CloudFormation, ProviderError, UpdateStackRequest};
use crate::io::config::ProvisionConfig;
use crate::io::template::Template;
use crate::progress::ProvisionEvent;
use crate::session::Session;
use crate::tags::{TagOutcome, reconcile_tags};
use crate::wait::{Settled, wait_until_settled};

/// What the provider did with the update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The update started and the stack settled afterwards.
    Applied { settled: Settled },
    /// The template matched what is deployed.
    NoChanges,
    /// The provider refused the update and the run continued.
    Rejected { error: ProviderError },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    pub outcome: UpdateOutcome,
    pub tags: TagOutcome,
}

/// Update the existing stack named by `config.target` with `template`.
///
/// "No updates are to be performed" is a normal outcome. Any other update error is
/// reported and tagging still runs, unless `strict_update` is set, in which case it is
/// returned. Tags are skipped when an applied update leaves the stack failed, and after a
/// rollback unless `tag_after_rollback` allows it.
#[instrument(skip_all, fields(stack_name = %config.target.stack_name))]
pub fn update_stack<C: CloudFormation, K: Clock>(
    session: &Session<'_, C, K>,
    config: &ProvisionConfig,
    template: &Template,
) -> Result<UpdateReport> {
    let stack_name = config.target.stack_name.as_str();
    let update_wait = config.settings.update_wait();
    session.emit(ProvisionEvent::CheckingUpdate {
        stack_name: stack_name.to_string(),
    });

    wait_until_settled(session, stack_name, &update_wait)?;

    let request = UpdateStackRequest {
        stack_name: stack_name.to_string(),
        template_body: template.body.clone(),
        capabilities: CAPABILITY_GRANT.to_vec(),
    };
    let outcome = match session.cfn.update_stack(&request) {
        Ok(stack_id) => {
            info!(%stack_id, "stack update started");
            let settled = wait_until_settled(session, stack_name, &update_wait)?;
            if settled.settlement == Settlement::Succeeded {
                session.emit(ProvisionEvent::StackUpdated {
                    stack_name: stack_name.to_string(),
                    status: settled.status.clone(),
                });
            } else {
                session.emit(ProvisionEvent::StackNotSettled {
                    stack_name: stack_name.to_string(),
                    status: settled.status.clone(),
                    settlement: settled.settlement,
                });
            }
            UpdateOutcome::Applied { settled }
        }
        Err(err) => match err.class() {
            ErrorClass::NothingToUpdate => {
                info!("no stack updates to be performed");
                session.emit(ProvisionEvent::NoUpdates);
                UpdateOutcome::NoChanges
            }
            _ if config.settings.strict_update => {
                return Err(err).with_context(|| format!("update stack {stack_name} rejected"));
            }
            _ => {
                warn!(error = %err, "stack update rejected; continuing");
                session.emit(ProvisionEvent::UpdateRejected {
                    message: err.message.clone(),
                });
                UpdateOutcome::Rejected { error: err }
            }
        },
    };

    let tags = match &outcome {
        UpdateOutcome::Applied { settled } if !should_tag(settled, config) => {
            warn!(status = %settled.status, reason = ?status_reason(settled), "stack update did not succeed");
            session.emit(ProvisionEvent::TagsSkipped {
                status: settled.status.clone(),
            });
            TagOutcome::Skipped {
                status: settled.status.clone(),
            }
        }
        _ => reconcile_tags(session, &config.target, &config.settings.tag_wait())?,
    };

    Ok(UpdateReport { outcome, tags })
}

fn should_tag(settled: &Settled, config: &ProvisionConfig) -> bool {
    match settled.settlement {
        Settlement::Succeeded => true,
        Settlement::RolledBack => config.settings.tag_after_rollback,
        Settlement::Failed => false,
    }
}
