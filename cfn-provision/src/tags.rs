//! Tag reconciler: re-applies the organizational tag set after a mutation.

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::core::classifier::ErrorClass;
use crate::core::poll::WaitPolicy;
use crate::core::types::{CAPABILITY_GRANT, Settlement, StackStatus};
use crate::io::clock::Clock;
use crate::io::cloudformation::{CloudFormation, UpdateTagsRequest};
use crate::io::config::StackTarget;
use crate::progress::ProvisionEvent;
use crate::session::Session;
use crate::wait::wait_until_settled;

/// Result of a tag reconciliation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagOutcome {
    /// Tags were written; carries the status after the tag update settled.
    Applied { status: StackStatus },
    /// The provider reported the tags already match.
    Unchanged,
    /// Not attempted because the mutation left the stack unusable.
    Skipped { status: StackStatus },
    /// The tag update was accepted but did not settle successfully.
    NotApplied {
        status: StackStatus,
        settlement: Settlement,
    },
}

impl TagOutcome {
    /// Status the stack settled in after a tag update, when one was issued and settled.
    pub fn settled_status(&self) -> Option<&StackStatus> {
        match self {
            Self::Applied { status } | Self::NotApplied { status, .. } => Some(status),
            Self::Unchanged | Self::Skipped { .. } => None,
        }
    }
}

/// Apply `Billing_Env`, `Team` and `Project` to the target stack.
///
/// The request keeps the current template and every existing parameter value, so only
/// metadata changes. "Nothing to update" counts as success; any other error is returned.
/// A tag update that settles anywhere but a successful state is reported as
/// [`TagOutcome::NotApplied`].
#[instrument(skip_all, fields(stack_name = %target.stack_name))]
pub fn reconcile_tags<C: CloudFormation, K: Clock>(
    session: &Session<'_, C, K>,
    target: &StackTarget,
    policy: &WaitPolicy,
) -> Result<TagOutcome> {
    session.emit(ProvisionEvent::SettingTags);
    let stack_name = target.stack_name.as_str();
    let before = wait_until_settled(session, stack_name, policy)?;

    let request = UpdateTagsRequest {
        stack_name: stack_name.to_string(),
        tags: target.tags(),
        capabilities: CAPABILITY_GRANT.to_vec(),
        previous_parameter_keys: before
            .stack
            .map(|stack| stack.parameter_keys)
            .unwrap_or_default(),
    };

    match session.cfn.update_stack_tags(&request) {
        Ok(_) => {
            let after = wait_until_settled(session, stack_name, policy)?;
            if after.settlement != Settlement::Succeeded {
                warn!(status = %after.status, settlement = ?after.settlement, "tag update did not succeed");
                session.emit(ProvisionEvent::TagsNotApplied {
                    status: after.status.clone(),
                });
                return Ok(TagOutcome::NotApplied {
                    status: after.status,
                    settlement: after.settlement,
                });
            }
            info!(status = %after.status, "tags set");
            session.emit(ProvisionEvent::TagsSet);
            Ok(TagOutcome::Applied {
                status: after.status,
            })
        }
        Err(err) if err.class() == ErrorClass::NothingToUpdate => {
            info!("no tag updates to be performed");
            session.emit(ProvisionEvent::TagsUnchanged);
            Ok(TagOutcome::Unchanged)
        }
        Err(err) => Err(err).with_context(|| format!("set tags on stack {stack_name}")),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::core::types::TagSet;
    use crate::test_support::{
        EventLog, FakeClock, ScriptedCloudFormation, access_denied_error, no_updates_error, stack,
        stack_id, target,
    };

    fn policy() -> WaitPolicy {
        WaitPolicy::new(Duration::from_secs(5), Duration::from_secs(600))
    }

    #[test]
    fn applies_tag_triple_and_waits_on_both_sides() {
        let cfn = ScriptedCloudFormation::new()
            .describe_statuses(
                "demo-app",
                &[
                    StackStatus::CreateComplete,
                    StackStatus::UpdateInProgress,
                    StackStatus::UpdateComplete,
                ],
            )
            .update_tags(Ok(stack_id("demo-app")));
        let clock = FakeClock::new();
        let session = Session::new(&cfn, &clock);

        let outcome = reconcile_tags(&session, &target("demo-app"), &policy()).expect("tags");

        assert_eq!(
            outcome,
            TagOutcome::Applied {
                status: StackStatus::UpdateComplete
            }
        );
        let requests = cfn.tag_requests();
        assert_eq!(requests.len(), 1);
        let expected: TagSet = [
            ("Billing_Env", "prod"),
            ("Team", "platform"),
            ("Project", "demo-app"),
        ]
        .into_iter()
        .collect();
        assert_eq!(requests[0].tags, expected);
        assert_eq!(requests[0].capabilities, CAPABILITY_GRANT.to_vec());
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(5)]);
    }

    #[test]
    fn rolled_back_tag_update_is_not_applied() {
        let cfn = ScriptedCloudFormation::new()
            .describe_statuses(
                "demo-app",
                &[
                    StackStatus::UpdateComplete,
                    StackStatus::UpdateRollbackInProgress,
                    StackStatus::UpdateRollbackComplete,
                ],
            )
            .update_tags(Ok(stack_id("demo-app")));
        let clock = FakeClock::new();
        let log = EventLog::default();
        let sink = |event: &ProvisionEvent| log.record(event);
        let session = Session::new(&cfn, &clock).with_events(&sink);

        let outcome = reconcile_tags(&session, &target("demo-app"), &policy()).expect("tags");

        assert_eq!(
            outcome,
            TagOutcome::NotApplied {
                status: StackStatus::UpdateRollbackComplete,
                settlement: Settlement::RolledBack,
            }
        );
        let events = log.events();
        assert!(!events.contains(&ProvisionEvent::TagsSet));
        assert!(events.contains(&ProvisionEvent::TagsNotApplied {
            status: StackStatus::UpdateRollbackComplete
        }));
    }

    #[test]
    fn reuses_existing_parameter_values() {
        let mut described = stack("demo-app", StackStatus::UpdateComplete);
        described.parameter_keys = vec!["Environment".to_string(), "VpcId".to_string()];
        let cfn = ScriptedCloudFormation::new()
            .describe(Ok(vec![described]))
            .update_tags(Err(no_updates_error()));
        let clock = FakeClock::new();
        let session = Session::new(&cfn, &clock);

        reconcile_tags(&session, &target("demo-app"), &policy()).expect("tags");

        assert_eq!(
            cfn.tag_requests()[0].previous_parameter_keys,
            vec!["Environment".to_string(), "VpcId".to_string()]
        );
    }

    #[test]
    fn nothing_to_update_is_success() {
        let cfn = ScriptedCloudFormation::new()
            .describe_statuses("demo-app", &[StackStatus::UpdateComplete])
            .update_tags(Err(no_updates_error()));
        let clock = FakeClock::new();
        let session = Session::new(&cfn, &clock);

        let outcome = reconcile_tags(&session, &target("demo-app"), &policy()).expect("tags");

        assert_eq!(outcome, TagOutcome::Unchanged);
        assert_eq!(cfn.describe_count(), 1);
    }

    #[test]
    fn other_tag_errors_are_fatal() {
        let cfn = ScriptedCloudFormation::new()
            .describe_statuses("demo-app", &[StackStatus::UpdateComplete])
            .update_tags(Err(access_denied_error("UpdateStack")));
        let clock = FakeClock::new();
        let session = Session::new(&cfn, &clock);

        let err = reconcile_tags(&session, &target("demo-app"), &policy()).expect_err("denied");
        assert!(format!("{err:#}").contains("set tags on stack demo-app"));
    }
}
