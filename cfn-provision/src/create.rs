//! Stack creation: create, wait for it to settle, then tag.

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::core::types::{CAPABILITY_GRANT, Settlement};
use crate::io::clock::Clock;
use crate::io::cloudformation::{CloudFormation, CreateStackRequest};
use crate::io::config::ProvisionConfig;
use crate::io::template::Template;
use crate::progress::ProvisionEvent;
use crate::session::Session;
use crate::tags::{TagOutcome, reconcile_tags};
use crate::wait::{Settled, wait_until_settled};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateOutcome {
    pub stack_id: String,
    pub settled: Settled,
    pub tags: TagOutcome,
}

/// Create the stack named by `config.target` from `template`.
///
/// A creation that settles into anything but a successful state is returned, not raised;
/// tags are only reconciled when the stack came up.
#[instrument(skip_all, fields(stack_name = %config.target.stack_name))]
pub fn create_stack<C: CloudFormation, K: Clock>(
    session: &Session<'_, C, K>,
    config: &ProvisionConfig,
    template: &Template,
) -> Result<CreateOutcome> {
    let stack_name = config.target.stack_name.as_str();
    session.emit(ProvisionEvent::CreatingStack {
        stack_name: stack_name.to_string(),
    });

    let request = CreateStackRequest {
        stack_name: stack_name.to_string(),
        template_body: template.body.clone(),
        capabilities: CAPABILITY_GRANT.to_vec(),
        on_failure: config.settings.on_failure,
    };
    let stack_id = session
        .cfn
        .create_stack(&request)
        .with_context(|| format!("create stack {stack_name}"))?;
    info!(%stack_id, "stack creation started");

    let settled = wait_until_settled(session, stack_name, &config.settings.create_wait())?;
    let tags = if settled.settlement == Settlement::Succeeded {
        session.emit(ProvisionEvent::StackCreated {
            stack_name: stack_name.to_string(),
            status: settled.status.clone(),
        });
        reconcile_tags(session, &config.target, &config.settings.tag_wait())?
    } else {
        warn!(status = %settled.status, reason = ?status_reason(&settled), "stack creation did not succeed");
        session.emit(ProvisionEvent::StackNotSettled {
            stack_name: stack_name.to_string(),
            status: settled.status.clone(),
            settlement: settled.settlement,
        });
        session.emit(ProvisionEvent::TagsSkipped {
            status: settled.status.clone(),
        });
        TagOutcome::Skipped {
            status: settled.status.clone(),
        }
    };

    Ok(CreateOutcome {
        stack_id,
        settled,
        tags,
    })
}

pub(crate) fn status_reason(settled: &Settled) -> Option<&str> {
    settled
        .stack
        .as_ref()
        .and_then(|stack| stack.status_reason.as_deref())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::core::types::{OnFailure, StackStatus};
    use crate::progress::{DONE_GLYPH, render};
    use crate::test_support::{
        EventLog, FakeClock, ScriptedCloudFormation, access_denied_error, config, stack_id,
    };

    fn template() -> Template {
        Template::from_body("cloudformation.template", "{\"Resources\":{}}").expect("template")
    }

    #[test]
    fn creates_waits_then_tags() {
        let cfn = ScriptedCloudFormation::new()
            .create(Ok(stack_id("demo-app")))
            .describe_statuses(
                "demo-app",
                &[
                    StackStatus::CreateInProgress,
                    StackStatus::CreateComplete,
                    StackStatus::CreateComplete,
                    StackStatus::UpdateComplete,
                ],
            )
            .update_tags(Ok(stack_id("demo-app")));
        let clock = FakeClock::new();
        let session = Session::new(&cfn, &clock);

        let outcome = create_stack(&session, &config("demo-app"), &template()).expect("create");

        assert_eq!(outcome.stack_id, stack_id("demo-app"));
        assert_eq!(outcome.settled.status, StackStatus::CreateComplete);
        assert_eq!(
            outcome.tags,
            TagOutcome::Applied {
                status: StackStatus::UpdateComplete
            }
        );
        let requests = cfn.create_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].capabilities, CAPABILITY_GRANT.to_vec());
        assert_eq!(requests[0].on_failure, OnFailure::DoNothing);
        assert_eq!(requests[0].template_body, "{\"Resources\":{}}");
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(60)]);
    }

    #[test]
    fn failed_creation_skips_tags() {
        let cfn = ScriptedCloudFormation::new()
            .create(Ok(stack_id("demo-app")))
            .describe_statuses(
                "demo-app",
                &[StackStatus::CreateInProgress, StackStatus::CreateFailed],
            );
        let clock = FakeClock::new();
        let log = EventLog::default();
        let sink = |event: &ProvisionEvent| log.record(event);
        let session = Session::new(&cfn, &clock).with_events(&sink);

        let outcome = create_stack(&session, &config("demo-app"), &template()).expect("create");

        assert_eq!(outcome.settled.settlement, Settlement::Failed);
        assert_eq!(
            outcome.tags,
            TagOutcome::Skipped {
                status: StackStatus::CreateFailed
            }
        );
        assert!(cfn.tag_requests().is_empty());

        let lines: Vec<String> = log
            .events()
            .iter()
            .filter(|event| !event.is_diagnostic())
            .map(render)
            .collect();
        assert_eq!(
            lines,
            vec![
                "\t  Creating stack demo-app".to_string(),
                "\t! CloudFormation stack \"demo-app\" failed (CREATE_FAILED).".to_string(),
                "\t! Skipping tags, stack settled in CREATE_FAILED.".to_string(),
            ]
        );
        assert!(!lines.iter().any(|line| line.starts_with(&format!("\t{DONE_GLYPH}"))));
    }

    #[test]
    fn create_rejection_is_fatal() {
        let cfn =
            ScriptedCloudFormation::new().create(Err(access_denied_error("CreateStack")));
        let clock = FakeClock::new();
        let session = Session::new(&cfn, &clock);

        let err = create_stack(&session, &config("demo-app"), &template()).expect_err("denied");

        assert!(format!("{err:#}").contains("create stack demo-app"));
        assert_eq!(cfn.describe_count(), 0);
    }
}
