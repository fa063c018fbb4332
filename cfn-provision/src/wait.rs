//! Convergence waiter: polls a stack until it leaves every in-progress state.

use std::time::Duration;

use anyhow::{Context, Result};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::core::classifier::ErrorClass;
use crate::core::poll::{PollDecision, WaitPolicy, next_poll};
use crate::core::types::{Settlement, StackDescription, StackStatus};
use crate::io::clock::Clock;
use crate::io::cloudformation::CloudFormation;
use crate::progress::ProvisionEvent;
use crate::session::Session;

/// The stack was still in progress when the wait budget ran out.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "stack {stack_name} still {last_status} after waiting {}s (limit {}s)",
    waited.as_secs(),
    max_wait.as_secs()
)]
pub struct WaitTimeout {
    pub stack_name: String,
    pub last_status: StackStatus,
    pub waited: Duration,
    pub max_wait: Duration,
}

/// A stack status outside the in-progress set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settled {
    pub status: StackStatus,
    pub settlement: Settlement,
    /// Last description seen; `None` when the stack disappeared while waiting.
    pub stack: Option<StackDescription>,
    /// Number of status queries issued.
    pub polls: u32,
}

/// Block until `stack_name` settles, polling every `policy.poll_interval`.
///
/// Settling into a failed or rolled-back state is not an error here; callers inspect
/// [`Settled::settlement`]. Exceeding `policy.max_wait` returns [`WaitTimeout`].
#[instrument(skip(session, policy), fields(interval_secs = policy.poll_interval.as_secs()))]
pub fn wait_until_settled<C: CloudFormation, K: Clock>(
    session: &Session<'_, C, K>,
    stack_name: &str,
    policy: &WaitPolicy,
) -> Result<Settled> {
    let started = session.clock.now();
    let mut polls = 0u32;
    loop {
        let stack = current_stack(session, stack_name)?;
        polls += 1;
        let status = stack
            .as_ref()
            .map_or(StackStatus::DeleteComplete, |stack| stack.status.clone());

        if let Some(settlement) = status.settlement() {
            debug!(%status, ?settlement, polls, "stack settled");
            session.emit(ProvisionEvent::Settled {
                status: status.clone(),
            });
            return Ok(Settled {
                status,
                settlement,
                stack,
                polls,
            });
        }

        let waited = session.clock.now().saturating_duration_since(started);
        match next_poll(policy, waited) {
            PollDecision::Sleep(next) => {
                debug!(%status, next_secs = next.as_secs(), "waiting for state to be resolved");
                session.emit(ProvisionEvent::Waiting {
                    status,
                    next_poll: next,
                });
                session.clock.sleep(next);
            }
            PollDecision::GiveUp => {
                warn!(%status, waited_secs = waited.as_secs(), "gave up waiting for stack");
                return Err(WaitTimeout {
                    stack_name: stack_name.to_string(),
                    last_status: status,
                    waited,
                    max_wait: policy.max_wait,
                }
                .into());
            }
        }
    }
}

/// Current description of `stack_name`, or `None` if the provider no longer knows it.
fn current_stack<C: CloudFormation, K: Clock>(
    session: &Session<'_, C, K>,
    stack_name: &str,
) -> Result<Option<StackDescription>> {
    match session.cfn.describe_stacks(stack_name) {
        Ok(stacks) => Ok(stacks.into_iter().next()),
        Err(err) if err.class() == ErrorClass::StackMissing => {
            info!(message = %err.message, "stack disappeared while waiting");
            Ok(None)
        }
        Err(err) => Err(err).with_context(|| format!("poll status of stack {stack_name}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        EventLog, FakeClock, ScriptedCloudFormation, access_denied_error, missing_stack_error,
    };

    fn policy(interval_secs: u64, max_wait_secs: u64) -> WaitPolicy {
        WaitPolicy::new(
            Duration::from_secs(interval_secs),
            Duration::from_secs(max_wait_secs),
        )
    }

    #[test]
    fn polls_three_times_and_sleeps_twice() {
        let cfn = ScriptedCloudFormation::new().describe_statuses(
            "demo-app",
            &[
                StackStatus::UpdateInProgress,
                StackStatus::UpdateInProgress,
                StackStatus::UpdateComplete,
            ],
        );
        let clock = FakeClock::new();
        let session = Session::new(&cfn, &clock);

        let settled = wait_until_settled(&session, "demo-app", &policy(10, 3600)).expect("wait");

        assert_eq!(settled.status, StackStatus::UpdateComplete);
        assert_eq!(settled.settlement, Settlement::Succeeded);
        assert_eq!(settled.polls, 3);
        assert_eq!(cfn.describe_count(), 3);
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_secs(10), Duration::from_secs(10)]
        );
    }

    #[test]
    fn settled_stack_returns_without_sleeping() {
        let cfn = ScriptedCloudFormation::new()
            .describe_statuses("demo-app", &[StackStatus::CreateComplete]);
        let clock = FakeClock::new();
        let session = Session::new(&cfn, &clock);

        let settled = wait_until_settled(&session, "demo-app", &policy(60, 3600)).expect("wait");

        assert_eq!(settled.polls, 1);
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn rollback_ends_the_wait_but_is_reported() {
        let cfn = ScriptedCloudFormation::new().describe_statuses(
            "demo-app",
            &[
                StackStatus::UpdateRollbackInProgress,
                StackStatus::UpdateRollbackCompleteCleanupInProgress,
                StackStatus::UpdateRollbackComplete,
            ],
        );
        let clock = FakeClock::new();
        let session = Session::new(&cfn, &clock);

        let settled = wait_until_settled(&session, "demo-app", &policy(10, 3600)).expect("wait");

        assert_eq!(settled.status, StackStatus::UpdateRollbackComplete);
        assert_eq!(settled.settlement, Settlement::RolledBack);
    }

    #[test]
    fn gives_up_after_max_wait() {
        let cfn = ScriptedCloudFormation::new()
            .describe_statuses("demo-app", &vec![StackStatus::CreateInProgress; 4]);
        let clock = FakeClock::new();
        let session = Session::new(&cfn, &clock);

        let err = wait_until_settled(&session, "demo-app", &policy(10, 25)).expect_err("timeout");

        let timeout = err.downcast_ref::<WaitTimeout>().expect("wait timeout");
        assert_eq!(timeout.last_status, StackStatus::CreateInProgress);
        assert_eq!(timeout.waited, Duration::from_secs(25));
        assert_eq!(cfn.describe_count(), 4);
        assert_eq!(
            clock.sleeps(),
            vec![
                Duration::from_secs(10),
                Duration::from_secs(10),
                Duration::from_secs(5)
            ]
        );
    }

    #[test]
    fn vanished_stack_settles_as_deleted() {
        let cfn = ScriptedCloudFormation::new()
            .describe_statuses("demo-app", &[StackStatus::DeleteInProgress])
            .describe(Err(missing_stack_error("demo-app")));
        let clock = FakeClock::new();
        let session = Session::new(&cfn, &clock);

        let settled = wait_until_settled(&session, "demo-app", &policy(10, 3600)).expect("wait");

        assert_eq!(settled.status, StackStatus::DeleteComplete);
        assert_eq!(settled.settlement, Settlement::Failed);
        assert_eq!(settled.stack, None);
    }

    #[test]
    fn describe_failure_aborts_wait() {
        let cfn = ScriptedCloudFormation::new()
            .describe_statuses("demo-app", &[StackStatus::UpdateInProgress])
            .describe(Err(access_denied_error("DescribeStacks")));
        let clock = FakeClock::new();
        let session = Session::new(&cfn, &clock);

        let err = wait_until_settled(&session, "demo-app", &policy(10, 3600)).expect_err("denied");
        assert!(format!("{err:#}").contains("poll status of stack demo-app"));
    }

    #[test]
    fn waiting_emits_progress_per_sleep() {
        let cfn = ScriptedCloudFormation::new().describe_statuses(
            "demo-app",
            &[StackStatus::CreateInProgress, StackStatus::CreateComplete],
        );
        let clock = FakeClock::new();
        let log = EventLog::default();
        let sink = |event: &ProvisionEvent| log.record(event);
        let session = Session::new(&cfn, &clock).with_events(&sink);

        wait_until_settled(&session, "demo-app", &policy(60, 3600)).expect("wait");

        assert_eq!(
            log.events(),
            vec![
                ProvisionEvent::Waiting {
                    status: StackStatus::CreateInProgress,
                    next_poll: Duration::from_secs(60),
                },
                ProvisionEvent::Settled {
                    status: StackStatus::CreateComplete,
                },
            ]
        );
    }
}
