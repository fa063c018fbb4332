//! Stack existence check that routes a run to the create or update path.

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::core::classifier::ErrorClass;
use crate::core::types::StackDescription;
use crate::io::clock::Clock;
use crate::io::cloudformation::CloudFormation;
use crate::progress::ProvisionEvent;
use crate::session::Session;

/// Whether the target stack currently exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackPresence {
    Present(StackDescription),
    Absent,
}

/// Describe `stack_name` and classify the answer.
///
/// A "does not exist" error means absent; any other provider error is returned.
#[instrument(skip(session))]
pub fn probe_stack<C: CloudFormation, K: Clock>(
    session: &Session<'_, C, K>,
    stack_name: &str,
) -> Result<StackPresence> {
    session.emit(ProvisionEvent::CheckingStack {
        stack_name: stack_name.to_string(),
    });

    let stacks = match session.cfn.describe_stacks(stack_name) {
        Ok(stacks) => stacks,
        Err(err) if err.class() == ErrorClass::StackMissing => {
            debug!(message = %err.message, "stack reported missing");
            session.emit(ProvisionEvent::StackAbsent);
            return Ok(StackPresence::Absent);
        }
        Err(err) => {
            return Err(err).with_context(|| format!("check whether stack {stack_name} exists"));
        }
    };
    debug!(?stacks, "described stacks");

    match stacks
        .into_iter()
        .find(|stack| stack.stack_name == stack_name)
    {
        Some(stack) => {
            info!(status = %stack.status, "stack exists");
            session.emit(ProvisionEvent::StackFound {
                status: stack.status.clone(),
            });
            Ok(StackPresence::Present(stack))
        }
        None => {
            session.emit(ProvisionEvent::StackAbsent);
            Ok(StackPresence::Absent)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::StackStatus;
    use crate::io::cloudformation::ProviderError;
    use crate::test_support::{
        FakeClock, ScriptedCloudFormation, access_denied_error, missing_stack_error, stack,
    };

    #[test]
    fn matching_stack_is_present() {
        let cfn = ScriptedCloudFormation::new()
            .describe_statuses("demo-app", &[StackStatus::UpdateComplete]);
        let clock = FakeClock::new();
        let session = Session::new(&cfn, &clock);

        let presence = probe_stack(&session, "demo-app").expect("probe");
        assert_eq!(
            presence,
            StackPresence::Present(stack("demo-app", StackStatus::UpdateComplete))
        );
    }

    #[test]
    fn does_not_exist_error_is_absent() {
        let cfn = ScriptedCloudFormation::new().describe(Err(missing_stack_error("demo-app")));
        let clock = FakeClock::new();
        let session = Session::new(&cfn, &clock);

        let presence = probe_stack(&session, "demo-app").expect("probe");
        assert_eq!(presence, StackPresence::Absent);
    }

    #[test]
    fn other_names_in_response_are_ignored() {
        let cfn = ScriptedCloudFormation::new()
            .describe(Ok(vec![stack("demo-app-old", StackStatus::CreateComplete)]));
        let clock = FakeClock::new();
        let session = Session::new(&cfn, &clock);

        let presence = probe_stack(&session, "demo-app").expect("probe");
        assert_eq!(presence, StackPresence::Absent);
    }

    #[test]
    fn access_denied_is_fatal() {
        let cfn = ScriptedCloudFormation::new().describe(Err(access_denied_error("DescribeStacks")));
        let clock = FakeClock::new();
        let session = Session::new(&cfn, &clock);

        let err = probe_stack(&session, "demo-app").expect_err("denied");
        let provider = err.downcast_ref::<ProviderError>().expect("provider error");
        assert_eq!(provider.code.as_deref(), Some("AccessDenied"));
        assert!(format!("{err:#}").contains("not authorized"));
    }
}
