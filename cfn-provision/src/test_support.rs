//! Test-only fakes for driving provisioning steps without AWS.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::core::types::{StackDescription, StackStatus, TagSet, TemplateSummary};
use crate::io::clock::Clock;
use crate::io::cloudformation::{
    CloudFormation, CreateStackRequest, ProviderError, UpdateStackRequest, UpdateTagsRequest,
};
use crate::io::config::{AwsCredentials, ProvisionConfig, ProvisionSettings, StackTarget};
use crate::progress::ProvisionEvent;

/// A provider call recorded by [`ScriptedCloudFormation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ValidateTemplate(String),
    DescribeStacks(String),
    CreateStack(CreateStackRequest),
    UpdateStack(UpdateStackRequest),
    UpdateStackTags(UpdateTagsRequest),
}

type Scripted<T> = RefCell<VecDeque<Result<T, ProviderError>>>;

/// Provider that replays queued responses per operation and records every call.
///
/// An operation with an empty queue fails with an "unscripted" error, so tests notice
/// calls they did not expect.
#[derive(Default)]
pub struct ScriptedCloudFormation {
    validate: Scripted<TemplateSummary>,
    describe: Scripted<Vec<StackDescription>>,
    create: Scripted<String>,
    update: Scripted<String>,
    update_tags: Scripted<String>,
    calls: RefCell<Vec<Call>>,
}

impl ScriptedCloudFormation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate_ok(self) -> Self {
        self.validate
            .borrow_mut()
            .push_back(Ok(TemplateSummary::default()));
        self
    }

    pub fn validate_err(self, err: ProviderError) -> Self {
        self.validate.borrow_mut().push_back(Err(err));
        self
    }

    /// Queue one describe response per status, in order.
    pub fn describe_statuses(self, stack_name: &str, statuses: &[StackStatus]) -> Self {
        for status in statuses {
            self.describe
                .borrow_mut()
                .push_back(Ok(vec![stack(stack_name, status.clone())]));
        }
        self
    }

    pub fn describe(self, response: Result<Vec<StackDescription>, ProviderError>) -> Self {
        self.describe.borrow_mut().push_back(response);
        self
    }

    pub fn create(self, response: Result<String, ProviderError>) -> Self {
        self.create.borrow_mut().push_back(response);
        self
    }

    pub fn update(self, response: Result<String, ProviderError>) -> Self {
        self.update.borrow_mut().push_back(response);
        self
    }

    pub fn update_tags(self, response: Result<String, ProviderError>) -> Self {
        self.update_tags.borrow_mut().push_back(response);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls.borrow().iter().filter(|call| matches(call)).count()
    }

    pub fn describe_count(&self) -> usize {
        self.count(|call| matches!(call, Call::DescribeStacks(_)))
    }

    pub fn create_requests(&self) -> Vec<CreateStackRequest> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                Call::CreateStack(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn update_requests(&self) -> Vec<UpdateStackRequest> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                Call::UpdateStack(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn tag_requests(&self) -> Vec<UpdateTagsRequest> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                Call::UpdateStackTags(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    fn next<T>(queue: &Scripted<T>, operation: &'static str) -> Result<T, ProviderError> {
        queue
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::new(operation, "unscripted call")))
    }
}

impl CloudFormation for ScriptedCloudFormation {
    fn validate_template(&self, template_body: &str) -> Result<TemplateSummary, ProviderError> {
        self.calls
            .borrow_mut()
            .push(Call::ValidateTemplate(template_body.to_string()));
        Self::next(&self.validate, "ValidateTemplate")
    }

    fn describe_stacks(&self, stack_name: &str) -> Result<Vec<StackDescription>, ProviderError> {
        self.calls
            .borrow_mut()
            .push(Call::DescribeStacks(stack_name.to_string()));
        Self::next(&self.describe, "DescribeStacks")
    }

    fn create_stack(&self, request: &CreateStackRequest) -> Result<String, ProviderError> {
        self.calls
            .borrow_mut()
            .push(Call::CreateStack(request.clone()));
        Self::next(&self.create, "CreateStack")
    }

    fn update_stack(&self, request: &UpdateStackRequest) -> Result<String, ProviderError> {
        self.calls
            .borrow_mut()
            .push(Call::UpdateStack(request.clone()));
        Self::next(&self.update, "UpdateStack")
    }

    fn update_stack_tags(&self, request: &UpdateTagsRequest) -> Result<String, ProviderError> {
        self.calls
            .borrow_mut()
            .push(Call::UpdateStackTags(request.clone()));
        Self::next(&self.update_tags, "UpdateStack")
    }
}

/// Clock whose `sleep` advances virtual time instantly.
pub struct FakeClock {
    start: Instant,
    elapsed: Cell<Duration>,
    sleeps: RefCell<Vec<Duration>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            elapsed: Cell::new(Duration::ZERO),
            sleeps: RefCell::new(Vec::new()),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed.get()
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed.get()
    }

    fn sleep(&self, duration: Duration) {
        self.elapsed.set(self.elapsed.get() + duration);
        self.sleeps.borrow_mut().push(duration);
    }
}

/// Collects progress events for assertions.
#[derive(Default)]
pub struct EventLog {
    events: RefCell<Vec<ProvisionEvent>>,
}

impl EventLog {
    pub fn record(&self, event: &ProvisionEvent) {
        self.events.borrow_mut().push(event.clone());
    }

    pub fn events(&self) -> Vec<ProvisionEvent> {
        self.events.borrow().clone()
    }
}

/// A described stack with no tags or parameters.
pub fn stack(name: &str, status: StackStatus) -> StackDescription {
    StackDescription {
        stack_id: Some(stack_id(name)),
        stack_name: name.to_string(),
        status,
        status_reason: None,
        tags: TagSet::new(),
        parameter_keys: Vec::new(),
    }
}

pub fn stack_id(name: &str) -> String {
    format!("arn:aws:cloudformation:eu-west-1:123456789012:stack/{name}/0001")
}

/// `DescribeStacks` error for an unknown stack, as the provider words it.
pub fn missing_stack_error(name: &str) -> ProviderError {
    ProviderError::new(
        "DescribeStacks",
        format!("Stack with id {name} does not exist"),
    )
    .with_code("ValidationError")
}

/// `UpdateStack` error when the request changes nothing.
pub fn no_updates_error() -> ProviderError {
    ProviderError::new("UpdateStack", "No updates are to be performed.").with_code("ValidationError")
}

pub fn access_denied_error(operation: &'static str) -> ProviderError {
    ProviderError::new(
        operation,
        format!("User: arn:aws:iam::123456789012:user/ci is not authorized to perform: cloudformation:{operation}"),
    )
    .with_code("AccessDenied")
}

pub fn template_error() -> ProviderError {
    ProviderError::new(
        "ValidateTemplate",
        "Template format error: Unresolved resource dependencies [Bucket] in the Resources block of the template",
    )
    .with_code("ValidationError")
}

pub fn target(stack_name: &str) -> StackTarget {
    StackTarget {
        stack_name: stack_name.to_string(),
        region: "eu-west-1".to_string(),
        billing_env: "prod".to_string(),
        team: "platform".to_string(),
    }
}

/// Config with short, distinct poll intervals so sleeps are attributable in assertions.
pub fn config(stack_name: &str) -> ProvisionConfig {
    ProvisionConfig {
        target: target(stack_name),
        credentials: AwsCredentials {
            access_key_id: "AKIAEXAMPLE".to_string(),
            secret_access_key: "secret".to_string(),
        },
        settings: ProvisionSettings {
            create_poll_interval_secs: 60,
            update_poll_interval_secs: 10,
            tag_poll_interval_secs: 5,
            ..ProvisionSettings::default()
        },
    }
}
