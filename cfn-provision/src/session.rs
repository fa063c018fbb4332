//! Collaborators shared by every step of a provisioning run.

use crate::io::clock::Clock;
use crate::io::cloudformation::CloudFormation;
use crate::progress::ProvisionEvent;

/// Provider, clock and progress sink for one run.
///
/// Steps borrow the session instead of reaching for globals, so a test can swap in a
/// scripted provider and a fake clock.
pub struct Session<'a, C: CloudFormation, K: Clock> {
    pub cfn: &'a C,
    pub clock: &'a K,
    on_event: Option<&'a dyn Fn(&ProvisionEvent)>,
}

impl<'a, C: CloudFormation, K: Clock> Session<'a, C, K> {
    pub fn new(cfn: &'a C, clock: &'a K) -> Self {
        Self {
            cfn,
            clock,
            on_event: None,
        }
    }

    /// Route progress events to `on_event`.
    pub fn with_events(mut self, on_event: &'a dyn Fn(&ProvisionEvent)) -> Self {
        self.on_event = Some(on_event);
        self
    }

    pub fn emit(&self, event: ProvisionEvent) {
        if let Some(on_event) = self.on_event {
            on_event(&event);
        }
    }
}
