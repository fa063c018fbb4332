//! Human-readable progress markers for CI logs.
//!
//! # Separation of Concerns
//!
//! - **Progress (this module)**: stdout lines a pipeline user reads. A leading glyph
//!   marks steps in flight (`  `) versus finished (`✓`).
//! - **Tracing (`logging`)**: developer diagnostics on stderr, controlled by `RUST_LOG`
//!   and `--verbose`.

use std::time::Duration;

use crate::core::types::{Settlement, StackStatus};

pub const PENDING_GLYPH: &str = " ";
pub const DONE_GLYPH: &str = "✓";
pub const WARN_GLYPH: &str = "!";

/// Milestones emitted by the provisioning steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionEvent {
    ValidatingTemplate,
    TemplateValidated,
    CheckingStack { stack_name: String },
    StackFound { status: StackStatus },
    StackAbsent,
    Waiting { status: StackStatus, next_poll: Duration },
    Settled { status: StackStatus },
    CreatingStack { stack_name: String },
    StackCreated { stack_name: String, status: StackStatus },
    /// A create or update finished without succeeding.
    StackNotSettled {
        stack_name: String,
        status: StackStatus,
        settlement: Settlement,
    },
    CheckingUpdate { stack_name: String },
    StackUpdated { stack_name: String, status: StackStatus },
    NoUpdates,
    UpdateRejected { message: String },
    SettingTags,
    TagsSet,
    TagsUnchanged,
    TagsSkipped { status: StackStatus },
    TagsNotApplied { status: StackStatus },
}

impl ProvisionEvent {
    /// Events only shown in verbose mode.
    pub fn is_diagnostic(&self) -> bool {
        matches!(
            self,
            Self::Waiting { .. } | Self::Settled { .. } | Self::CheckingStack { .. }
        )
    }
}

/// Render an event as a tab-indented progress line.
pub fn render(event: &ProvisionEvent) -> String {
    match event {
        ProvisionEvent::ValidatingTemplate => line(PENDING_GLYPH, "Validating template."),
        ProvisionEvent::TemplateValidated => line(DONE_GLYPH, "Template validated."),
        ProvisionEvent::CheckingStack { stack_name } => {
            line(PENDING_GLYPH, &format!("Checking stack \"{stack_name}\"."))
        }
        ProvisionEvent::StackFound { status } => {
            line(DONE_GLYPH, &format!("Stack exists ({status})."))
        }
        ProvisionEvent::StackAbsent => line(DONE_GLYPH, "Stack does not exist yet."),
        ProvisionEvent::Waiting { status, next_poll } => line(
            PENDING_GLYPH,
            &format!(
                "Waiting for state \"{status}\" to be resolved (next check in {}s).",
                next_poll.as_secs()
            ),
        ),
        ProvisionEvent::Settled { status } => line(DONE_GLYPH, &format!("Stack settled ({status}).")),
        ProvisionEvent::CreatingStack { stack_name } => {
            line(PENDING_GLYPH, &format!("Creating stack {stack_name}"))
        }
        ProvisionEvent::StackCreated { stack_name, status } => line(
            DONE_GLYPH,
            &format!("Created CloudFormation stack for {stack_name} ({status})."),
        ),
        ProvisionEvent::StackNotSettled {
            stack_name,
            status,
            settlement,
        } => line(
            WARN_GLYPH,
            &format!(
                "CloudFormation stack \"{stack_name}\" {} ({status}).",
                settlement_phrase(*settlement)
            ),
        ),
        ProvisionEvent::CheckingUpdate { stack_name } => line(
            PENDING_GLYPH,
            &format!("Checking update for CloudFormation stack \"{stack_name}\""),
        ),
        ProvisionEvent::StackUpdated { stack_name, status } => line(
            DONE_GLYPH,
            &format!("Updated CloudFormation stack \"{stack_name}\" ({status})."),
        ),
        ProvisionEvent::NoUpdates => line(DONE_GLYPH, "No updates found in the template file."),
        ProvisionEvent::UpdateRejected { message } => {
            line(WARN_GLYPH, &format!("Update not applied: {message}"))
        }
        ProvisionEvent::SettingTags => line(PENDING_GLYPH, "Setting Stack-level tags."),
        ProvisionEvent::TagsSet => line(DONE_GLYPH, "Tags set."),
        ProvisionEvent::TagsUnchanged => line(DONE_GLYPH, "No tag updates to be performed."),
        ProvisionEvent::TagsSkipped { status } => line(
            WARN_GLYPH,
            &format!("Skipping tags, stack settled in {status}."),
        ),
        ProvisionEvent::TagsNotApplied { status } => line(
            WARN_GLYPH,
            &format!("Tags not applied, stack settled in {status}."),
        ),
    }
}

fn settlement_phrase(settlement: Settlement) -> &'static str {
    match settlement {
        Settlement::Succeeded => "settled",
        Settlement::RolledBack => "rolled back",
        Settlement::Failed => "failed",
    }
}

fn line(glyph: &str, message: &str) -> String {
    format!("\t{glyph} {message}")
}
