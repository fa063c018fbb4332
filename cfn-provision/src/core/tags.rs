//! Organizational tags applied after every stack mutation.

use crate::core::types::TagSet;

pub const BILLING_ENV_KEY: &str = "Billing_Env";
pub const TEAM_KEY: &str = "Team";
pub const PROJECT_KEY: &str = "Project";

/// Build the fixed tag triple for a stack. The project tag is always the stack name.
pub fn stack_tags(stack_name: &str, billing_env: &str, team: &str) -> TagSet {
    let mut tags = TagSet::new();
    tags.insert(BILLING_ENV_KEY, billing_env);
    tags.insert(TEAM_KEY, team);
    tags.insert(PROJECT_KEY, stack_name);
    tags
}
