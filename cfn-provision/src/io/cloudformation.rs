//! Provider abstraction for stack operations.
//!
//! The [`CloudFormation`] trait decouples the provisioning workflow from the AWS SDK.
//! Tests use scripted providers that return predetermined responses without network
//! access; production uses [`crate::io::aws::AwsCloudFormation`].

use thiserror::Error;

use crate::core::classifier::{ErrorClass, classify_provider_error};
use crate::core::types::{Capability, OnFailure, StackDescription, TagSet, TemplateSummary};

/// Error returned by a provider call, carrying the provider's message verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} failed: {message}")]
pub struct ProviderError {
    /// Remote operation that failed (e.g. `DescribeStacks`).
    pub operation: &'static str,
    /// Structured error code, when the provider returned one.
    pub code: Option<String>,
    pub message: String,
}

impl ProviderError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn class(&self) -> ErrorClass {
        classify_provider_error(self.code.as_deref(), &self.message)
    }
}

/// Parameters for `CreateStack`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateStackRequest {
    pub stack_name: String,
    pub template_body: String,
    pub capabilities: Vec<Capability>,
    pub on_failure: OnFailure,
}

/// Parameters for `UpdateStack` with a new template body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateStackRequest {
    pub stack_name: String,
    pub template_body: String,
    pub capabilities: Vec<Capability>,
}

/// Parameters for a metadata-only `UpdateStack` that keeps the current template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTagsRequest {
    pub stack_name: String,
    pub tags: TagSet,
    pub capabilities: Vec<Capability>,
    /// Parameters re-sent with `UsePreviousValue` so the provider keeps their values.
    pub previous_parameter_keys: Vec<String>,
}

/// Abstraction over the remote provisioning API.
pub trait CloudFormation {
    fn validate_template(&self, template_body: &str) -> Result<TemplateSummary, ProviderError>;

    /// Describe stacks by name. Unknown names fail with a "does not exist" error.
    fn describe_stacks(&self, stack_name: &str) -> Result<Vec<StackDescription>, ProviderError>;

    /// Start stack creation. Returns the new stack id.
    fn create_stack(&self, request: &CreateStackRequest) -> Result<String, ProviderError>;

    /// Start a template update. Returns the stack id.
    fn update_stack(&self, request: &UpdateStackRequest) -> Result<String, ProviderError>;

    /// Start a tag-only update reusing the previous template. Returns the stack id.
    fn update_stack_tags(&self, request: &UpdateTagsRequest) -> Result<String, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_keeps_provider_message_verbatim() {
        let err = ProviderError::new("DescribeStacks", "Stack with id demo-app does not exist")
            .with_code("ValidationError");
        assert_eq!(
            err.to_string(),
            "DescribeStacks failed: Stack with id demo-app does not exist"
        );
        assert_eq!(err.class(), ErrorClass::StackMissing);
    }

    #[test]
    fn class_uses_structured_code_first() {
        let err = ProviderError::new(
            "DescribeStacks",
            "not authorized to perform cloudformation:DescribeStacks",
        )
        .with_code("AccessDenied");
        assert_eq!(err.class(), ErrorClass::Other);
    }
}
