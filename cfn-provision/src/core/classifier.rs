//! Deterministic classification of provider errors.
//!
//! CloudFormation reports "stack not found" and "nothing to update" as a generic
//! `ValidationError` code, so structured codes only rule cases out. The final decision
//! for validation errors is made by [`message_compat`], which matches the provider's
//! message text.

/// What a provider error means for the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The named stack does not exist.
    StackMissing,
    /// The request would not change anything on the stack.
    NothingToUpdate,
    /// Any other failure.
    Other,
}

/// Error codes the provider uses for request validation failures.
const VALIDATION_CODES: &[&str] = &["ValidationError", "ValidationException"];

/// Error codes that can never mean "missing" or "no-op".
const HARD_FAILURE_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "ExpiredToken",
    "InvalidClientTokenId",
    "SignatureDoesNotMatch",
    "Throttling",
    "InsufficientCapabilitiesException",
    "AlreadyExistsException",
    "LimitExceededException",
    "TokenAlreadyExistsException",
];

/// Classify an error from its structured code (when present) and message.
pub fn classify_provider_error(code: Option<&str>, message: &str) -> ErrorClass {
    match code {
        Some(code) if HARD_FAILURE_CODES.contains(&code) => ErrorClass::Other,
        Some(code) if VALIDATION_CODES.contains(&code) => message_compat::classify(message),
        Some(_) => ErrorClass::Other,
        None => message_compat::classify(message),
    }
}

/// Compatibility shim matching the provider's English error text.
///
/// Fragile by nature: a provider that localizes or rewords these messages breaks
/// classification. Only consulted when no structured code settles the case.
pub mod message_compat {
    use super::ErrorClass;

    /// Suffix of `DescribeStacks` errors for unknown stacks,
    /// e.g. `Stack with id demo-app does not exist`.
    pub const STACK_MISSING_SUFFIX: &str = "does not exist";

    /// Suffix of `UpdateStack` errors when nothing changed,
    /// i.e. `No updates are to be performed.`
    pub const NOTHING_TO_UPDATE_SUFFIX: &str = "to be performed.";

    pub fn classify(message: &str) -> ErrorClass {
        let message = message.trim_end();
        if message.ends_with(STACK_MISSING_SUFFIX) {
            ErrorClass::StackMissing
        } else if message.ends_with(NOTHING_TO_UPDATE_SUFFIX) {
            ErrorClass::NothingToUpdate
        } else {
            ErrorClass::Other
        }
    }
}
