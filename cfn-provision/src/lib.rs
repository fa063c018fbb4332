//! Provision a single CloudFormation stack from a CI job.
//!
//! One run validates a template remotely, then creates the stack if it is absent or
//! updates it if present, waits for the provider to settle it, and re-applies a fixed
//! set of organizational tags. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (status model, error classification, tag
//!   construction, poll scheduling). No I/O.
//! - **[`io`]**: Side-effecting operations (environment and settings, template files,
//!   the provider client, the clock). Behind traits so tests can script them.
//!
//! Orchestration modules ([`validate`], [`probe`], [`wait`], [`create`], [`update`],
//! [`tags`], [`provision`]) combine the two through a [`session::Session`].

pub mod core;
pub mod create;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod probe;
pub mod progress;
pub mod provision;
pub mod session;
pub mod tags;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod update;
pub mod validate;
pub mod wait;
