//! Deterministic, pure logic for the provisioning workflow.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! values and return deterministic outputs suitable for tests.

pub mod classifier;
pub mod poll;
pub mod tags;
pub mod types;
