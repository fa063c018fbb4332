//! I/O helpers for provisioning commands.

pub mod aws;
pub mod clock;
pub mod cloudformation;
pub mod config;
pub mod template;
