//! Stable exit codes for `cfn-provision` commands.

/// Command succeeded and every applied mutation settled successfully.
pub const OK: i32 = 0;
/// Configuration, validation or provider error.
pub const FAILED: i32 = 1;
/// An applied create or update settled into a failed or rolled-back state.
pub const UNHEALTHY: i32 = 2;
/// A convergence wait exceeded its time limit.
pub const TIMED_OUT: i32 = 3;
