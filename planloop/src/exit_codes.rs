//! Stable exit codes for planloop CLI commands.

/// Session finished normally (DONE signaled, plan approved, or iteration
/// budget exhausted).
pub const OK: i32 = 0;
/// Fatal startup or I/O failure (state directory uncreatable, blank plan
/// goal, approval marker write failure).
pub const INVALID: i32 = 1;
/// Argument parse errors (clap's own convention).
pub const USAGE: i32 = 2;
/// `run` invoked before the plan was approved.
pub const NOT_APPROVED: i32 = 3;
