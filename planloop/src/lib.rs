//! Iterative "plan → approve → execute" loop around an external coding agent.
//!
//! Each iteration assembles a prompt from the state store under `.planloop/`,
//! runs the operator-configured agent command synchronously, records the
//! output, and decides whether to continue, pause for operator feedback, or
//! stop. The structure keeps the control flow separate from the plumbing:
//!
//! - [`looping`]: the iteration controller and its termination rules.
//! - [`io`]: side-effecting collaborators (state store, prompt assembly,
//!   agent subprocess, run records, operator input).
//! - [`session`]: immutable per-invocation configuration.

pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
