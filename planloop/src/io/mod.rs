//! Side-effecting collaborators for the iteration loop.

pub mod agent;
pub mod iteration_log;
pub mod operator;
pub mod prompt;
pub mod store;
