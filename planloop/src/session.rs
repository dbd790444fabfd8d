//! Session configuration and phase selection.

use anyhow::{Result, bail};

/// Which phase the loop drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Planning,
    Execution,
}

impl Mode {
    /// Short phase name used in logs and run records.
    pub fn phase_name(self) -> &'static str {
        match self {
            Self::Planning => "plan",
            Self::Execution => "run",
        }
    }

    /// Fixed directive injected into every prompt for this phase.
    pub fn directive(self) -> &'static str {
        match self {
            Self::Planning => PLANNING_DIRECTIVE,
            Self::Execution => EXECUTION_DIRECTIVE,
        }
    }
}

const PLANNING_DIRECTIVE: &str = "PLANNING PHASE: You are in DESIGN mode. ONLY modify \
     .planloop/ files. DO NOT write code or install dependencies. Once the plan is ready, \
     STOP and wait for approval.";

const EXECUTION_DIRECTIVE: &str = "EXECUTION PHASE: Implement the approved plan story by \
     story. Run verification scripts.";

/// Default iteration budget when `--max` is not given.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// One invocation of the tool. Immutable after construction.
#[derive(Debug, Clone)]
pub struct Session {
    pub mode: Mode,
    /// Free-text goal. May be empty only in execution mode.
    pub goal: String,
    pub max_iterations: u32,
    pub verbose: bool,
}

impl Session {
    pub fn new(
        mode: Mode,
        goal: impl Into<String>,
        max_iterations: u32,
        verbose: bool,
    ) -> Result<Self> {
        let goal = goal.into().trim().to_string();
        if mode == Mode::Planning && goal.is_empty() {
            bail!("planning requires a goal");
        }
        if max_iterations == 0 {
            bail!("max iterations must be at least 1");
        }
        Ok(Self {
            mode,
            goal,
            max_iterations,
            verbose,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planning_requires_non_blank_goal() {
        let err = Session::new(Mode::Planning, "   ", 10, false).unwrap_err();
        assert!(err.to_string().contains("requires a goal"));
    }

    #[test]
    fn execution_allows_empty_goal() {
        let session = Session::new(Mode::Execution, "", 10, false).expect("session");
        assert_eq!(session.goal, "");
        assert_eq!(session.max_iterations, 10);
    }

    #[test]
    fn zero_iterations_is_rejected() {
        let err = Session::new(Mode::Execution, "", 0, false).unwrap_err();
        assert!(err.to_string().contains("at least 1"));
    }

    #[test]
    fn goal_is_trimmed() {
        let session = Session::new(Mode::Planning, "  build a CLI  ", 1, false).expect("session");
        assert_eq!(session.goal, "build a CLI");
    }

    #[test]
    fn directives_differ_per_phase() {
        assert_ne!(Mode::Planning.directive(), Mode::Execution.directive());
        assert!(Mode::Planning.directive().starts_with("PLANNING PHASE"));
        assert!(Mode::Execution.directive().starts_with("EXECUTION PHASE"));
    }
}
