//! The iteration control loop: assemble → run → record → decide.

use std::fmt;
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{debug, error, info, warn};

use crate::io::agent::{AgentCommand, AgentExit, AgentRunner};
use crate::io::iteration_log::{IterationRecord, append_activity, write_run_meta, write_run_output};
use crate::io::operator::OperatorInput;
use crate::io::prompt::{PromptBuilder, PromptInputs};
use crate::io::store::{self, ApprovalState, StorePaths};
use crate::session::{Mode, Session};

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStop {
    /// Agent output contained the completion token.
    AgentSignaledDone,
    /// Operator approved the plan (planning mode only).
    PlanApproved,
    /// The configured iteration budget ran out.
    MaxIterations,
}

/// Summary of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopOutcome {
    pub iterations: u32,
    pub stop: LoopStop,
}

/// `run` was invoked before the plan was approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotApprovedError;

impl fmt::Display for NotApprovedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "plan not approved yet: run the plan subcommand and type 'approve' first"
        )
    }
}

impl std::error::Error for NotApprovedError {}

/// Token the agent emits to end the session, matched case-insensitively
/// anywhere in its output.
const DONE_TOKEN: &str = "DONE";

fn contains_done(output: &str) -> bool {
    output.to_uppercase().contains(DONE_TOKEN)
}

/// Run one full session against `root`.
///
/// Initializes the state store, enforces the approval gate, drives up to
/// `session.max_iterations` rounds, and removes the prompt document on
/// every exit path.
pub fn run_session<A: AgentRunner, O: OperatorInput>(
    root: &Path,
    session: &Session,
    command: &AgentCommand,
    agent: &A,
    operator: &mut O,
) -> Result<LoopOutcome> {
    let paths = StorePaths::new(root);
    store::init_store(&paths)?;

    match (session.mode, store::approval_state(&paths)) {
        (Mode::Planning, ApprovalState::Approved) => {
            info!("existing approved plan found, re-entering planning to refine it");
            if let Err(err) = store::clear_approval(&paths) {
                warn!(err = %err, "failed to clear approval marker");
            }
        }
        (Mode::Execution, ApprovalState::Pending) => {
            store::remove_prompt(&paths);
            return Err(NotApprovedError.into());
        }
        _ => {}
    }

    let result = drive_loop(&paths, session, command, agent, operator);
    store::remove_prompt(&paths);
    result
}

fn drive_loop<A: AgentRunner, O: OperatorInput>(
    paths: &StorePaths,
    session: &Session,
    command: &AgentCommand,
    agent: &A,
    operator: &mut O,
) -> Result<LoopOutcome> {
    let builder = PromptBuilder::new();
    let mut feedback: Option<String> = None;

    for iter in 1..=session.max_iterations {
        info!(
            iter,
            max = session.max_iterations,
            phase = session.mode.phase_name(),
            "starting iteration"
        );

        let inputs = PromptInputs::from_root(paths, session, feedback.take());
        let prompt = builder.build(&inputs)?;
        if session.verbose {
            debug!(prompt = %prompt, "assembled prompt");
        }
        // The agent reads the prompt from disk; a write failure leaves a
        // stale prompt in place but does not abort the session.
        if let Err(err) = std::fs::write(&paths.prompt_path, &prompt) {
            error!(path = %paths.prompt_path.display(), err = %err, "failed to write prompt document");
        }

        let started_at = Local::now();
        let start = Instant::now();
        let invocation = agent.run(command, &paths.prompt_path);
        let duration = start.elapsed();

        match &invocation.exit {
            AgentExit::Completed => {}
            AgentExit::SpawnFailed { message } => {
                error!(message = %message, "failed to start agent");
            }
            AgentExit::Failed { code } => {
                warn!(code = ?code, "agent finished with error");
            }
        }

        let record = IterationRecord {
            iter,
            max_iterations: session.max_iterations,
            phase: session.mode.phase_name().to_string(),
            started_at: started_at.format("%Y%m%d-%H%M%S").to_string(),
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            agent_exit: invocation.exit.describe(),
        };
        if let Err(err) = append_activity(paths, &record) {
            warn!(err = %err, "failed to append activity log");
        }
        if let Err(err) = write_run_output(paths, &record, &invocation.output) {
            warn!(err = %err, "failed to write run log");
        }
        if let Err(err) = write_run_meta(paths, &record) {
            warn!(err = %err, "failed to write run metadata");
        }

        if contains_done(&invocation.output) {
            info!(iter, "agent signaled completion (DONE)");
            return Ok(LoopOutcome {
                iterations: iter,
                stop: LoopStop::AgentSignaledDone,
            });
        }

        if iter < session.max_iterations {
            let ask = match session.mode {
                Mode::Planning => {
                    "\n[?] Plan looks good? Type 'approve' to save and exit, or provide feedback: "
                }
                Mode::Execution => {
                    "\n[?] Provide feedback/answers (or press Enter to continue): "
                }
            };
            match operator.read_line(ask) {
                Ok(Some(input)) => {
                    if session.mode == Mode::Planning
                        && input.trim().eq_ignore_ascii_case("approve")
                    {
                        store::write_approval(paths).context("record plan approval")?;
                        info!("plan approved, start execution with the run subcommand");
                        return Ok(LoopOutcome {
                            iterations: iter,
                            stop: LoopStop::PlanApproved,
                        });
                    }
                    if !input.is_empty() {
                        feedback = Some(input);
                    }
                }
                Ok(None) => {}
                // A broken stdin is treated like a closed one.
                Err(err) => {
                    warn!(err = %err, "failed to read operator input");
                }
            }
        }
    }

    info!(max = session.max_iterations, "reached maximum iterations");
    Ok(LoopOutcome {
        iterations: session.max_iterations,
        stop: LoopStop::MaxIterations,
    })
}
