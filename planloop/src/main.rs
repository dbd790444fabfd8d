//! Iterative plan → approve → execute loop around an external coding agent.
//!
//! Drives the state store under `.planloop/` and the agent command from
//! `AGENT_CMD`, pausing between iterations for operator feedback.

use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use planloop::exit_codes;
use planloop::io::agent::{AgentCommand, ShellAgent};
use planloop::io::operator::StdinOperator;
use planloop::logging;
use planloop::looping::{LoopStop, NotApprovedError, run_session};
use planloop::session::{DEFAULT_MAX_ITERATIONS, Mode, Session};

const AGENT_CMD_HELP: &str = "\
The agent is configured through the AGENT_CMD environment variable, a shell
command template whose {prompt} token is replaced with the prompt file path:

  AGENT_CMD='gemini -y -s -p \"$(cat {prompt})\"' planloop plan \"design a vault manager\"
  AGENT_CMD='claude -p \"$(cat {prompt})\" --dangerously-skip-permissions' planloop run
  AGENT_CMD='opencode run \"$(cat {prompt})\"' planloop plan \"...\"
  AGENT_CMD='droid exec --skip-permissions-unsafe -f {prompt}' planloop run";

#[derive(Parser)]
#[command(
    name = "planloop",
    version,
    about = "Iterative plan/approve/execute loop around an external coding agent",
    after_help = AGENT_CMD_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start or resume the planning phase.
    Plan {
        /// Maximum number of iterations.
        #[arg(long = "max", value_name = "N", default_value_t = DEFAULT_MAX_ITERATIONS)]
        max_iterations: u32,
        /// Verbose mode (log assembled prompts).
        #[arg(short = 'v', long)]
        verbose: bool,
        /// Goal text; remaining arguments are joined with spaces.
        #[arg(required = true)]
        goal: Vec<String>,
    },
    /// Execute an approved plan.
    Run {
        /// Maximum number of iterations.
        #[arg(long = "max", value_name = "N", default_value_t = DEFAULT_MAX_ITERATIONS)]
        max_iterations: u32,
        /// Verbose mode (log assembled prompts).
        #[arg(short = 'v', long)]
        verbose: bool,
        /// Optional goal text; remaining arguments are joined with spaces.
        goal: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("{err:#}");
        let code = if err.is::<NotApprovedError>() {
            exit_codes::NOT_APPROVED
        } else {
            exit_codes::INVALID
        };
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> Result<()> {
    let (mode, max_iterations, verbose, goal) = match cli.command {
        Command::Plan {
            max_iterations,
            verbose,
            goal,
        } => (Mode::Planning, max_iterations, verbose, goal),
        Command::Run {
            max_iterations,
            verbose,
            goal,
        } => (Mode::Execution, max_iterations, verbose, goal),
    };

    logging::init(verbose);
    let session = Session::new(mode, goal.join(" "), max_iterations, verbose)?;
    info!(phase = session.mode.phase_name(), goal = %session.goal, "starting session");

    let command = AgentCommand::from_env();
    let outcome = run_session(
        Path::new("."),
        &session,
        &command,
        &ShellAgent,
        &mut StdinOperator,
    )?;

    match outcome.stop {
        LoopStop::AgentSignaledDone => {
            info!(iterations = outcome.iterations, "session finished: agent signaled DONE");
        }
        LoopStop::PlanApproved => {
            info!(iterations = outcome.iterations, "session finished: plan approved");
        }
        LoopStop::MaxIterations => {
            info!(iterations = outcome.iterations, "session finished: iteration budget exhausted");
        }
    }
    Ok(())
}
