//! Agent subprocess execution through the operator's shell.
//!
//! The [`AgentRunner`] trait decouples the loop from the actual agent
//! backend. Tests use scripted runners that return predetermined output
//! without spawning processes.

use std::io::{Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::{debug, warn};

/// Placeholder token in the command template, replaced with the prompt
/// document path at each invocation.
pub const PROMPT_PLACEHOLDER: &str = "{prompt}";

/// Built-in command template used when `AGENT_CMD` is unset.
pub const DEFAULT_AGENT_CMD: &str = "gemini -y -s -p \"$(cat {prompt})\"";

/// Shell command template for invoking the agent.
#[derive(Debug, Clone)]
pub struct AgentCommand {
    template: String,
}

impl AgentCommand {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Resolve from the `AGENT_CMD` environment variable, falling back to
    /// the built-in default with a warning.
    pub fn from_env() -> Self {
        match std::env::var("AGENT_CMD") {
            Ok(template) if !template.trim().is_empty() => Self::new(template),
            _ => {
                warn!("AGENT_CMD not set, using default agent command: {DEFAULT_AGENT_CMD}");
                Self::new(DEFAULT_AGENT_CMD)
            }
        }
    }

    /// Substitute the `{prompt}` placeholder with the prompt document path.
    pub fn render(&self, prompt_path: &Path) -> String {
        self.template
            .replace(PROMPT_PLACEHOLDER, &prompt_path.to_string_lossy())
    }
}

/// How the agent subprocess ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentExit {
    Completed,
    /// Started but exited nonzero (or was killed by a signal).
    Failed { code: Option<i32> },
    /// The subprocess could not be started at all.
    SpawnFailed { message: String },
}

impl AgentExit {
    pub fn describe(&self) -> String {
        match self {
            Self::Completed => "completed".to_string(),
            Self::Failed { code: Some(code) } => format!("failed (exit code {code})"),
            Self::Failed { code: None } => "failed (no exit code)".to_string(),
            Self::SpawnFailed { message } => format!("spawn failed: {message}"),
        }
    }
}

/// Captured result of one agent invocation.
///
/// Output accumulated up to the point of failure is returned even when the
/// agent exits nonzero or cannot be started.
#[derive(Debug)]
pub struct AgentInvocation {
    pub output: String,
    pub exit: AgentExit,
}

/// Seam between the controller and the agent backend.
pub trait AgentRunner {
    fn run(&self, command: &AgentCommand, prompt_path: &Path) -> AgentInvocation;
}

/// Runs the rendered command through `bash -c`, blocking until it exits.
///
/// Stdout and stderr are forwarded to the controlling terminal as the agent
/// streams them, while being accumulated into a single combined buffer.
/// There is deliberately no timeout: an agent that never exits blocks the
/// session until the operator intervenes.
pub struct ShellAgent;

impl AgentRunner for ShellAgent {
    fn run(&self, command: &AgentCommand, prompt_path: &Path) -> AgentInvocation {
        let cmdline = command.render(prompt_path);
        debug!(cmdline = %cmdline, "invoking agent");

        let mut child = match Command::new("bash")
            .arg("-c")
            .arg(&cmdline)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(err) => {
                return AgentInvocation {
                    output: String::new(),
                    exit: AgentExit::SpawnFailed {
                        message: err.to_string(),
                    },
                };
            }
        };

        let buffer = Arc::new(Mutex::new(Vec::new()));
        let stdout_handle = child.stdout.take().map(|stream| {
            let sink = Arc::clone(&buffer);
            thread::spawn(move || tee_stream(stream, Tee::Stdout, &sink))
        });
        let stderr_handle = child.stderr.take().map(|stream| {
            let sink = Arc::clone(&buffer);
            thread::spawn(move || tee_stream(stream, Tee::Stderr, &sink))
        });

        let status = child.wait();

        for handle in [stdout_handle, stderr_handle].into_iter().flatten() {
            if handle.join().is_err() {
                warn!("agent output reader thread panicked");
            }
        }

        let output = match buffer.lock() {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(_) => String::new(),
        };
        let exit = match status {
            Ok(status) if status.success() => AgentExit::Completed,
            Ok(status) => AgentExit::Failed {
                code: status.code(),
            },
            Err(err) => {
                warn!(err = %err, "failed waiting for agent");
                AgentExit::Failed { code: None }
            }
        };
        AgentInvocation { output, exit }
    }
}

enum Tee {
    Stdout,
    Stderr,
}

/// Forward a child stream to the terminal while accumulating it.
///
/// Forwarding is best-effort; capture into the shared buffer is what the
/// loop depends on.
fn tee_stream<R: Read>(mut reader: R, target: Tee, sink: &Mutex<Vec<u8>>) {
    let mut chunk = [0u8; 8192];
    loop {
        let read = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(read) => read,
            Err(_) => break,
        };
        let bytes = &chunk[..read];
        match target {
            Tee::Stdout => {
                let mut out = std::io::stdout().lock();
                let _ = out.write_all(bytes);
                let _ = out.flush();
            }
            Tee::Stderr => {
                let mut err = std::io::stderr().lock();
                let _ = err.write_all(bytes);
                let _ = err.flush();
            }
        }
        if let Ok(mut buf) = sink.lock() {
            buf.extend_from_slice(bytes);
        }
    }
}
