//! Test-only scripted collaborators and workspace fixtures.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use anyhow::Result;

use crate::io::agent::{AgentCommand, AgentExit, AgentInvocation, AgentRunner};
use crate::io::operator::OperatorInput;
use crate::io::store::StorePaths;

/// One scripted agent response.
pub struct ScriptedRun {
    pub output: String,
    pub exit: AgentExit,
}

impl ScriptedRun {
    pub fn completed(output: &str) -> Self {
        Self {
            output: output.to_string(),
            exit: AgentExit::Completed,
        }
    }
}

/// Agent that replays scripted responses and records the prompt documents
/// it was invoked with.
pub struct ScriptedAgent {
    runs: RefCell<VecDeque<ScriptedRun>>,
    prompts_seen: RefCell<Vec<String>>,
}

impl ScriptedAgent {
    pub fn new(runs: Vec<ScriptedRun>) -> Self {
        Self {
            runs: RefCell::new(runs.into()),
            prompts_seen: RefCell::new(Vec::new()),
        }
    }

    /// Prompt document contents read at each invocation, in order.
    pub fn prompts_seen(&self) -> Vec<String> {
        self.prompts_seen.borrow().clone()
    }

    /// Scripted responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.runs.borrow().len()
    }
}

impl AgentRunner for ScriptedAgent {
    fn run(&self, _command: &AgentCommand, prompt_path: &Path) -> AgentInvocation {
        let prompt = fs::read_to_string(prompt_path).unwrap_or_default();
        self.prompts_seen.borrow_mut().push(prompt);
        let run = self
            .runs
            .borrow_mut()
            .pop_front()
            .expect("scripted agent exhausted");
        AgentInvocation {
            output: run.output,
            exit: run.exit,
        }
    }
}

/// Operator that replays scripted replies (`None` simulates closed stdin)
/// and records each ask.
pub struct ScriptedOperator {
    replies: VecDeque<Option<String>>,
    asks: Vec<String>,
}

impl ScriptedOperator {
    pub fn new(replies: Vec<Option<&str>>) -> Self {
        Self {
            replies: replies
                .into_iter()
                .map(|reply| reply.map(str::to_string))
                .collect(),
            asks: Vec::new(),
        }
    }

    /// Number of times the controller asked for input.
    pub fn asks(&self) -> usize {
        self.asks.len()
    }
}

impl OperatorInput for ScriptedOperator {
    fn read_line(&mut self, ask: &str) -> Result<Option<String>> {
        self.asks.push(ask.to_string());
        Ok(self.replies.pop_front().unwrap_or(None))
    }
}

/// Temporary workspace with a `.planloop/` store for loop tests.
pub struct TestWorkspace {
    temp: tempfile::TempDir,
}

impl TestWorkspace {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp: tempfile::tempdir()?,
        })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn paths(&self) -> StorePaths {
        StorePaths::new(self.root())
    }

    /// Write a file inside the state directory, creating parents if needed.
    pub fn write_state_file(&self, name: &str, contents: &str) -> Result<()> {
        let path = self.paths().store_dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }
}
