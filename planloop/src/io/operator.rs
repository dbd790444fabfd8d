//! Operator input between iterations.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};

/// One line of operator input per iteration, prompted with `ask`.
///
/// `Ok(None)` means standard input is closed; the loop then continues
/// without feedback, exactly as if the operator pressed Enter.
pub trait OperatorInput {
    fn read_line(&mut self, ask: &str) -> Result<Option<String>>;
}

/// Reads operator input from standard input.
pub struct StdinOperator;

impl OperatorInput for StdinOperator {
    fn read_line(&mut self, ask: &str) -> Result<Option<String>> {
        {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(ask.as_bytes())
                .context("write operator prompt")?;
            stdout.flush().context("flush operator prompt")?;
        }

        let mut line = String::new();
        let read = io::stdin()
            .lock()
            .read_line(&mut line)
            .context("read operator input")?;
        if read == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }
}
