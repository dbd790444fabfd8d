//! Run records: the activity log and per-iteration files under
//! `.planloop/runs/`. Append-only, never revisited within a run.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;

use crate::io::store::StorePaths;

/// One record per loop iteration.
#[derive(Debug, Clone, Serialize)]
pub struct IterationRecord {
    pub iter: u32,
    pub max_iterations: u32,
    /// Phase name (`plan` or `run`).
    pub phase: String,
    /// Wall-clock start, `YYYYmmdd-HHMMSS`; also keys the run file names.
    pub started_at: String,
    pub duration_ms: u64,
    /// Human-readable agent exit summary.
    pub agent_exit: String,
}

impl IterationRecord {
    fn file_stem(&self) -> String {
        format!("run-{}-iter-{:02}", self.started_at, self.iter)
    }

    /// Raw agent output file for this iteration.
    pub fn output_path(&self, paths: &StorePaths) -> PathBuf {
        paths.runs_dir.join(format!("{}.log", self.file_stem()))
    }

    /// Metadata JSON written next to the raw output.
    pub fn meta_path(&self, paths: &StorePaths) -> PathBuf {
        paths
            .runs_dir
            .join(format!("{}.meta.json", self.file_stem()))
    }
}

/// Append the single-line activity record for one iteration.
pub fn append_activity(paths: &StorePaths, record: &IterationRecord) -> Result<()> {
    let duration = Duration::from_millis(record.duration_ms);
    let line = format!(
        "[{}] Iteration {}/{} | Phase: {} | Time: {:?}\n",
        Local::now().format("%H:%M:%S"),
        record.iter,
        record.max_iterations,
        record.phase,
        duration,
    );
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.activity_path)
        .with_context(|| format!("open activity log {}", paths.activity_path.display()))?;
    file.write_all(line.as_bytes())
        .with_context(|| format!("append activity log {}", paths.activity_path.display()))
}

/// Write the full raw agent output for one iteration.
pub fn write_run_output(paths: &StorePaths, record: &IterationRecord, output: &str) -> Result<()> {
    let path = record.output_path(paths);
    fs::write(&path, output).with_context(|| format!("write run log {}", path.display()))
}

/// Write the iteration metadata JSON next to the raw output.
pub fn write_run_meta(paths: &StorePaths, record: &IterationRecord) -> Result<()> {
    let path = record.meta_path(paths);
    let mut buf = serde_json::to_string_pretty(record).context("serialize iteration record")?;
    buf.push('\n');
    fs::write(&path, buf).with_context(|| format!("write run metadata {}", path.display()))
}
