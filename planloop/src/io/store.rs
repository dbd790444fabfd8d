//! State store: well-known paths and accessors under `.planloop/`.
//!
//! The controller only initializes and reads this store; between iterations
//! the external agent mutates the fragment files directly.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Name of the state directory, relative to the working directory.
pub const STORE_DIR: &str = ".planloop";

/// All canonical paths within the state directory.
#[derive(Debug, Clone)]
pub struct StorePaths {
    pub root: PathBuf,
    pub store_dir: PathBuf,
    pub runs_dir: PathBuf,
    pub prompt_path: PathBuf,
    pub progress_path: PathBuf,
    pub guardrails_path: PathBuf,
    pub activity_path: PathBuf,
    pub errors_path: PathBuf,
    pub prd_json_path: PathBuf,
    pub prd_markdown_path: PathBuf,
    pub qa_plan_path: PathBuf,
    pub approval_path: PathBuf,
}

impl StorePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let store_dir = root.join(STORE_DIR);
        Self {
            runs_dir: store_dir.join("runs"),
            prompt_path: store_dir.join("PROMPT.md"),
            progress_path: store_dir.join("progress.md"),
            guardrails_path: store_dir.join("guardrails.md"),
            activity_path: store_dir.join("activity.log"),
            errors_path: store_dir.join("errors.log"),
            prd_json_path: store_dir.join("prd.json"),
            prd_markdown_path: store_dir.join("prd.md"),
            qa_plan_path: store_dir.join("qa-plan.md"),
            approval_path: store_dir.join("PLAN_APPROVED"),
            store_dir,
            root,
        }
    }
}

/// Create the state directory scaffolding.
///
/// Directory creation failure is fatal; nothing else can proceed without the
/// store. Pre-creating the core fragment files is best-effort, since prompt
/// assembly tolerates their absence.
pub fn init_store(paths: &StorePaths) -> Result<()> {
    fs::create_dir_all(&paths.store_dir)
        .with_context(|| format!("create state directory {}", paths.store_dir.display()))?;
    fs::create_dir_all(&paths.runs_dir)
        .with_context(|| format!("create runs directory {}", paths.runs_dir.display()))?;

    let fragments = [
        &paths.progress_path,
        &paths.guardrails_path,
        &paths.activity_path,
        &paths.errors_path,
    ];
    for path in fragments {
        if path.exists() {
            continue;
        }
        if let Err(err) = fs::write(path, "") {
            warn!(path = %path.display(), err = %err, "failed to pre-create state fragment");
        }
    }
    Ok(())
}

/// Whether the current plan has been approved for execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    Pending,
    Approved,
}

/// Persisted contents of the approval marker file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub state: ApprovalState,
    pub approved_at: String,
}

/// Current approval state.
///
/// Presence of the marker file is authoritative, so a marker written by an
/// older version or by hand still counts as approved.
pub fn approval_state(paths: &StorePaths) -> ApprovalState {
    if paths.approval_path.exists() {
        ApprovalState::Approved
    } else {
        ApprovalState::Pending
    }
}

/// Write the approval marker.
pub fn write_approval(paths: &StorePaths) -> Result<()> {
    let record = ApprovalRecord {
        state: ApprovalState::Approved,
        approved_at: Local::now().to_rfc3339(),
    };
    let mut buf = serde_json::to_string_pretty(&record).context("serialize approval record")?;
    buf.push('\n');
    fs::write(&paths.approval_path, buf)
        .with_context(|| format!("write approval marker {}", paths.approval_path.display()))
}

/// Remove the approval marker. Re-entering planning invalidates approval.
pub fn clear_approval(paths: &StorePaths) -> Result<()> {
    match fs::remove_file(&paths.approval_path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| {
            format!("remove approval marker {}", paths.approval_path.display())
        }),
    }
}

/// Read a state fragment, treating a missing file as a normal empty state.
///
/// The external agent writes these files, so the bytes are not trusted to
/// be UTF-8; invalid sequences are replaced. Any other read failure
/// degrades to absent with a warning instead of aborting the session.
pub fn read_fragment(path: &Path) -> Option<String> {
    match fs::read(path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(err) if err.kind() == ErrorKind::NotFound => None,
        Err(err) => {
            warn!(path = %path.display(), err = %err, "failed to read state fragment");
            None
        }
    }
}

/// Remove the ephemeral prompt document. Removal failure is never fatal.
pub fn remove_prompt(paths: &StorePaths) {
    match fs::remove_file(&paths.prompt_path) {
        Ok(()) => debug!(path = %paths.prompt_path.display(), "removed prompt document"),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => {
            warn!(path = %paths.prompt_path.display(), err = %err, "failed to remove prompt document");
        }
    }
}
