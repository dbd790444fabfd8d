//! Prompt assembly for one iteration.
//!
//! Assembly is a pure function of on-disk state and session fields: given
//! identical inputs, two calls produce byte-identical prompt text. Missing
//! optional fragments degrade to placeholder text, never to errors.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use tracing::warn;

use crate::io::store::{self, STORE_DIR, StorePaths};
use crate::session::Session;

/// Static system prompt embedded at compile time.
pub const SYSTEM_PROMPT: &str = include_str!("prompts/system.md");

const ITERATION_TEMPLATE: &str = include_str!("prompts/iteration.md");

/// The PRD fragment. The JSON form wins when both exist on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrdDocument {
    Json(String),
    Markdown(String),
    Missing,
}

/// Everything the assembler needs for one iteration.
#[derive(Debug, Clone)]
pub struct PromptInputs {
    pub system_prompt: &'static str,
    pub phase: &'static str,
    pub goal: String,
    /// Operator feedback from the previous iteration, already taken from the
    /// controller so it is included exactly once.
    pub feedback: Option<String>,
    /// Top-level workspace entries, sorted, directories suffixed with `/`.
    pub workspace: Vec<String>,
    pub prd: PrdDocument,
    pub qa_plan: Option<String>,
    pub progress: Option<String>,
    pub guardrails: Option<String>,
    pub errors: Option<String>,
}

impl PromptInputs {
    /// Load prompt inputs from the state store and session fields.
    ///
    /// Infallible: fragment reads and the workspace listing degrade to
    /// absent on failure, so assembly can never abort an iteration.
    pub fn from_root(paths: &StorePaths, session: &Session, feedback: Option<String>) -> Self {
        let prd = match store::read_fragment(&paths.prd_json_path) {
            Some(contents) => PrdDocument::Json(contents),
            None => match store::read_fragment(&paths.prd_markdown_path) {
                Some(contents) => PrdDocument::Markdown(contents),
                None => PrdDocument::Missing,
            },
        };

        let workspace = list_workspace(&paths.root).unwrap_or_else(|err| {
            warn!(err = %err, "failed to list workspace entries");
            Vec::new()
        });

        Self {
            system_prompt: SYSTEM_PROMPT,
            phase: session.mode.directive(),
            goal: session.goal.clone(),
            feedback,
            workspace,
            prd,
            qa_plan: store::read_fragment(&paths.qa_plan_path),
            progress: non_empty(store::read_fragment(&paths.progress_path)),
            guardrails: non_empty(store::read_fragment(&paths.guardrails_path)),
            errors: non_empty(store::read_fragment(&paths.errors_path)),
        }
    }
}

fn non_empty(fragment: Option<String>) -> Option<String> {
    fragment.filter(|contents| !contents.trim().is_empty())
}

/// List top-level workspace entries.
///
/// Hidden entries are excluded, except the state directory itself so the
/// agent knows it is there. Directories carry a trailing `/`.
pub fn list_workspace(root: &Path) -> Result<Vec<String>> {
    let mut entries = Vec::new();
    let dir = fs::read_dir(root).with_context(|| format!("read workspace {}", root.display()))?;
    for entry in dir {
        let entry = entry.context("read workspace entry")?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') && name != STORE_DIR {
            continue;
        }
        let file_type = entry.file_type().context("stat workspace entry")?;
        if file_type.is_dir() {
            entries.push(format!("{name}/"));
        } else {
            entries.push(name);
        }
    }
    entries.sort();
    Ok(entries)
}

/// Renders the iteration prompt from the embedded template.
pub struct PromptBuilder {
    env: Environment<'static>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.add_template("iteration", ITERATION_TEMPLATE)
            .expect("iteration template should be valid");
        Self { env }
    }

    /// Build the full prompt text for one iteration.
    pub fn build(&self, input: &PromptInputs) -> Result<String> {
        let (prd_json, prd_markdown) = match &input.prd {
            PrdDocument::Json(contents) => (Some(contents.trim()), None),
            PrdDocument::Markdown(contents) => (None, Some(contents.trim())),
            PrdDocument::Missing => (None, None),
        };
        let template = self
            .env
            .get_template("iteration")
            .context("load iteration template")?;
        let rendered = template
            .render(context! {
                system_prompt => input.system_prompt.trim(),
                phase => input.phase,
                goal => input.goal.trim(),
                feedback => input.feedback.as_deref().filter(|s| !s.is_empty()),
                files => input.workspace.join(", "),
                prd_json => prd_json,
                prd_markdown => prd_markdown,
                qa_plan => input.qa_plan.as_deref().map(str::trim),
                progress => input.progress.as_deref().map(str::trim),
                guardrails => input.guardrails.as_deref().map(str::trim),
                errors => input.errors.as_deref().map(str::trim),
            })
            .context("render iteration prompt")?;
        Ok(rendered)
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Mode;

    fn inputs() -> PromptInputs {
        PromptInputs {
            system_prompt: SYSTEM_PROMPT,
            phase: Mode::Planning.directive(),
            goal: "build a CLI tool".to_string(),
            feedback: Some("prefer sqlite".to_string()),
            workspace: vec!["Cargo.toml".to_string(), "src/".to_string()],
            prd: PrdDocument::Markdown("## Stories".to_string()),
            qa_plan: Some("run the tests".to_string()),
            progress: Some("story one shipped".to_string()),
            guardrails: Some("pin the toolchain".to_string()),
            errors: Some("flaky network test".to_string()),
        }
    }

    /// Section order is fixed: system prompt, phase, goal, feedback,
    /// workspace, PRD, QA plan, progress, guardrails, errors.
    #[test]
    fn sections_appear_in_fixed_order() {
        let prompt = PromptBuilder::new().build(&inputs()).expect("build");

        let positions = [
            prompt.find("# SYSTEM PROMPT").expect("system section"),
            prompt.find("# CURRENT PHASE").expect("phase section"),
            prompt.find("# USER GOAL").expect("goal section"),
            prompt.find("# USER FEEDBACK / ANSWERS").expect("feedback section"),
            prompt.find("# CURRENT WORKSPACE").expect("workspace section"),
            prompt.find("## Current PRD (Markdown):").expect("prd section"),
            prompt.find("## Current QA Plan:").expect("qa section"),
            prompt.find("## Progress Log:").expect("progress section"),
            prompt
                .find("## Guardrails (Lessons Learned):")
                .expect("guardrails section"),
            prompt.find("## Error Notes:").expect("errors section"),
        ];
        assert!(
            positions.windows(2).all(|pair| pair[0] < pair[1]),
            "sections out of order in:\n{prompt}"
        );
        assert!(prompt.contains("Files: Cargo.toml, src/"));
    }

    #[test]
    fn assembly_is_deterministic() {
        let builder = PromptBuilder::new();
        let first = builder.build(&inputs()).expect("first build");
        let second = builder.build(&inputs()).expect("second build");
        assert_eq!(first, second);
    }

    #[test]
    fn json_prd_wins_over_markdown() {
        let mut input = inputs();
        input.prd = PrdDocument::Json("{\"stories\": []}".to_string());
        let prompt = PromptBuilder::new().build(&input).expect("build");
        assert!(prompt.contains("## Current PRD (JSON):"));
        assert!(!prompt.contains("## Current PRD (Markdown):"));
    }

    #[test]
    fn missing_fragments_degrade_to_placeholders() {
        let input = PromptInputs {
            system_prompt: SYSTEM_PROMPT,
            phase: Mode::Execution.directive(),
            goal: String::new(),
            feedback: None,
            workspace: Vec::new(),
            prd: PrdDocument::Missing,
            qa_plan: None,
            progress: None,
            guardrails: None,
            errors: None,
        };
        let prompt = PromptBuilder::new().build(&input).expect("build");

        assert!(prompt.contains("No PRD generated yet."));
        assert!(prompt.contains("No QA plan generated yet."));
        assert!(!prompt.contains("# USER FEEDBACK / ANSWERS"));
        assert!(!prompt.contains("## Progress Log:"));
        assert!(!prompt.contains("## Guardrails"));
        assert!(!prompt.contains("## Error Notes:"));
    }

    /// Operator feedback is injected verbatim; only the truly empty line
    /// means "no feedback".
    #[test]
    fn whitespace_feedback_is_kept_verbatim() {
        let mut input = inputs();
        input.feedback = Some("  ".to_string());
        let prompt = PromptBuilder::new().build(&input).expect("build");
        assert!(prompt.contains("# USER FEEDBACK / ANSWERS"));

        input.feedback = Some(String::new());
        let prompt = PromptBuilder::new().build(&input).expect("build");
        assert!(!prompt.contains("# USER FEEDBACK / ANSWERS"));
    }

    /// A fragment that exists but is empty still gets its section header;
    /// the placeholder is only for files that do not exist at all.
    #[test]
    fn empty_present_fragments_render_headers_not_placeholders() {
        let mut input = inputs();
        input.prd = PrdDocument::Json(String::new());
        input.qa_plan = Some(String::new());
        let prompt = PromptBuilder::new().build(&input).expect("build");

        assert!(prompt.contains("## Current PRD (JSON):"));
        assert!(!prompt.contains("No PRD generated yet."));
        assert!(prompt.contains("## Current QA Plan:"));
        assert!(!prompt.contains("No QA plan generated yet."));
    }

    #[test]
    fn workspace_listing_filters_hidden_entries() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        fs::create_dir(root.join("src")).expect("mkdir src");
        fs::create_dir(root.join(".git")).expect("mkdir .git");
        fs::create_dir(root.join(STORE_DIR)).expect("mkdir store");
        fs::write(root.join("Cargo.toml"), "").expect("write file");
        fs::write(root.join(".env"), "").expect("write hidden file");

        let entries = list_workspace(root).expect("list");
        assert_eq!(
            entries,
            vec![
                format!("{STORE_DIR}/"),
                "Cargo.toml".to_string(),
                "src/".to_string()
            ]
        );
    }

    #[test]
    fn from_root_loads_fragments_and_skips_empty_ones() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = StorePaths::new(temp.path());
        store::init_store(&paths).expect("init");
        fs::write(&paths.progress_path, "did a thing\n").expect("write progress");
        fs::write(&paths.prd_markdown_path, "# PRD\n").expect("write prd");

        let session = Session::new(Mode::Planning, "goal", 3, false).expect("session");
        let input = PromptInputs::from_root(&paths, &session, None);

        assert_eq!(input.prd, PrdDocument::Markdown("# PRD\n".to_string()));
        assert_eq!(input.progress.as_deref(), Some("did a thing\n"));
        // guardrails/errors were pre-created empty and must be skipped
        assert!(input.guardrails.is_none());
        assert!(input.errors.is_none());
        assert!(input.qa_plan.is_none());
    }

    /// Fragments written by the agent may contain arbitrary bytes; invalid
    /// UTF-8 is replaced rather than failing assembly.
    #[test]
    fn from_root_tolerates_undecodable_fragments() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = StorePaths::new(temp.path());
        store::init_store(&paths).expect("init");
        fs::write(&paths.progress_path, [0x66, 0x6f, 0x6f, 0xff, 0xfe, 0x0a]).expect("write");

        let session = Session::new(Mode::Planning, "goal", 3, false).expect("session");
        let input = PromptInputs::from_root(&paths, &session, None);

        let progress = input.progress.clone().expect("progress present");
        assert!(progress.starts_with("foo"));
        assert!(progress.contains('\u{FFFD}'));
        PromptBuilder::new().build(&input).expect("build");
    }
}
