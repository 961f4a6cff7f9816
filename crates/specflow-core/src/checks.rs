//! Built-in artifact checks and the discovery pass that turns a project into
//! a batch of [`ValidationTask`]s. Every check only reads.

use crate::config::Config;
use crate::error::Result;
use crate::feature::Feature;
use crate::template::ArtifactKind;
use crate::validation::{check_fn, Check, ValidationTask, Verdict};
use regex::Regex;
use std::path::Path;
use std::sync::{Arc, OnceLock};

pub const CLARIFICATION_MARKER: &str = "[NEEDS CLARIFICATION";

/// One task per (artifact, applicable check), in feature-id then artifact
/// order. `feature` narrows discovery to a single feature key.
pub fn discover(root: &Path, cfg: &Config, feature: Option<&str>) -> Result<Vec<ValidationTask>> {
    let features = match feature {
        Some(key) => vec![Feature::find(root, cfg, key)?],
        None => Feature::list(root, cfg)?,
    };

    let mut tasks = Vec::new();
    for f in &features {
        for kind in ArtifactKind::ALL {
            if !f.has_artifact(kind) {
                continue;
            }
            let target = f.artifact_path(kind);
            for check in checks_for(cfg, kind) {
                tasks.push(ValidationTask::new(target.clone(), check));
            }
        }
    }
    tracing::debug!(features = features.len(), tasks = tasks.len(), "discovered validation tasks");
    Ok(tasks)
}

fn checks_for(cfg: &Config, kind: ArtifactKind) -> Vec<Arc<dyn Check>> {
    let mut checks = vec![non_empty(), no_clarification_markers()];
    let sections = cfg.validation.sections_for(kind);
    if !sections.is_empty() {
        checks.push(required_sections(sections.to_vec()));
    }
    if kind == ArtifactKind::Tasks {
        checks.push(task_format());
    }
    checks
}

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

pub fn non_empty() -> Arc<dyn Check> {
    check_fn("non_empty", |path| {
        let text = std::fs::read_to_string(path)?;
        Ok(if text.trim().is_empty() {
            Verdict::Fail("file is empty".to_string())
        } else {
            Verdict::Pass
        })
    })
}

pub fn required_sections(headings: Vec<String>) -> Arc<dyn Check> {
    check_fn("required_sections", move |path| {
        let text = std::fs::read_to_string(path)?;
        let missing: Vec<&str> = headings
            .iter()
            .filter(|h| !text.lines().any(|l| l.trim_end() == h.as_str()))
            .map(String::as_str)
            .collect();
        Ok(if missing.is_empty() {
            Verdict::Pass
        } else {
            Verdict::Fail(format!("missing sections: {}", missing.join(", ")))
        })
    })
}

pub fn no_clarification_markers() -> Arc<dyn Check> {
    check_fn("no_clarification_markers", |path| {
        let text = std::fs::read_to_string(path)?;
        let lines: Vec<String> = text
            .lines()
            .enumerate()
            .filter(|(_, l)| l.contains(CLARIFICATION_MARKER))
            .map(|(i, _)| (i + 1).to_string())
            .collect();
        Ok(if lines.is_empty() {
            Verdict::Pass
        } else {
            Verdict::Fail(format!("unresolved clarification on line {}", lines.join(", ")))
        })
    })
}

static CHECKBOX_RE: OnceLock<Regex> = OnceLock::new();
static TASK_LINE_RE: OnceLock<Regex> = OnceLock::new();

/// Checklist lines in `tasks.md` must read `- [ ] T001 description`.
pub fn task_format() -> Arc<dyn Check> {
    check_fn("task_format", |path| {
        let checkbox = CHECKBOX_RE.get_or_init(|| Regex::new(r"^\s*[-*]\s+\[.?\]").unwrap());
        let task_line =
            TASK_LINE_RE.get_or_init(|| Regex::new(r"^\s*- \[[ xX]\] T\d{3,}\s+\S").unwrap());

        let text = std::fs::read_to_string(path)?;
        let bad: Vec<String> = text
            .lines()
            .enumerate()
            .filter(|(_, l)| checkbox.is_match(l) && !task_line.is_match(l))
            .map(|(i, _)| (i + 1).to_string())
            .collect();
        Ok(if bad.is_empty() {
            Verdict::Pass
        } else {
            Verdict::Fail(format!("malformed task on line {}", bad.join(", ")))
        })
    })
}
