//! Artifact templates: project overrides under `.specflow/templates/`, or the
//! built-in skeletons below. Loads go through a [`TtlCache`], so repeated
//! scaffolding in one process reads each template file at most once per ttl.

use crate::cache::TtlCache;
use crate::error::{Result, SpecflowError};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ArtifactKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Spec,
    Plan,
    Tasks,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [ArtifactKind::Spec, ArtifactKind::Plan, ArtifactKind::Tasks];

    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Spec => "spec",
            ArtifactKind::Plan => "plan",
            ArtifactKind::Tasks => "tasks",
        }
    }

    pub fn filename(self) -> &'static str {
        match self {
            ArtifactKind::Spec => "spec.md",
            ArtifactKind::Plan => "plan.md",
            ArtifactKind::Tasks => "tasks.md",
        }
    }

    pub fn from_filename(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.filename() == name)
    }

    fn builtin(self) -> &'static str {
        match self {
            ArtifactKind::Spec => SPEC_TEMPLATE,
            ArtifactKind::Plan => PLAN_TEMPLATE,
            ArtifactKind::Tasks => TASKS_TEMPLATE,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ArtifactKind {
    type Err = SpecflowError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "spec" | "spec.md" => Ok(ArtifactKind::Spec),
            "plan" | "plan.md" => Ok(ArtifactKind::Plan),
            "tasks" | "tasks.md" => Ok(ArtifactKind::Tasks),
            other => Err(SpecflowError::UnknownArtifact(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// TemplateStore
// ---------------------------------------------------------------------------

pub struct TemplateStore {
    dir: PathBuf,
    cache: TtlCache<Arc<str>>,
}

impl TemplateStore {
    pub fn new(root: &Path, ttl: Duration) -> Self {
        Self {
            dir: paths::templates_dir(root),
            cache: TtlCache::new(ttl),
        }
    }

    /// Raw template text for `kind`.
    pub fn load(&self, kind: ArtifactKind) -> Result<Arc<str>> {
        self.cache.get_or_try_insert_with(kind.as_str(), || {
            let path = self.dir.join(format!("{kind}.md"));
            match std::fs::read_to_string(&path) {
                Ok(text) => {
                    tracing::debug!(path = %path.display(), "loaded template override");
                    Ok(Arc::from(text))
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Arc::from(kind.builtin())),
                Err(e) => Err(SpecflowError::Io(e)),
            }
        })
    }

    /// Load `kind` and substitute each `{{name}}` from `vars`. Unknown
    /// placeholders are left as written.
    pub fn render(&self, kind: ArtifactKind, vars: &[(&str, &str)]) -> Result<String> {
        let text = self.load(kind)?;
        Ok(substitute(&text, vars))
    }

    /// Drop cached text so the next load rereads the override directory.
    pub fn invalidate(&self, kind: ArtifactKind) {
        self.cache.invalidate(kind.as_str());
    }

    /// Write the built-in skeletons as editable overrides. Existing files are
    /// left alone. Returns the kinds that were written.
    pub fn install_defaults(&self) -> Result<Vec<ArtifactKind>> {
        let mut written = Vec::new();
        for kind in ArtifactKind::ALL {
            let path = self.dir.join(format!("{kind}.md"));
            if crate::io::write_if_missing(&path, kind.builtin().as_bytes())? {
                written.push(kind);
            }
        }
        Ok(written)
    }
}

fn substitute(text: &str, vars: &[(&str, &str)]) -> String {
    let mut out = text.to_string();
    for (name, value) in vars {
        out = out.replace(&format!("{{{{{name}}}}}"), value);
    }
    out
}

// ---------------------------------------------------------------------------
// Built-in skeletons
// ---------------------------------------------------------------------------

const SPEC_TEMPLATE: &str = r#"# Feature Specification: {{feature_name}}

**Feature**: `{{feature_dir}}`
**Created**: {{date}}

## Summary

<what the feature does and who it is for>

## Requirements

- **FR-001**: <requirement>

## Open Questions

- [NEEDS CLARIFICATION: <question>]
"#;

const PLAN_TEMPLATE: &str = r#"# Implementation Plan: {{feature_name}}

**Feature**: `{{feature_dir}}`
**Created**: {{date}}

## Approach

<how the requirements in spec.md will be met>

## Risks

- <risk>
"#;

const TASKS_TEMPLATE: &str = r#"# Tasks: {{feature_name}}

**Feature**: `{{feature_dir}}`

- [ ] T001 <first task>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use tempfile::TempDir;

    #[test]
    fn kind_parse_and_filename() {
        assert_eq!(ArtifactKind::from_str("plan").unwrap(), ArtifactKind::Plan);
        assert_eq!(ArtifactKind::from_str("tasks.md").unwrap(), ArtifactKind::Tasks);
        assert!(matches!(
            ArtifactKind::from_str("design"),
            Err(SpecflowError::UnknownArtifact(_))
        ));
        assert_eq!(ArtifactKind::from_filename("spec.md"), Some(ArtifactKind::Spec));
        assert_eq!(ArtifactKind::from_filename("readme.md"), None);
    }

    #[test]
    fn render_uses_builtin_without_override() {
        let dir = TempDir::new().unwrap();
        let store = TemplateStore::new(dir.path(), Duration::from_secs(60));
        let out = store
            .render(
                ArtifactKind::Spec,
                &[("feature_name", "Login"), ("feature_dir", "001-login")],
            )
            .unwrap();
        assert!(out.starts_with("# Feature Specification: Login"));
        assert!(out.contains("`001-login`"));
        assert!(out.contains("{{date}}"), "unknown placeholders are kept");
    }

    #[test]
    fn override_is_cached_until_invalidated() {
        let dir = TempDir::new().unwrap();
        let store = TemplateStore::new(dir.path(), Duration::from_secs(60));
        let path = paths::template_path(dir.path(), "plan");
        crate::io::atomic_write(&path, b"v1 {{feature_name}}").unwrap();
        assert_eq!(&*store.load(ArtifactKind::Plan).unwrap(), "v1 {{feature_name}}");

        crate::io::atomic_write(&path, b"v2").unwrap();
        assert_eq!(&*store.load(ArtifactKind::Plan).unwrap(), "v1 {{feature_name}}");

        store.invalidate(ArtifactKind::Plan);
        assert_eq!(&*store.load(ArtifactKind::Plan).unwrap(), "v2");
    }

    #[test]
    fn zero_ttl_always_rereads() {
        let dir = TempDir::new().unwrap();
        let store = TemplateStore::new(dir.path(), Duration::ZERO);
        let path = paths::template_path(dir.path(), "tasks");
        crate::io::atomic_write(&path, b"one").unwrap();
        assert_eq!(&*store.load(ArtifactKind::Tasks).unwrap(), "one");
        crate::io::atomic_write(&path, b"two").unwrap();
        assert_eq!(&*store.load(ArtifactKind::Tasks).unwrap(), "two");
    }

    #[test]
    fn install_defaults_keeps_existing() {
        let dir = TempDir::new().unwrap();
        let store = TemplateStore::new(dir.path(), Duration::from_secs(60));
        let spec = paths::template_path(dir.path(), "spec");
        crate::io::atomic_write(&spec, b"custom").unwrap();

        let written = store.install_defaults().unwrap();
        assert_eq!(written, vec![ArtifactKind::Plan, ArtifactKind::Tasks]);
        assert_eq!(std::fs::read_to_string(&spec).unwrap(), "custom");
        assert!(store.install_defaults().unwrap().is_empty());
    }
}
