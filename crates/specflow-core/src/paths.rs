use crate::error::{Result, SpecflowError};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const SPECFLOW_DIR: &str = ".specflow";
pub const TEMPLATES_DIR: &str = ".specflow/templates";

pub const CONFIG_FILE: &str = ".specflow/config.yaml";
pub const COUNTER_FILE: &str = ".specflow/feature-counter";

pub const DEFAULT_SPECS_DIR: &str = "specs";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn specflow_dir(root: &Path) -> PathBuf {
    root.join(SPECFLOW_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn counter_path(root: &Path) -> PathBuf {
    root.join(COUNTER_FILE)
}

pub fn templates_dir(root: &Path) -> PathBuf {
    root.join(TEMPLATES_DIR)
}

pub fn template_path(root: &Path, kind: &str) -> PathBuf {
    templates_dir(root).join(format!("{kind}.md"))
}

/// The lock sidecar guarding a counter file. The counter itself is replaced
/// by rename on every write, so it cannot carry the lock.
pub fn lock_path_for(counter: &Path) -> PathBuf {
    let mut name = counter
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    counter.with_file_name(name)
}

/// Directory name for a feature: `NNN-slug`.
pub fn feature_dir_name(id: &str, slug: &str) -> String {
    format!("{id}-{slug}")
}

// ---------------------------------------------------------------------------
// Slug validation
// ---------------------------------------------------------------------------

static SLUG_RE: OnceLock<Regex> = OnceLock::new();

fn slug_re() -> &'static Regex {
    SLUG_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").unwrap())
}

pub fn validate_slug(slug: &str) -> Result<()> {
    if slug.is_empty() || slug.len() > 64 || !slug_re().is_match(slug) {
        return Err(SpecflowError::InvalidSlug(slug.to_string()));
    }
    Ok(())
}

/// Turn a free-form feature name into a slug candidate: lowercase, runs of
/// non-alphanumerics collapsed to a single hyphen. The result still goes
/// through [`validate_slug`].
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
