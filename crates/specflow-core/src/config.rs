use crate::error::{Result, SpecflowError};
use crate::id_alloc::{DEFAULT_ID_WIDTH, DEFAULT_LOCK_TIMEOUT, MAX_ID_WIDTH};
use crate::paths;
use crate::template::ArtifactKind;
use crate::validation::DEFAULT_MAX_WORKERS;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// IdConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdConfig {
    #[serde(default = "default_id_width")]
    pub width: usize,
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_id_width() -> usize {
    DEFAULT_ID_WIDTH
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT.as_millis() as u64
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            width: default_id_width(),
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// TemplateConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Zero disables the template cache.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

fn default_cache_ttl() -> u64 {
    300
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

impl TemplateConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

// ---------------------------------------------------------------------------
// ValidationConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Artifact file name → markdown headings that must appear in it.
    #[serde(default = "default_required_sections")]
    pub required_sections: BTreeMap<String, Vec<String>>,
}

fn default_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

fn default_required_sections() -> BTreeMap<String, Vec<String>> {
    let mut m = BTreeMap::new();
    m.insert(
        ArtifactKind::Spec.filename().to_string(),
        vec!["## Summary".to_string(), "## Requirements".to_string()],
    );
    m.insert(
        ArtifactKind::Plan.filename().to_string(),
        vec!["## Approach".to_string()],
    );
    m
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            required_sections: default_required_sections(),
        }
    }
}

impl ValidationConfig {
    pub fn sections_for(&self, kind: ArtifactKind) -> &[String] {
        self.required_sections
            .get(kind.filename())
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

// ---------------------------------------------------------------------------
// GitConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitConfig {
    /// `feature create` also creates and switches to an `NNN-slug` branch.
    #[serde(default)]
    pub create_branches: bool,
}

// ---------------------------------------------------------------------------
// ProjectConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub project: ProjectConfig,
    #[serde(default = "default_specs_dir")]
    pub specs_dir: String,
    #[serde(default)]
    pub ids: IdConfig,
    #[serde(default)]
    pub templates: TemplateConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub git: GitConfig,
}

fn default_version() -> u32 {
    1
}

fn default_specs_dir() -> String {
    paths::DEFAULT_SPECS_DIR.to_string()
}

impl Config {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            version: 1,
            project: ProjectConfig {
                name: project_name.into(),
                description: None,
            },
            specs_dir: default_specs_dir(),
            ids: IdConfig::default(),
            templates: TemplateConfig::default(),
            validation: ValidationConfig::default(),
            git: GitConfig::default(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(SpecflowError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    /// Absolute specs directory. `specs_dir` comes from a user-editable file,
    /// so it is contained within the project root like any other input.
    pub fn specs_dir(&self, root: &Path) -> Result<PathBuf> {
        crate::path_guard::validate(root, &self.specs_dir)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self, root: &Path) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if let Err(e) = crate::path_guard::validate(root, &self.specs_dir) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: match e {
                    SpecflowError::PathSecurity(e) => {
                        format!("specs_dir '{}' rejected: {}", self.specs_dir, e.violation)
                    }
                    other => format!("specs_dir '{}' cannot be resolved: {other}", self.specs_dir),
                },
            });
        }

        if self.validation.workers == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "validation.workers is 0; one worker will be used".to_string(),
            });
        }

        if self.ids.width > MAX_ID_WIDTH {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "ids.width={} exceeds {MAX_ID_WIDTH}; ids are padded to {MAX_ID_WIDTH} digits",
                    self.ids.width
                ),
            });
        } else if self.ids.width == 0 || self.ids.width > 12 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!("ids.width={} is unusual (expected 1..=12)", self.ids.width),
            });
        }

        if self.ids.lock_timeout_ms == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "ids.lock_timeout_ms is 0; a busy counter fails on the first attempt"
                    .to_string(),
            });
        }

        for key in self.validation.required_sections.keys() {
            if ArtifactKind::from_filename(key).is_none() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("unknown artifact '{key}' in validation.required_sections"),
                });
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::new("test-project");
        let yaml = serde_yaml::to_string(&cfg).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.project.name, "test-project");
        assert_eq!(parsed.specs_dir, "specs");
        assert_eq!(parsed.ids.width, 3);
        assert_eq!(parsed.ids.lock_timeout_ms, 5000);
        assert_eq!(parsed.validation.workers, 4);
    }

    #[test]
    fn minimal_config_fills_defaults() {
        let yaml = "version: 1\nproject:\n  name: my-project\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.specs_dir, "specs");
        assert_eq!(cfg.templates.cache_ttl(), Duration::from_secs(300));
        assert!(!cfg.git.create_branches);
        assert_eq!(
            cfg.validation.sections_for(ArtifactKind::Spec),
            ["## Summary", "## Requirements"]
        );
        assert!(cfg.validation.sections_for(ArtifactKind::Tasks).is_empty());
    }

    #[test]
    fn load_without_config_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(SpecflowError::NotInitialized)
        ));
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::new("p");
        cfg.ids.width = 4;
        cfg.save(dir.path()).unwrap();
        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.ids.width, 4);
    }

    #[test]
    fn validate_default_config_no_warnings() {
        let dir = TempDir::new().unwrap();
        assert!(Config::new("p").validate(dir.path()).is_empty());
    }

    #[test]
    fn escaping_specs_dir_is_an_error() {
        let dir = TempDir::new().unwrap();
        for bad in ["../outside", "/etc"] {
            let mut cfg = Config::new("p");
            cfg.specs_dir = bad.to_string();
            let warnings = cfg.validate(dir.path());
            assert!(warnings
                .iter()
                .any(|w| w.level == WarnLevel::Error && w.message.contains("specs_dir")));
            assert!(matches!(
                cfg.specs_dir(dir.path()),
                Err(SpecflowError::PathSecurity(_))
            ));
        }
    }

    #[test]
    fn validate_flags_unusual_values() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::new("p");
        cfg.validation.workers = 0;
        cfg.ids.width = 0;
        cfg.ids.lock_timeout_ms = 0;
        cfg.validation
            .required_sections
            .insert("readme.md".to_string(), vec!["# X".to_string()]);
        let warnings = cfg.validate(dir.path());
        assert_eq!(warnings.len(), 4);
        assert!(warnings.iter().all(|w| w.level == WarnLevel::Warning));
        assert!(warnings.iter().any(|w| w.message.contains("readme.md")));
    }

    #[test]
    fn huge_id_width_is_reported_as_clamped() {
        let dir = TempDir::new().unwrap();
        let mut cfg = Config::new("p");
        cfg.ids.width = 1_000_000_000;
        let warnings = cfg.validate(dir.path());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("padded to 20 digits"), "{}", warnings[0].message);
    }
}
