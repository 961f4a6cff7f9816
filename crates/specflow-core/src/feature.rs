use crate::config::Config;
use crate::error::{Result, SpecflowError};
use crate::id_alloc::{Allocation, FeatureId, IdAllocator};
use crate::path_guard::PathGuard;
use crate::paths;
use crate::template::{ArtifactKind, TemplateStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Feature
// ---------------------------------------------------------------------------

/// A feature directory under the specs dir, named `NNN-slug`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    pub id: u64,
    pub slug: String,
    pub title: String,
    pub dir_name: String,
    pub path: PathBuf,
    pub artifacts: Vec<ArtifactKind>,
    /// Set when the id came from a counter that had to be reset.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub counter_repaired: bool,
}

impl Feature {
    /// Allocate an id, create `<specs_dir>/NNN-slug/` and scaffold `spec.md`.
    pub fn create(
        root: &Path,
        cfg: &Config,
        templates: &TemplateStore,
        name: &str,
    ) -> Result<Self> {
        let slug = paths::slugify(name);
        paths::validate_slug(&slug)?;

        // Checked before allocating so a rejected name does not burn an id.
        if Self::list(root, cfg)?.iter().any(|f| f.slug == slug) {
            return Err(SpecflowError::FeatureExists(slug));
        }

        let guard = PathGuard::new(&cfg.specs_dir(root)?)?;
        let allocator = IdAllocator::for_project(root, &cfg.ids);
        let mut allocation = allocator.next()?;
        if allocation.was_repaired() {
            // A reset counter restarts at 1; lift it past the ids already on disk.
            crate::migrations::seed_counter(root, cfg)?;
            allocation = Allocation::Repaired(allocator.next()?.id());
        }
        let id = allocation.id();
        let dir_name = paths::feature_dir_name(&id.to_string(), &slug);

        let path = guard.resolve(&dir_name)?;
        if path.exists() {
            return Err(SpecflowError::FeatureExists(dir_name));
        }
        crate::io::ensure_dir(&path)?;

        let mut feature = Self {
            id: id.value(),
            slug,
            title: name.trim().to_string(),
            dir_name,
            path,
            artifacts: Vec::new(),
            counter_repaired: allocation.was_repaired(),
        };
        feature.write_artifact(root, cfg, templates, ArtifactKind::Spec, false)?;
        tracing::info!(feature = %feature.dir_name, "created feature");
        Ok(feature)
    }

    /// Features under the specs dir, sorted by id. Entries that are not
    /// `NNN-slug` directories are ignored.
    pub fn list(root: &Path, cfg: &Config) -> Result<Vec<Self>> {
        let specs_dir = cfg.specs_dir(root)?;
        if !specs_dir.exists() {
            return Ok(Vec::new());
        }

        let mut features = Vec::new();
        for entry in std::fs::read_dir(&specs_dir)? {
            let entry = entry?;
            // Follows symlinks; writes through them are still contained by PathGuard.
            if !entry.path().is_dir() {
                continue;
            }
            let dir_name = entry.file_name().to_string_lossy().into_owned();
            if let Some(feature) = Self::from_dir(&specs_dir, &dir_name) {
                features.push(feature);
            }
        }
        features.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.dir_name.cmp(&b.dir_name)));
        Ok(features)
    }

    /// Look a feature up by directory name, slug, or numeric id.
    pub fn find(root: &Path, cfg: &Config, key: &str) -> Result<Self> {
        let numeric = key.parse::<u64>().ok();
        Self::list(root, cfg)?
            .into_iter()
            .find(|f| f.dir_name == key || f.slug == key || Some(f.id) == numeric)
            .ok_or_else(|| SpecflowError::FeatureNotFound(key.to_string()))
    }

    fn from_dir(specs_dir: &Path, dir_name: &str) -> Option<Self> {
        let id = FeatureId::parse_prefix(dir_name)?;
        let (_, slug) = dir_name.split_once('-')?;
        paths::validate_slug(slug).ok()?;
        let path = specs_dir.join(dir_name);
        let artifacts = ArtifactKind::ALL
            .into_iter()
            .filter(|k| path.join(k.filename()).is_file())
            .collect();
        Some(Self {
            id,
            slug: slug.to_string(),
            title: slug.to_string(),
            dir_name: dir_name.to_string(),
            path,
            artifacts,
            counter_repaired: false,
        })
    }

    // ---------------------------------------------------------------------------
    // Artifacts
    // ---------------------------------------------------------------------------

    pub fn artifact_path(&self, kind: ArtifactKind) -> PathBuf {
        self.path.join(kind.filename())
    }

    pub fn has_artifact(&self, kind: ArtifactKind) -> bool {
        self.artifacts.contains(&kind)
    }

    /// Render `kind` from its template into the feature directory. An existing
    /// file is only replaced with `force`.
    pub fn write_artifact(
        &mut self,
        root: &Path,
        cfg: &Config,
        templates: &TemplateStore,
        kind: ArtifactKind,
        force: bool,
    ) -> Result<PathBuf> {
        let guard = PathGuard::new(&cfg.specs_dir(root)?)?;
        let path = guard.resolve(&format!("{}/{}", self.dir_name, kind.filename()))?;
        if path.exists() && !force {
            return Err(SpecflowError::ArtifactExists(path));
        }

        let date = chrono::Local::now().format("%Y-%m-%d").to_string();
        let id = self.id.to_string();
        let body = templates.render(
            kind,
            &[
                ("feature_name", self.title.as_str()),
                ("feature_dir", self.dir_name.as_str()),
                ("slug", self.slug.as_str()),
                ("id", id.as_str()),
                ("date", date.as_str()),
            ],
        )?;
        crate::io::atomic_write(&path, body.as_bytes())?;

        if !self.artifacts.contains(&kind) {
            self.artifacts.push(kind);
            self.artifacts.sort_by_key(|k| k.filename());
        }
        tracing::debug!(path = %path.display(), "wrote artifact");
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
