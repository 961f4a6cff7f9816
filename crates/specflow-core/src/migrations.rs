use crate::config::Config;
use crate::error::Result;
use crate::id_alloc::{FeatureId, IdAllocator};
use std::path::Path;

/// Bring the feature counter up to the highest `NNN-` prefix already present
/// under the specs dir, so projects numbered by hand before adopting the
/// counter never see a colliding id. Returns the counter value afterwards.
///
/// Any directory with a numeric prefix counts, whether or not the rest of its
/// name is a valid slug.
pub fn seed_counter(root: &Path, cfg: &Config) -> Result<u64> {
    let specs_dir = cfg.specs_dir(root)?;
    let mut highest = 0u64;
    if specs_dir.exists() {
        for entry in std::fs::read_dir(&specs_dir)? {
            let entry = entry?;
            if !entry.path().is_dir() {
                continue;
            }
            if let Some(id) = FeatureId::parse_prefix(&entry.file_name().to_string_lossy()) {
                highest = highest.max(id);
            }
        }
    }
    IdAllocator::for_project(root, &cfg.ids).seed(highest)
}
