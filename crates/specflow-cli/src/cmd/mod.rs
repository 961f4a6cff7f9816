pub mod artifact;
pub mod config;
pub mod feature;
pub mod git;
pub mod id;
pub mod init;
pub mod validate;

use anyhow::Context;
use specflow_core::{config::Config, template::TemplateStore};
use std::path::Path;

/// Config plus a template store sized from it, for commands that scaffold.
pub(crate) fn load_project(root: &Path) -> anyhow::Result<(Config, TemplateStore)> {
    let cfg = Config::load(root).context("failed to load config")?;
    let templates = TemplateStore::new(root, cfg.templates.cache_ttl());
    Ok((cfg, templates))
}
