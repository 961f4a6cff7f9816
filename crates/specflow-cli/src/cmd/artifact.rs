use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use specflow_core::{feature::Feature, template::ArtifactKind};
use std::path::Path;

#[derive(Subcommand)]
pub enum ArtifactSubcommand {
    /// Scaffold an artifact from its template
    Create {
        /// Directory name, slug, or numeric id
        feature: String,
        /// Artifact kind: spec, plan, or tasks
        kind: ArtifactKind,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn run(root: &Path, subcmd: ArtifactSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ArtifactSubcommand::Create {
            feature,
            kind,
            force,
        } => create(root, &feature, kind, force, json),
    }
}

fn create(
    root: &Path,
    key: &str,
    kind: ArtifactKind,
    force: bool,
    json: bool,
) -> anyhow::Result<()> {
    let (cfg, templates) = super::load_project(root)?;
    let mut feature = Feature::find(root, &cfg, key)?;
    let path = feature
        .write_artifact(root, &cfg, &templates, kind, force)
        .with_context(|| format!("failed to write {} for '{}'", kind.filename(), feature.dir_name))?;

    if json {
        print_json(&serde_json::json!({
            "feature": feature.dir_name,
            "artifact": kind,
            "path": path,
        }))?;
    } else {
        let shown = path.strip_prefix(root).unwrap_or(&path);
        println!("Wrote {}", shown.display());
    }
    Ok(())
}
