use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use specflow_core::{feature::Feature, git::Git, template::ArtifactKind};
use std::path::Path;

#[derive(Subcommand)]
pub enum FeatureSubcommand {
    /// Allocate the next id and scaffold <specs_dir>/NNN-slug/spec.md
    Create {
        /// Free-form feature name; slugified for the directory
        name: String,
        /// Also create and switch to an NNN-slug git branch
        #[arg(long)]
        branch: bool,
    },
    /// List all features
    List,
    /// Show feature details
    Show {
        /// Directory name, slug, or numeric id
        key: String,
    },
}

pub fn run(root: &Path, subcmd: FeatureSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        FeatureSubcommand::Create { name, branch } => create(root, &name, branch, json),
        FeatureSubcommand::List => list(root, json),
        FeatureSubcommand::Show { key } => show(root, &key, json),
    }
}

fn create(root: &Path, name: &str, branch: bool, json: bool) -> anyhow::Result<()> {
    let (cfg, templates) = super::load_project(root)?;
    let feature = Feature::create(root, &cfg, &templates, name)
        .with_context(|| format!("failed to create feature '{name}'"))?;

    let branched = branch || cfg.git.create_branches;
    if branched {
        let git = Git::new(root);
        git.create_branch(&feature.dir_name)
            .with_context(|| format!("failed to create branch '{}'", feature.dir_name))?;
    }

    if json {
        print_json(&serde_json::json!({
            "feature": feature,
            "branch": branched.then_some(&feature.dir_name),
        }))?;
        return Ok(());
    }

    println!("Created feature: {}", feature.dir_name);
    if feature.counter_repaired {
        println!("  warning: feature counter was unreadable and has been reset");
    }
    let spec = feature.artifact_path(ArtifactKind::Spec);
    println!("  spec:   {}", spec.strip_prefix(root).unwrap_or(&spec).display());
    if branched {
        println!("  branch: {}", feature.dir_name);
    }
    println!("Next: specflow artifact create {} plan", feature.dir_name);
    Ok(())
}

fn list(root: &Path, json: bool) -> anyhow::Result<()> {
    let (cfg, _) = super::load_project(root)?;
    let features = Feature::list(root, &cfg).context("failed to list features")?;

    if json {
        print_json(&features)?;
        return Ok(());
    }

    if features.is_empty() {
        println!("No features yet.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = features
        .iter()
        .map(|f| {
            let artifacts: Vec<&str> = f.artifacts.iter().map(|k| k.as_str()).collect();
            vec![f.id.to_string(), f.dir_name.clone(), artifacts.join(",")]
        })
        .collect();
    print_table(&["ID", "FEATURE", "ARTIFACTS"], rows);
    Ok(())
}

fn show(root: &Path, key: &str, json: bool) -> anyhow::Result<()> {
    let (cfg, _) = super::load_project(root)?;
    let feature = Feature::find(root, &cfg, key)?;

    if json {
        print_json(&feature)?;
        return Ok(());
    }

    println!("Feature: {}", feature.dir_name);
    println!("Id:      {}", feature.id);
    println!("Slug:    {}", feature.slug);
    let dir = feature.path.strip_prefix(root).unwrap_or(&feature.path);
    println!("Path:    {}", dir.display());
    println!("\nArtifacts:");
    for kind in ArtifactKind::ALL {
        let mark = if feature.has_artifact(kind) { "x" } else { " " };
        println!("  [{mark}] {}", kind.filename());
    }
    Ok(())
}
