use crate::output::print_json;
use anyhow::Context;
use specflow_core::{config::Config, io, migrations, paths, template::TemplateStore};
use std::path::Path;

pub fn run(root: &Path, name: Option<&str>, json: bool) -> anyhow::Result<()> {
    let project_name = name.map(str::to_string).unwrap_or_else(|| {
        root.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string())
    });

    if !json {
        println!("Initializing specflow in: {}", root.display());
    }

    // 1. .specflow/ and config.yaml
    let dir = paths::specflow_dir(root);
    io::ensure_dir(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let config_created = !paths::config_path(root).exists();
    if config_created {
        Config::new(&project_name)
            .save(root)
            .context("failed to write config.yaml")?;
    }
    let cfg = Config::load(root).context("failed to load config")?;

    // 2. Specs dir, contained within the project
    let specs_dir = cfg.specs_dir(root).context("invalid specs_dir in config")?;
    io::ensure_dir(&specs_dir)
        .with_context(|| format!("failed to create {}", specs_dir.display()))?;

    // 3. Editable template overrides
    let templates = TemplateStore::new(root, cfg.templates.cache_ttl());
    let installed = templates
        .install_defaults()
        .context("failed to write templates")?;

    // 4. Counter floor from features numbered before the counter existed
    let counter = migrations::seed_counter(root, &cfg).context("failed to seed feature counter")?;

    if json {
        print_json(&serde_json::json!({
            "root": root,
            "config_created": config_created,
            "templates_installed": installed,
            "counter": counter,
        }))?;
        return Ok(());
    }

    let status = |created: bool| if created { "created:" } else { "exists: " };
    println!("  {} {}", status(config_created), paths::CONFIG_FILE);
    for kind in specflow_core::template::ArtifactKind::ALL {
        println!(
            "  {} {}/{kind}.md",
            status(installed.contains(&kind)),
            paths::TEMPLATES_DIR
        );
    }
    println!("  counter: {counter}");
    println!("\nspecflow initialized successfully.");
    println!("Next: specflow feature create \"<name>\"");
    Ok(())
}
