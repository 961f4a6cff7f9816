use crate::output::{print_json, print_report};
use anyhow::Context;
use specflow_core::{
    checks,
    validation::{CancelToken, EngineOptions, ValidationEngine},
};
use std::path::Path;

pub fn run(
    root: &Path,
    feature: Option<&str>,
    workers: Option<usize>,
    fail_fast: bool,
    json: bool,
) -> anyhow::Result<()> {
    let (cfg, _) = super::load_project(root)?;
    let tasks = checks::discover(root, &cfg, feature).context("failed to discover artifacts")?;

    let engine = ValidationEngine::new(EngineOptions {
        max_workers: workers.unwrap_or(cfg.validation.workers),
        fail_fast,
    });
    let report = engine.run(&tasks, &CancelToken::new());

    if json {
        print_json(&report)?;
    } else if report.is_empty() {
        println!("No artifacts to validate.");
    } else {
        print_report(root, &report);
    }

    if !report.is_clean() {
        let c = &report.counts;
        anyhow::bail!(
            "validation failed: {} failed, {} errored, {} cancelled",
            c.fail,
            c.error,
            c.cancelled
        );
    }
    Ok(())
}
