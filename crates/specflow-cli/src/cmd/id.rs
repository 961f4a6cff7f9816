use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use specflow_core::{id_alloc::IdAllocator, migrations};
use std::path::Path;

#[derive(Subcommand)]
pub enum IdSubcommand {
    /// Allocate and print the next feature id
    Next,
    /// Print the last allocated id without allocating
    Current,
    /// Raise the counter to the highest NNN- prefix under the specs dir
    Seed,
}

pub fn run(root: &Path, subcmd: IdSubcommand, json: bool) -> anyhow::Result<()> {
    let (cfg, _) = super::load_project(root)?;
    let alloc = IdAllocator::for_project(root, &cfg.ids);

    match subcmd {
        IdSubcommand::Next => {
            let allocation = alloc.next()?;
            let id = allocation.id();
            if allocation.was_repaired() {
                tracing::warn!("feature counter was unreadable and has been reset");
            }
            if json {
                print_json(&serde_json::json!({
                    "id": id.value(),
                    "formatted": id.to_string(),
                    "repaired": allocation.was_repaired(),
                }))?;
            } else {
                println!("{id}");
            }
        }
        IdSubcommand::Current => {
            let value = alloc.current()?;
            if json {
                print_json(&serde_json::json!({ "id": value }))?;
            } else {
                println!("{value}");
            }
        }
        IdSubcommand::Seed => {
            let value = migrations::seed_counter(root, &cfg).context("failed to seed counter")?;
            if json {
                print_json(&serde_json::json!({ "id": value }))?;
            } else {
                println!("Counter at {value}");
            }
        }
    }
    Ok(())
}
