use crate::output::print_json;
use clap::Subcommand;
use specflow_core::git::Git;
use std::path::Path;

#[derive(Subcommand)]
pub enum GitSubcommand {
    /// Create and switch to a branch
    Branch { name: String },
    /// Commit staged changes
    Commit {
        #[arg(short, long)]
        message: String,
    },
    /// Create a lightweight tag
    Tag { name: String },
}

pub fn run(root: &Path, subcmd: GitSubcommand, json: bool) -> anyhow::Result<()> {
    let git = Git::new(root);
    let (action, value, stdout) = match subcmd {
        GitSubcommand::Branch { name } => {
            let out = git.create_branch(&name)?;
            ("branch", name, out)
        }
        GitSubcommand::Commit { message } => {
            let out = git.commit(&message)?;
            ("commit", message, out)
        }
        GitSubcommand::Tag { name } => {
            let out = git.tag(&name)?;
            ("tag", name, out)
        }
    };

    if json {
        print_json(&serde_json::json!({
            "action": action,
            "value": value,
            "output": stdout,
        }))?;
    } else if !stdout.is_empty() {
        println!("{stdout}");
    }
    Ok(())
}
