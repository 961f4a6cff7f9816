mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    artifact::ArtifactSubcommand, config::ConfigSubcommand, feature::FeatureSubcommand,
    git::GitSubcommand, id::IdSubcommand,
};
use specflow_core::error::{ErrorCategory, SpecflowError};
use std::path::PathBuf;

const EXIT_FAILURE: i32 = 1;
const EXIT_SECURITY: i32 = 2;
const EXIT_LOCK_TIMEOUT: i32 = 3;

#[derive(Parser)]
#[command(
    name = "specflow",
    about = "Spec-driven feature scaffolding: numbered feature directories, artifact templates, validation",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .specflow/ or .git/)
    #[arg(long, global = true, env = "SPECFLOW_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize specflow in the current project
    Init {
        /// Project name (default: root directory name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Manage features
    Feature {
        #[command(subcommand)]
        subcommand: FeatureSubcommand,
    },

    /// Scaffold artifacts
    Artifact {
        #[command(subcommand)]
        subcommand: ArtifactSubcommand,
    },

    /// Drive the feature id counter
    Id {
        #[command(subcommand)]
        subcommand: IdSubcommand,
    },

    /// Run artifact checks in parallel and report
    Validate {
        /// Only check one feature (directory name, slug, or id)
        #[arg(long)]
        feature: Option<String>,
        /// Worker threads (default: validation.workers from config)
        #[arg(long)]
        workers: Option<usize>,
        /// Stop claiming new checks after the first failure
        #[arg(long)]
        fail_fast: bool,
    },

    /// Sanitized branch, commit and tag operations
    Git {
        #[command(subcommand)]
        subcommand: GitSubcommand,
    },

    /// Inspect and validate config
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init { name } => cmd::init::run(&root, name.as_deref(), cli.json),
        Commands::Feature { subcommand } => cmd::feature::run(&root, subcommand, cli.json),
        Commands::Artifact { subcommand } => cmd::artifact::run(&root, subcommand, cli.json),
        Commands::Id { subcommand } => cmd::id::run(&root, subcommand, cli.json),
        Commands::Validate {
            feature,
            workers,
            fail_fast,
        } => cmd::validate::run(&root, feature.as_deref(), workers, fail_fast, cli.json),
        Commands::Git { subcommand } => cmd::git::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        let core = e.chain().find_map(|c| c.downcast_ref::<SpecflowError>());
        match core.and_then(|c| c.reason_code().map(|code| (c.category(), code))) {
            Some((ErrorCategory::SecurityViolation, code)) => {
                eprintln!("error[{code}]: {e:#}");
                std::process::exit(EXIT_SECURITY);
            }
            Some((ErrorCategory::ResourceContention, code)) => {
                eprintln!("error[{code}]: {e:#}");
                std::process::exit(EXIT_LOCK_TIMEOUT);
            }
            _ => {
                eprintln!("error: {e:#}");
                std::process::exit(EXIT_FAILURE);
            }
        }
    }
}
