//! Hotfix command-line tool
//!
//! Packs build outputs into wrapped artifacts, watches a build directory for
//! changes, inspects modules, and runs a module through the full bootstrap
//! sequence against artifacts on disk.

mod commands;
mod output;

use clap::{Parser, Subcommand};
use hotfix_runtime::HotfixConfig;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hotfix")]
#[command(about = "Hot-fix module packaging and loading", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults apply when it does not exist)
    #[arg(short, long, global = true, default_value = "hotfix.toml")]
    config: PathBuf,

    /// Color output: auto, always, never
    #[arg(long, global = true)]
    color: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode the plain build outputs in a directory
    Pack {
        /// Directory containing the plain module and symbol files
        build_dir: PathBuf,
    },

    /// Re-pack whenever a plain build output appears or changes
    Watch {
        /// Directory to watch
        build_dir: PathBuf,
    },

    /// Show what a module contains
    Inspect {
        /// Module file, plain or wrapped
        module: PathBuf,
        /// Symbol file, plain or wrapped
        #[arg(short, long)]
        symbols: Option<PathBuf>,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load the packed module and invoke its entry point
    Run {
        /// Argument passed to the entry point
        #[arg(short, long, default_value = "scene/Main")]
        arg: String,
        /// Use the production profile (no symbols, no debug bridge)
        #[arg(long)]
        production: bool,
        /// Keep running after the load until interrupted
        #[arg(long)]
        serve: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,hotfix=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}

fn load_config(path: &Path) -> anyhow::Result<HotfixConfig> {
    if path.exists() {
        Ok(HotfixConfig::from_file(path)?)
    } else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        Ok(HotfixConfig::default())
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();
    let color = output::resolve_color_choice(cli.color.as_deref());

    match cli.command {
        Commands::Pack { build_dir } => {
            let config = load_config(&cli.config)?;
            commands::pack::execute(&build_dir, &config, color)
        }

        Commands::Watch { build_dir } => {
            let config = load_config(&cli.config)?;
            commands::watch::execute(&build_dir, &config, color)
        }

        Commands::Inspect {
            module,
            symbols,
            json,
        } => commands::inspect::execute(&module, symbols.as_deref(), json, color),

        Commands::Run {
            arg,
            production,
            serve,
        } => {
            let mut config = load_config(&cli.config)?;
            if production {
                config.loader.profile = hotfix_runtime::Profile::Production;
            }
            commands::run::execute(config, arg, serve, color)
        }
    }
}
