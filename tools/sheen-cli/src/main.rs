//! Sheen CLI: inspect and export recording bundles.
//!
//! Usage:
//!   sheen export <PATH>       Export a recording bundle to video or GIF
//!   sheen info <PATH>         Show bundle information
//!   sheen validate <PATH>     Validate a recording bundle
//!   sheen check               Check for ffmpeg and ffprobe
//!   sheen init-style <PATH>   Write a default effects.json into a bundle

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "sheen",
    about = "Render screen recordings into polished videos and GIFs",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a recording bundle
    Export(commands::export::ExportArgs),

    /// Show bundle information
    Info {
        /// Path to the bundle directory
        path: PathBuf,
    },

    /// Validate a recording bundle
    Validate {
        /// Path to the bundle directory
        path: PathBuf,
    },

    /// Check that the external encoder tools are installed
    Check,

    /// Write the default effects configuration into a bundle
    InitStyle {
        /// Path to the bundle directory
        path: PathBuf,

        /// Overwrite an existing effects.json
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = sheen_common::config::AppConfig::load();

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    sheen_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Export(args) => commands::export::run(args, &config).await,
        Commands::Info { path } => commands::info::run(path),
        Commands::Validate { path } => commands::validate::run(path),
        Commands::Check => commands::check::run(),
        Commands::InitStyle { path, force } => commands::init_style::run(path, force),
    }
}
