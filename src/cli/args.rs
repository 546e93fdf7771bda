//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Re-run a script in a live interpreter session every time it is saved
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Script to watch and re-run on save
    #[arg(value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    pub file: Option<PathBuf>,

    /// Reload changed imported modules before each run
    #[arg(long)]
    pub autoreload: bool,

    /// Do not start the visualization tool
    #[arg(long)]
    pub no_viewer: bool,

    /// Config file path (default: kernwatch.toml, searched upward from cwd)
    #[arg(short = 'C', long, global = true, default_value = "kernwatch.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// internal subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Internal subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Watch FILE and re-run it in the interpreter behind CONNECTION_FILE
    #[command(hide = true)]
    Monitor {
        /// Script to watch
        #[arg(value_hint = clap::ValueHint::FilePath)]
        file: PathBuf,

        /// Interpreter connection file written by the launcher
        #[arg(value_hint = clap::ValueHint::FilePath)]
        connection_file: PathBuf,
    },
}

impl Cli {
    pub const fn is_monitor(&self) -> bool {
        matches!(self.command, Some(Commands::Monitor { .. }))
    }
}

/// Usage line printed when FILE is missing.
pub const USAGE: &str = "Usage: kernwatch [OPTIONS] <FILE>";
