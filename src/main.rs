//! kernwatch - re-run a script in a live interpreter session on every save.

#![allow(dead_code)]

mod cli;
mod config;
mod core;
mod launcher;
mod logger;
mod monitor;
mod process;
mod session;
mod utils;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands, USAGE};
use config::{AppConfig, ConfigError};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    let config = AppConfig::load(&cli)?;

    match &cli.command {
        Some(Commands::Monitor {
            file,
            connection_file,
        }) => monitor::run(file, connection_file, &config),
        None => {
            let Some(file) = &cli.file else {
                eprintln!("{USAGE}");
                std::process::exit(1);
            };
            if !file.is_file() {
                return Err(ConfigError::MissingTarget(file.clone()).into());
            }
            let target = utils::path::normalize_path(file);
            launcher::launch(&cli, &target, &config)
        }
    }
}
