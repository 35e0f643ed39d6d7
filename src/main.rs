//! sitepipe - build pipeline and live-reload dev server for static sites.

mod cli;
mod config;
mod core;
mod embed;
mod logger;
mod release;
mod reload;
mod serve;
mod step;
mod transform;
mod utils;
mod watch;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::PipelineConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = PipelineConfig::load(&cli)?;

    match &cli.command {
        Commands::Watch { .. } => cli::watch::serve_and_watch(&config),
        Commands::Build => cli::build::build_release(&config),
        command => match command.step() {
            Some(step) => cli::task::run_step(&config, step),
            None => unreachable!("every other command is a step task"),
        },
    }
}
