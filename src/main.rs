//! kiln - incremental, crash-isolated prerendering of component entry points.

mod cli;
mod config;
mod core;
mod discovery;
mod graph;
mod logger;
mod reload;
mod render;
mod session;
mod utils;
mod watch;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::Config;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            log!("error"; "{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
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

    match &cli.command {
        Some(Commands::Init { force }) => {
            let cwd = std::env::current_dir()?;
            cli::init::write_config(&cli.config, &cwd, *force)?;
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::List { json }) => {
            let config = Config::load(&cli)?;
            cli::list::run(&config, *json)?;
            Ok(ExitCode::SUCCESS)
        }
        None => {
            let config = Config::load(&cli)?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .thread_name("kiln")
                .build()
                .context("cannot start async runtime")?;
            runtime.block_on(cli::render::run(&cli, config, core::shutdown_signal()))
        }
    }
}
