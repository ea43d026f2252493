//! foxy CLI
//!
//! Runs the asset solve of a Composer project from the command line.

mod cli;
mod commands;
mod error;

use std::path::Path;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use error::Result;

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let dir = match &cli.working_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    execute_command(cli.command, &dir, &cli.composer, cli.verbose)
}

/// `RUST_LOG` wins; otherwise `info`, or `debug` with `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .without_time()
        .with_writer(std::io::stderr)
        .try_init();
    tracing::debug!("Verbose mode enabled");
}

fn execute_command(cmd: Commands, dir: &Path, composer: &str, verbose: bool) -> Result<i32> {
    match cmd {
        Commands::Install(args) => {
            commands::run_solve(dir, composer, &args.install_options(verbose), false)
        }
        Commands::Update(args) => {
            commands::run_solve(dir, composer, &args.install_options(verbose), true)
        }
        Commands::Check => commands::run_check(dir).map(|()| 0),
        Commands::Config { key, manager } => {
            commands::run_config(dir, &key, manager.as_deref()).map(|()| 0)
        }
    }
}
