//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use foxy_core::InstallOptions;

/// foxy - Merge Composer package assets into package.json and install them
#[derive(Parser, Debug)]
#[command(name = "foxy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project directory (defaults to the current directory)
    #[arg(short = 'd', long = "working-dir", global = true)]
    pub working_dir: Option<PathBuf>,

    /// Composer binary used to reinstall the lock on fallback
    #[arg(long, global = true, env = "FOXY_COMPOSER_BIN", default_value = "composer")]
    pub composer: String,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Merge the asset dependencies and install them
    Install(SolveArgs),

    /// Merge the asset dependencies and update them when possible
    Update(SolveArgs),

    /// Select the asset manager and validate its version
    Check,

    /// Print a resolved configuration value as JSON
    Config {
        /// Configuration key, e.g. `manager-version`
        key: String,

        /// Resolve per-manager maps for this manager
        #[arg(long)]
        manager: Option<String>,
    },
}

/// Flags mirrored from `composer install`, used when the host is restored.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct SolveArgs {
    /// Skip dev dependencies
    #[arg(long)]
    pub no_dev: bool,

    /// Install packages from source when restoring
    #[arg(long)]
    pub prefer_source: bool,

    /// Install packages from dist when restoring
    #[arg(long)]
    pub prefer_dist: bool,

    /// Skip autoloader generation when restoring
    #[arg(long)]
    pub no_autoloader: bool,

    /// Optimize the autoloader when restoring
    #[arg(short = 'o', long)]
    pub optimize_autoloader: bool,

    /// Use an authoritative classmap when restoring
    #[arg(short = 'a', long)]
    pub classmap_authoritative: bool,

    /// Use APCu to cache found classes when restoring
    #[arg(long)]
    pub apcu_autoloader: bool,

    /// Ignore platform requirements when restoring
    #[arg(long)]
    pub ignore_platform_reqs: bool,
}

impl SolveArgs {
    pub fn install_options(&self, verbose: bool) -> InstallOptions {
        InstallOptions {
            prefer_source: self.prefer_source,
            prefer_dist: self.prefer_dist,
            no_dev: self.no_dev,
            no_autoloader: self.no_autoloader,
            optimize_autoloader: self.optimize_autoloader,
            classmap_authoritative: self.classmap_authoritative,
            apcu_autoloader: self.apcu_autoloader,
            ignore_platform_reqs: self.ignore_platform_reqs,
            verbose,
        }
    }
}
