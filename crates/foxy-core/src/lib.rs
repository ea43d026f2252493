//! Asset dependency orchestration for foxy
//!
//! This crate bridges a Composer project (the host) with an npm-compatible
//! asset manager:
//!
//! - **Configuration**: `config.foxy` layers from the Composer home and the
//!   project, overridden by `FOXY__*` environment variables
//! - **Collection**: staging the `package.json` of every asset-bearing package
//! - **Merging**: keeping the `@composer-asset/*` entries of the project
//!   manifest in line with the collected packages
//! - **Installation**: running npm, yarn or pnpm behind a version gate
//! - **Fallback**: restoring the manifest and the host lock when the install
//!   fails
//!
//! # Architecture
//!
//! ```text
//!                     foxy-cli
//!                        |
//!                     Solver
//!                        |
//!     +---------+--------+--------+-----------+
//!     |         |        |        |           |
//! collector  asset_   manager  fallback     host
//!            package     |
//!                     process / version
//!                        |
//!                     foxy-fs
//! ```
//!
//! # Example
//!
//! ```ignore
//! use foxy_core::{ComposerProject, ConfigResolver, InstallOptions, ManagerFinder, ProcessRunner, Solver};
//!
//! let mut project = ComposerProject::new(root.clone());
//! let config = ConfigResolver::new(root.clone()).resolve()?;
//! let runner = ProcessRunner::new(executor, root);
//! let manager = ManagerFinder::select(&config, &runner)?;
//! Solver::new(config, manager)?.solve(&mut project, &InstallOptions::default())?;
//! ```

pub mod asset_package;
pub mod collector;
pub mod config;
pub mod error;
pub mod fallback;
pub mod host;
pub mod manager;
pub mod process;
pub mod solver;
pub mod version;

pub use asset_package::{AssetPackage, MergeOutcome, merge};
pub use collector::{
    ASSET_PREFIX, ActivationRules, AssetDependencyEntry, AssetMap, DependencyCollector,
    MANIFEST_NAME, PLUGIN_NAME, asset_name,
};
pub use config::{Config, ConfigResolver, default_config};
pub use error::{Error, Result};
pub use fallback::{FallbackCoordinator, FallbackState, Snapshot};
pub use host::{
    ComposerProject, Host, HostPackage, InstallOptions, InstallRequest, LockData, RootPackage,
};
pub use manager::{AssetManager, InstallOutcome, ManagerFinder, ManagerKind};
pub use process::{
    Action, CommandSpec, ProcessExecutor, ProcessOutput, ProcessRunner, ShellExecutor,
    TimeoutGuard,
};
pub use solver::{SolveListener, Solver};
pub use version::{SemverConverter, VersionConstraint, VersionConverter, VersionGate};
