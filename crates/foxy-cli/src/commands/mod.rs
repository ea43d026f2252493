//! Command implementations for foxy-cli

pub mod check;
pub mod config;
pub mod solve;

use std::path::Path;

use foxy_fs::{NormalizedPath, io};

use crate::error::{CliError, Result};

pub use check::run_check;
pub use config::run_config;
pub use solve::run_solve;

/// Canonical project root; the directory must hold a `composer.json`.
pub fn project_root(path: &Path) -> Result<NormalizedPath> {
    let root = io::canonicalize(&NormalizedPath::new(path))?;
    if !root.join("composer.json").is_file() {
        return Err(CliError::user(format!(
            "No composer.json found in {}",
            root
        )));
    }
    Ok(root)
}
