//! Check command implementation

use std::path::Path;
use std::rc::Rc;

use colored::Colorize;

use foxy_core::{ConfigResolver, ManagerFinder, ProcessRunner, ShellExecutor};

use super::project_root;
use crate::error::Result;

/// Select the asset manager and validate its version constraint.
pub fn run_check(path: &Path) -> Result<()> {
    println!("{} Checking asset manager...", "=>".blue().bold());

    let root = project_root(path)?;
    let config = ConfigResolver::new(root.clone()).resolve()?;
    let runner = ProcessRunner::new(Rc::new(ShellExecutor::new()), root);
    let manager = ManagerFinder::select(&config, &runner)?;
    manager.validate()?;

    let constraint = manager.config().get_string("manager-version")?;
    println!(
        "{} {} {}{}",
        "OK".green().bold(),
        manager.name().cyan(),
        manager.version()?,
        constraint
            .map(|c| format!(" satisfies \"{c}\""))
            .unwrap_or_default()
    );
    Ok(())
}
