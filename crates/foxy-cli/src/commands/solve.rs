//! Install and update command implementation

use std::path::Path;
use std::rc::Rc;

use colored::Colorize;

use foxy_core::{
    ComposerProject, ConfigResolver, InstallOptions, ManagerFinder, ProcessExecutor,
    ProcessRunner, ShellExecutor, Solver,
};

use super::project_root;
use crate::error::Result;

/// Run the asset solve for the project at `path`.
///
/// Returns the asset manager exit code.
pub fn run_solve(
    path: &Path,
    composer_bin: &str,
    options: &InstallOptions,
    update: bool,
) -> Result<i32> {
    let root = project_root(path)?;
    let config = ConfigResolver::new(root.clone()).resolve()?;
    if !config.get_bool("enabled")? {
        println!("{} foxy is disabled, nothing to do.", "=>".blue().bold());
        return Ok(0);
    }

    let executor: Rc<dyn ProcessExecutor> = Rc::new(ShellExecutor::new());
    let runner = ProcessRunner::new(executor.clone(), root.clone());
    let mut manager = ManagerFinder::select(&config, &runner)?;
    manager.set_updatable(update);

    println!(
        "{} Solving assets with {}...",
        "=>".blue().bold(),
        manager.name().cyan()
    );

    let mut project = ComposerProject::with_executor(root, executor).with_composer_bin(composer_bin);
    let mut solver = Solver::new(config, manager)?;
    let code = solver.solve(&mut project, options)?;

    println!("{} Asset dependencies are up to date.", "OK".green().bold());
    Ok(code)
}
