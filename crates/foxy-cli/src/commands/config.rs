//! Config command implementation

use std::path::Path;

use foxy_core::ConfigResolver;

use super::project_root;
use crate::error::Result;

/// Print the resolved value of `key` as JSON, `null` when unset.
pub fn run_config(path: &Path, key: &str, manager: Option<&str>) -> Result<()> {
    let root = project_root(path)?;
    let mut config = ConfigResolver::new(root).resolve()?;
    if let Some(manager) = manager {
        config = config.for_manager(manager);
    }

    let value = config.get(key)?.unwrap_or_default();
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
