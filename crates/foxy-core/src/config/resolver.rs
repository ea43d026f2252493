//! Configuration resolution with hierarchical merge
//!
//! The `ConfigResolver` loads the `config.foxy` sections of the global and
//! project Composer files and merges them over the built-in defaults.

use std::path::PathBuf;

use foxy_fs::{JsonFile, NormalizedPath};
use serde_json::{Map, Value};

use super::defaults::default_config;
use super::values::Config;
use crate::Result;

/// Resolves foxy configuration by merging multiple sources
///
/// Later sources override earlier ones key by key:
/// 1. `$COMPOSER_HOME/composer.json`
/// 2. `$COMPOSER_HOME/config.json`
/// 3. `<root>/composer.json`
pub struct ConfigResolver {
    /// Project root directory containing `composer.json`
    root: NormalizedPath,

    /// Override for the Composer home directory (used for testing).
    /// When `None`, `COMPOSER_HOME` or `dirs::config_dir()/composer` is used.
    composer_home_override: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(root: NormalizedPath) -> Self {
        Self {
            root,
            composer_home_override: None,
        }
    }

    /// Create a resolver with a custom Composer home directory.
    pub fn with_composer_home(root: NormalizedPath, composer_home: PathBuf) -> Self {
        Self {
            root,
            composer_home_override: Some(composer_home),
        }
    }

    /// Determine the Composer home directory.
    pub fn composer_home(&self) -> Option<PathBuf> {
        if let Some(ref override_dir) = self.composer_home_override {
            return Some(override_dir.clone());
        }
        if let Some(home) = std::env::var_os("COMPOSER_HOME").filter(|h| !h.is_empty()) {
            return Some(PathBuf::from(home));
        }
        dirs::config_dir().map(|d| d.join("composer"))
    }

    /// Resolve the configuration by merging all sources.
    ///
    /// Missing files are skipped. Invalid JSON in any file is an error.
    pub fn resolve(&self) -> Result<Config> {
        let mut values = Map::new();

        if let Some(home) = self.composer_home() {
            let home = NormalizedPath::new(home);
            for name in ["composer.json", "config.json"] {
                let path = home.join(name);
                if let Some(section) = read_foxy_section(&path)? {
                    tracing::debug!(%path, "Loading global foxy config");
                    merge(&mut values, section);
                }
            }
        }

        let project_path = self.root.join("composer.json");
        if let Some(section) = read_foxy_section(&project_path)? {
            tracing::debug!(path = %project_path, "Loading project foxy config");
            merge(&mut values, section);
        }

        Ok(Config::new(values, default_config()))
    }

    /// Get the project root path
    pub fn root(&self) -> &NormalizedPath {
        &self.root
    }
}

/// Read `config.foxy` from a Composer JSON file, if present.
fn read_foxy_section(path: &NormalizedPath) -> Result<Option<Map<String, Value>>> {
    if !path.is_file() {
        return Ok(None);
    }

    let mut document = JsonFile::new(path.clone()).read_object()?;
    let section = document
        .remove("config")
        .and_then(|config| match config {
            Value::Object(mut config) => config.remove("foxy"),
            _ => None,
        });

    Ok(match section {
        Some(Value::Object(map)) => Some(map),
        _ => None,
    })
}

fn merge(target: &mut Map<String, Value>, layer: Map<String, Value>) {
    for (key, value) in layer {
        target.insert(key, value);
    }
}
