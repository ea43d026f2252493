//! Project asset manifest merging
//!
//! Entries of `dependencies` whose name starts with `@composer-asset/` are
//! owned by foxy: they are added, kept or removed to match the collected
//! assets. Every other key of the manifest is left untouched.

use foxy_fs::{JsonFile, NormalizedPath};
use serde_json::{Map, Value};

use crate::collector::{ASSET_PREFIX, AssetMap};
use crate::error::Result;
use crate::host::RootPackage;

pub const SECTION_DEPENDENCIES: &str = "dependencies";
pub const SECTION_DEV_DEPENDENCIES: &str = "devDependencies";

/// Outcome of [`merge`].
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub package: Map<String, Value>,
    /// Collected names already declared; their existing value was kept
    pub already_present: Vec<String>,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// Merge collected assets into a manifest.
///
/// Owned entries missing from `collected` are removed, new ones are added
/// with a `file:./<dir>` specifier, and existing ones keep their value.
/// Dependency sections are sorted by key afterwards.
pub fn merge(existing: Map<String, Value>, collected: &AssetMap) -> MergeOutcome {
    let mut package = existing;
    let removed = remove_unused_dependencies(&mut package, collected);
    let (added, already_present) = add_new_dependencies(&mut package, collected);
    sort_dependencies(&mut package);

    MergeOutcome {
        package,
        already_present,
        added,
        removed,
    }
}

/// Owned entries of the `dependencies` section.
pub fn installed_dependencies(package: &Map<String, Value>) -> Map<String, Value> {
    match package.get(SECTION_DEPENDENCIES) {
        Some(Value::Object(deps)) => deps
            .iter()
            .filter(|(name, _)| name.starts_with(ASSET_PREFIX))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect(),
        _ => Map::new(),
    }
}

fn remove_unused_dependencies(package: &mut Map<String, Value>, collected: &AssetMap) -> Vec<String> {
    let removed: Vec<String> = installed_dependencies(package)
        .keys()
        .filter(|name| !collected.contains_key(*name))
        .cloned()
        .collect();

    if let Some(Value::Object(deps)) = package.get_mut(SECTION_DEPENDENCIES) {
        for name in &removed {
            deps.shift_remove(name);
        }
    }
    removed
}

fn add_new_dependencies(
    package: &mut Map<String, Value>,
    collected: &AssetMap,
) -> (Vec<String>, Vec<String>) {
    let installed = installed_dependencies(package);
    let mut added = Vec::new();
    let mut already_present = Vec::new();

    for (name, path) in collected {
        if installed.contains_key(name) {
            already_present.push(name.clone());
            continue;
        }

        let deps = package
            .entry(SECTION_DEPENDENCIES)
            .or_insert_with(|| Value::Object(Map::new()));
        if !deps.is_object() {
            *deps = Value::Object(Map::new());
        }
        if let Value::Object(deps) = deps {
            deps.insert(name.clone(), Value::String(file_specifier(path)));
        }
        added.push(name.clone());
    }

    (added, already_present)
}

/// `file:./` followed by the directory of the staged manifest.
pub fn file_specifier(path: &str) -> String {
    let dir = NormalizedPath::new(path)
        .parent()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| ".".to_string());
    format!("file:./{dir}")
}

/// Sort `dependencies` and `devDependencies` by key byte value.
pub fn sort_dependencies(package: &mut Map<String, Value>) {
    for section in [SECTION_DEPENDENCIES, SECTION_DEV_DEPENDENCIES] {
        if let Some(Value::Object(deps)) = package.get_mut(section) {
            let mut entries: Vec<(String, Value)> = std::mem::take(deps).into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.as_bytes().cmp(b.as_bytes()));
            deps.extend(entries);
        }
    }
}

/// Add `license` from the root package when the manifest has none.
///
/// A `proprietary` root license marks the manifest `private` instead.
pub fn inject_license(package: &mut Map<String, Value>, root: &RootPackage) {
    if package.contains_key("license") {
        return;
    }
    let Some(license) = root.licenses.first() else {
        return;
    };

    if license == "proprietary" {
        if !package.contains_key("private") {
            package.insert("private".to_string(), Value::Bool(true));
        }
    } else {
        package.insert("license".to_string(), Value::String(license.clone()));
    }
}

/// The project asset manifest on disk.
#[derive(Debug)]
pub struct AssetPackage {
    file: JsonFile,
    package: Map<String, Value>,
}

impl AssetPackage {
    /// Load the manifest at `path`, or start an empty one, and inject the
    /// root package license.
    pub fn open(path: NormalizedPath, root: &RootPackage) -> Result<Self> {
        let file = JsonFile::new(path);
        let mut package = if file.exists() {
            file.read_object()?
        } else {
            Map::new()
        };
        inject_license(&mut package, root);
        Ok(Self { file, package })
    }

    pub fn path(&self) -> &NormalizedPath {
        self.file.path()
    }

    pub fn package(&self) -> &Map<String, Value> {
        &self.package
    }

    /// Merge `collected` in place, returning the names already present.
    pub fn merge(&mut self, collected: &AssetMap) -> MergeOutcome {
        let outcome = merge(std::mem::take(&mut self.package), collected);
        self.package = outcome.package.clone();
        outcome
    }

    /// Write the manifest keeping the original indentation and `[]` keys.
    pub fn write(&self) -> Result<()> {
        self.file.write(&self.package)?;
        Ok(())
    }
}
