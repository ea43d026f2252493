//! In-memory [`Host`] for solver and fallback tests.

use std::collections::HashMap;

use foxy_core::host::{Host, HostPackage, InstallRequest, LockData, RootPackage};
use foxy_core::{Error, Result};
use foxy_fs::NormalizedPath;
use serde_json::{Value, json};

/// A host whose packages and lock live in memory.
///
/// Install paths default to `<root>/vendor/<name>`, so manifests written with
/// [`crate::TestProject::package_manifest`] are found.
#[derive(Debug)]
pub struct MockHost {
    root: NormalizedPath,
    root_package: RootPackage,
    packages: Vec<HostPackage>,
    install_paths: HashMap<String, NormalizedPath>,
    lock: Option<LockData>,
    installs: Vec<InstallRequest>,
    install_error: Option<String>,
}

impl MockHost {
    pub fn new(root: NormalizedPath) -> Self {
        Self {
            root,
            root_package: RootPackage::new("acme/app"),
            packages: Vec::new(),
            install_paths: HashMap::new(),
            lock: None,
            installs: Vec::new(),
            install_error: None,
        }
    }

    pub fn with_root_package(mut self, root_package: RootPackage) -> Self {
        self.root_package = root_package;
        self
    }

    pub fn with_package(mut self, package: HostPackage) -> Self {
        self.packages.push(package);
        self
    }

    /// Install `name` somewhere other than the vendor directory.
    pub fn with_install_path(mut self, name: &str, path: NormalizedPath) -> Self {
        self.install_paths.insert(name.to_string(), path);
        self
    }

    pub fn with_lock(mut self, lock: LockData) -> Self {
        self.lock = Some(lock);
        self
    }

    /// Lock data listing one package per name.
    pub fn locked_with(names: &[&str]) -> LockData {
        let packages: Vec<Value> = names
            .iter()
            .map(|name| json!({"name": name, "version": "1.0.0"}))
            .collect();
        match json!({ "packages": packages }) {
            Value::Object(map) => LockData::new(map),
            _ => unreachable!("json! object literal"),
        }
    }

    /// Make `install_from_lock` fail with `message`.
    pub fn failing_install(mut self, message: &str) -> Self {
        self.install_error = Some(message.to_string());
        self
    }

    pub fn lock(&self) -> Option<&LockData> {
        self.lock.as_ref()
    }

    /// Requests received by `install_from_lock`.
    pub fn installs(&self) -> &[InstallRequest] {
        &self.installs
    }
}

impl Host for MockHost {
    fn root_dir(&self) -> &NormalizedPath {
        &self.root
    }

    fn root_package(&self) -> Result<RootPackage> {
        Ok(self.root_package.clone())
    }

    fn packages(&self) -> Result<Vec<HostPackage>> {
        Ok(self.packages.clone())
    }

    fn install_path(&self, package: &HostPackage) -> NormalizedPath {
        self.install_paths
            .get(&package.name)
            .cloned()
            .unwrap_or_else(|| self.vendor_dir().join(&package.name))
    }

    fn vendor_dir(&self) -> NormalizedPath {
        self.root.join(&self.root_package.vendor_dir())
    }

    fn lock_data(&self) -> Result<Option<LockData>> {
        Ok(self.lock.clone())
    }

    fn set_lock_data(&mut self, lock: Option<LockData>) -> Result<()> {
        self.lock = lock;
        Ok(())
    }

    fn install_from_lock(&mut self, request: &InstallRequest) -> Result<()> {
        self.installs.push(*request);
        match &self.install_error {
            Some(message) => Err(Error::host(message.clone())),
            None => Ok(()),
        }
    }
}
