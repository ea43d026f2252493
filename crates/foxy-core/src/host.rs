//! Host package manager boundary
//!
//! Foxy only needs a narrow view of the PHP package manager: the resolved
//! packages and where they are installed, the root package, the lock data,
//! and a way to re-run an install from the lock file. [`Host`] captures that
//! view; [`ComposerProject`] implements it over the files of a Composer
//! project on disk.

use std::collections::BTreeMap;
use std::rc::Rc;

use foxy_fs::{JsonFile, NormalizedPath, io};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::process::{ProcessExecutor, ShellExecutor, TimeoutGuard};

/// A package resolved by the host package manager.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostPackage {
    pub name: String,

    /// Version as displayed to users, e.g. `1.2.0` or `dev-master`
    #[serde(rename = "version", default)]
    pub pretty_version: String,

    #[serde(rename = "require", default, deserialize_with = "object_or_empty")]
    pub requires: BTreeMap<String, String>,

    #[serde(rename = "require-dev", default, deserialize_with = "object_or_empty")]
    pub dev_requires: BTreeMap<String, String>,

    #[serde(default, deserialize_with = "object_or_empty")]
    pub extra: Map<String, Value>,

    /// Install path relative to `vendor/composer`, as recorded by Composer 2
    #[serde(rename = "install-path", default, skip_serializing_if = "Option::is_none")]
    pub install_path: Option<String>,
}

impl HostPackage {
    pub fn new(name: impl Into<String>, pretty_version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pretty_version: pretty_version.into(),
            ..Self::default()
        }
    }

    pub fn with_require(mut self, target: &str, constraint: &str) -> Self {
        self.requires.insert(target.to_string(), constraint.to_string());
        self
    }

    pub fn with_dev_require(mut self, target: &str, constraint: &str) -> Self {
        self.dev_requires
            .insert(target.to_string(), constraint.to_string());
        self
    }

    pub fn with_extra(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }

    /// Names of every package this one requires, dev requirements included.
    pub fn all_requires(&self) -> impl Iterator<Item = &str> {
        self.requires
            .keys()
            .chain(self.dev_requires.keys())
            .map(String::as_str)
    }
}

/// The project's own package.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RootPackage {
    #[serde(default)]
    pub name: String,

    #[serde(rename = "license", default, deserialize_with = "string_or_list")]
    pub licenses: Vec<String>,

    /// Composer `config` section
    #[serde(default)]
    pub config: Map<String, Value>,
}

impl RootPackage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_license(mut self, license: &str) -> Self {
        self.licenses.push(license.to_string());
        self
    }

    /// Composer `vendor-dir`, `vendor` when unset.
    pub fn vendor_dir(&self) -> String {
        self.config
            .get("vendor-dir")
            .and_then(Value::as_str)
            .unwrap_or("vendor")
            .to_string()
    }
}

/// Empty PHP arrays are dumped as `[]`; treat any non-object as empty.
fn object_or_empty<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    match Value::deserialize(deserializer)? {
        value @ Value::Object(_) => serde_json::from_value(value).map_err(D::Error::custom),
        _ => Ok(T::default()),
    }
}

fn string_or_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
        None(()),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(license) => vec![license],
        OneOrMany::Many(licenses) => licenses,
        OneOrMany::None(()) => Vec::new(),
    })
}

/// Content of the host lock file.
///
/// Lock data read from disk keeps its original bytes, and those bytes are
/// what gets written back. Equality compares the parsed content only.
#[derive(Debug, Clone, Default)]
pub struct LockData {
    data: Map<String, Value>,
    raw: Option<Vec<u8>>,
}

impl PartialEq for LockData {
    fn eq(&self, other: &Self) -> bool {
        self.data == other.data
    }
}

impl LockData {
    pub fn new(data: Map<String, Value>) -> Self {
        Self { data, raw: None }
    }

    /// Parse a lock file, keeping `bytes` verbatim.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let data = serde_json::from_slice(&bytes)?;
        Ok(Self {
            data,
            raw: Some(bytes),
        })
    }

    /// Bytes the lock was read from, if any.
    pub fn raw(&self) -> Option<&[u8]> {
        self.raw.as_deref()
    }

    /// Entries of the `packages` section.
    pub fn packages(&self) -> &[Value] {
        self.data
            .get("packages")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether the lock holds at least one package.
    pub fn is_locked(&self) -> bool {
        !self.packages().is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.data
    }
}

/// Console flags of the host command that triggered the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallOptions {
    pub prefer_source: bool,
    pub prefer_dist: bool,
    pub no_dev: bool,
    pub no_autoloader: bool,
    pub optimize_autoloader: bool,
    pub classmap_authoritative: bool,
    pub apcu_autoloader: bool,
    pub ignore_platform_reqs: bool,
    pub verbose: bool,
}

impl InstallOptions {
    pub fn dev_mode(&self) -> bool {
        !self.no_dev
    }
}

/// Settings of a host install run from the lock file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallRequest {
    pub verbose: bool,
    pub prefer_source: bool,
    pub prefer_dist: bool,
    pub dev_mode: bool,
    pub dump_autoloader: bool,
    pub optimize_autoloader: bool,
    pub classmap_authoritative: bool,
    pub apcu_autoloader: bool,
    pub ignore_platform_reqs: bool,
    pub run_scripts: bool,
}

impl InstallRequest {
    /// Combine the console flags with the host configuration.
    ///
    /// Explicit `--prefer-source`/`--prefer-dist` flags replace the host's
    /// `preferred-install`; autoloader flags are OR'd with the host config.
    /// Scripts never run during a rollback install.
    pub fn resolve(options: &InstallOptions, host_config: &Map<String, Value>) -> Self {
        let (mut prefer_source, mut prefer_dist) =
            match host_config.get("preferred-install").and_then(Value::as_str) {
                Some("source") => (true, false),
                Some("dist") => (false, true),
                _ => (false, false),
            };
        if options.prefer_source || options.prefer_dist {
            prefer_source = options.prefer_source;
            prefer_dist = options.prefer_dist;
        }

        let enabled = |key: &str| host_config.get(key).and_then(Value::as_bool).unwrap_or(false);

        Self {
            verbose: options.verbose,
            prefer_source,
            prefer_dist,
            dev_mode: options.dev_mode(),
            dump_autoloader: !options.no_autoloader,
            optimize_autoloader: options.optimize_autoloader || enabled("optimize-autoloader"),
            classmap_authoritative: options.classmap_authoritative
                || enabled("classmap-authoritative"),
            apcu_autoloader: options.apcu_autoloader || enabled("apcu-autoloader"),
            ignore_platform_reqs: options.ignore_platform_reqs,
            run_scripts: false,
        }
    }

    /// Command line flags for `composer install`.
    pub fn to_args(&self) -> Vec<&'static str> {
        let mut args = vec!["--no-interaction"];
        let flags = [
            (self.prefer_source, "--prefer-source"),
            (self.prefer_dist, "--prefer-dist"),
            (!self.dev_mode, "--no-dev"),
            (!self.dump_autoloader, "--no-autoloader"),
            (self.optimize_autoloader, "--optimize-autoloader"),
            (self.classmap_authoritative, "--classmap-authoritative"),
            (self.apcu_autoloader, "--apcu-autoloader"),
            (self.ignore_platform_reqs, "--ignore-platform-reqs"),
            (!self.run_scripts, "--no-scripts"),
            (self.verbose, "--verbose"),
        ];
        args.extend(flags.into_iter().filter(|(on, _)| *on).map(|(_, flag)| flag));
        args
    }
}

/// The host package manager as seen by foxy.
pub trait Host {
    /// Root directory of the project.
    fn root_dir(&self) -> &NormalizedPath;

    fn root_package(&self) -> Result<RootPackage>;

    /// Every package currently installed.
    fn packages(&self) -> Result<Vec<HostPackage>>;

    /// Directory the package is installed into.
    fn install_path(&self, package: &HostPackage) -> NormalizedPath;

    /// Directory holding the installed dependencies.
    fn vendor_dir(&self) -> NormalizedPath;

    /// Current lock data, `None` when the project is not locked.
    fn lock_data(&self) -> Result<Option<LockData>>;

    /// Replace the lock data; `None` removes the lock.
    fn set_lock_data(&mut self, lock: Option<LockData>) -> Result<()>;

    /// Install the locked dependencies.
    fn install_from_lock(&mut self, request: &InstallRequest) -> Result<()>;
}

/// [`Host`] over a Composer project directory.
///
/// Reads `composer.json`, `composer.lock` and
/// `<vendor-dir>/composer/installed.json`, and reinstalls by running
/// `composer install` without a timeout.
pub struct ComposerProject {
    root: NormalizedPath,
    composer_bin: String,
    executor: Rc<dyn ProcessExecutor>,
}

impl ComposerProject {
    pub fn new(root: NormalizedPath) -> Self {
        Self::with_executor(root, Rc::new(ShellExecutor::new()))
    }

    pub fn with_executor(root: NormalizedPath, executor: Rc<dyn ProcessExecutor>) -> Self {
        Self {
            root,
            composer_bin: "composer".to_string(),
            executor,
        }
    }

    /// Use another Composer binary, e.g. `php composer.phar`.
    pub fn with_composer_bin(mut self, bin: impl Into<String>) -> Self {
        self.composer_bin = bin.into();
        self
    }

    pub fn composer_file(&self) -> NormalizedPath {
        self.root.join("composer.json")
    }

    pub fn lock_file(&self) -> NormalizedPath {
        self.root.join("composer.lock")
    }

    fn installed_file(&self) -> NormalizedPath {
        self.vendor_dir().join("composer/installed.json")
    }

    fn resolve(&self, path: &str) -> NormalizedPath {
        let path = NormalizedPath::new(path);
        if path.is_absolute() {
            path
        } else {
            self.root.join(path.as_str()).clean()
        }
    }
}

impl Host for ComposerProject {
    fn root_dir(&self) -> &NormalizedPath {
        &self.root
    }

    fn root_package(&self) -> Result<RootPackage> {
        let file = JsonFile::new(self.composer_file());
        if !file.exists() {
            return Err(Error::NotFound {
                path: self.composer_file().to_native(),
            });
        }
        Ok(serde_json::from_value(file.read()?)?)
    }

    fn packages(&self) -> Result<Vec<HostPackage>> {
        let file = JsonFile::new(self.installed_file());
        if !file.exists() {
            return Ok(Vec::new());
        }

        // Composer 2 wraps the list in {"packages": [...]}
        let packages = match file.read()? {
            Value::Object(mut map) => map.remove("packages").unwrap_or(Value::Array(Vec::new())),
            list => list,
        };
        Ok(serde_json::from_value(packages)?)
    }

    fn install_path(&self, package: &HostPackage) -> NormalizedPath {
        match &package.install_path {
            Some(relative) => self
                .vendor_dir()
                .join("composer")
                .join(relative)
                .clean(),
            None => self.vendor_dir().join(&package.name),
        }
    }

    fn vendor_dir(&self) -> NormalizedPath {
        let vendor = self
            .root_package()
            .map(|root| root.vendor_dir())
            .unwrap_or_else(|_| "vendor".to_string());
        self.resolve(&vendor)
    }

    fn lock_data(&self) -> Result<Option<LockData>> {
        io::read_optional(&self.lock_file())?
            .map(LockData::from_bytes)
            .transpose()
    }

    fn set_lock_data(&mut self, lock: Option<LockData>) -> Result<()> {
        let path = self.lock_file();
        match lock {
            Some(lock) => match lock.raw() {
                Some(bytes) => io::write_atomic(&path, bytes)?,
                None => JsonFile::new(path).write(lock.as_map())?,
            },
            None => io::remove_path(&path)?,
        }
        Ok(())
    }

    fn install_from_lock(&mut self, request: &InstallRequest) -> Result<()> {
        let command = format!("{} install {}", self.composer_bin, request.to_args().join(" "));
        tracing::info!(%command, "Reinstalling Composer dependencies from the lock file");

        let _guard = TimeoutGuard::new(self.executor.as_ref(), None);
        let output = self.executor.execute(&command, &self.root)?;
        if !output.success() {
            return Err(Error::host(format!(
                "\"{command}\" exited with code {}: {}",
                output.exit_code,
                output.stderr.trim()
            )));
        }
        Ok(())
    }
}
