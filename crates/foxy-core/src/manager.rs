//! Asset manager adapters (npm, yarn, pnpm) and their selection.
//!
//! Every adapter shares the same lifecycle: probe the binary version, check
//! whether the project is already installed, then run either the install or
//! the update command. The differences between managers are data (binary,
//! lock file, subcommands) and live in [`ManagerKind`].

use std::fmt;

use foxy_fs::{NormalizedPath, io};

use crate::collector::MANIFEST_NAME;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::process::{Action, CommandSpec, ProcessOutput, ProcessRunner, timeout_from_secs};
use crate::version::{VersionGate, parse_version};

pub const NODE_MODULES: &str = "node_modules";

/// Supported asset managers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManagerKind {
    Npm,
    Yarn,
    Pnpm,
}

impl ManagerKind {
    /// Detection order used when no manager is configured.
    pub const DETECTION_ORDER: [ManagerKind; 3] = [Self::Yarn, Self::Npm, Self::Pnpm];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Yarn => "yarn",
            Self::Pnpm => "pnpm",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::DETECTION_ORDER
            .into_iter()
            .find(|kind| kind.name() == name)
    }

    pub fn lock_file(&self) -> &'static str {
        match self {
            Self::Npm => "package-lock.json",
            Self::Yarn => "yarn.lock",
            Self::Pnpm => "pnpm-lock.yaml",
        }
    }

    pub fn default_bin(&self) -> &'static str {
        self.name()
    }

    /// Whether `is_installed` also requires the lock file.
    fn installed_needs_lock(&self) -> bool {
        matches!(self, Self::Yarn | Self::Pnpm)
    }
}

impl fmt::Display for ManagerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of an install or update run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub command: String,
    pub exit_code: i32,
    /// Set whenever `exit_code` is non-zero
    pub error_reason: Option<String>,
}

impl InstallOutcome {
    fn from_output(command: String, output: &ProcessOutput) -> Self {
        let error_reason = (!output.success()).then(|| {
            if output.timed_out {
                "the command timed out".to_string()
            } else if !output.stderr.trim().is_empty() {
                output.stderr.trim().to_string()
            } else {
                format!("exit code {}", output.exit_code)
            }
        });
        Self {
            command,
            exit_code: output.exit_code,
            error_reason,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// One asset manager bound to a project directory.
#[derive(Debug)]
pub struct AssetManager {
    kind: ManagerKind,
    config: Config,
    runner: ProcessRunner,
    gate: VersionGate,
    dev_mode: bool,
    updatable: bool,
}

impl AssetManager {
    /// Bind `kind` to the runner's directory. Per-manager config maps are
    /// resolved for this manager.
    pub fn new(kind: ManagerKind, config: &Config, runner: ProcessRunner) -> Result<Self> {
        let config = config.for_manager(kind.name());
        let gate = VersionGate::new(kind.name(), config.get_string("manager-version")?);
        Ok(Self {
            kind,
            config,
            runner,
            gate,
            dev_mode: true,
            updatable: false,
        })
    }

    pub fn kind(&self) -> ManagerKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn root(&self) -> &NormalizedPath {
        self.runner.cwd()
    }

    pub fn manifest_path(&self) -> NormalizedPath {
        self.root().join(MANIFEST_NAME)
    }

    pub fn lock_path(&self) -> NormalizedPath {
        self.root().join(self.kind.lock_file())
    }

    pub fn set_dev_mode(&mut self, dev_mode: bool) {
        self.dev_mode = dev_mode;
    }

    pub fn dev_mode(&self) -> bool {
        self.dev_mode
    }

    /// Request an update instead of an install when the project allows it.
    pub fn set_updatable(&mut self, updatable: bool) {
        self.updatable = updatable;
    }

    pub fn has_lock_file(&self) -> bool {
        self.lock_path().is_file()
    }

    /// Trimmed output of `<bin> --version`, probed once.
    pub fn version(&self) -> Result<&str> {
        self.gate.detected_version(|| self.probe_version())
    }

    pub fn is_available(&self) -> Result<bool> {
        Ok(!self.version()?.is_empty())
    }

    pub fn is_installed(&self) -> bool {
        let root = self.root();
        root.join(NODE_MODULES).is_dir()
            && self.manifest_path().is_file()
            && (!self.kind.installed_needs_lock() || self.has_lock_file())
    }

    /// Yarn 2 and later (berry) use a different command set.
    pub fn is_yarn_next(&self) -> Result<bool> {
        if self.kind != ManagerKind::Yarn {
            return Ok(false);
        }
        Ok(parse_version(self.version()?).is_some_and(|v| v.major >= 2))
    }

    pub fn is_valid_for_update(&self) -> Result<bool> {
        if self.kind != ManagerKind::Yarn || self.is_yarn_next()? {
            return Ok(true);
        }
        let output = self.runner.execute(&self.command(Action::Check)?)?;
        Ok(output.success())
    }

    /// Update requested, project installed and the manager agrees.
    pub fn is_updatable(&self) -> Result<bool> {
        Ok(self.updatable && self.is_installed() && self.is_valid_for_update()?)
    }

    /// Check the binary is present and satisfies `manager-version`.
    pub fn validate(&self) -> Result<()> {
        self.gate.validate(|| self.probe_version())
    }

    /// Resolve the command for `action` from the adapter and config.
    pub fn command(&self, action: Action) -> Result<CommandSpec> {
        const NONE: &[&str] = &[];
        const PROD: &[&str] = &["--prod"];
        const DEV: &[&str] = &["--dev"];
        let (command, extra) = match (self.kind, action) {
            (_, Action::Version) => ("--version", NONE),
            (ManagerKind::Npm, Action::Install) if self.dev_mode => ("install", NONE),
            (ManagerKind::Npm, Action::Install) => ("install", PROD),
            (ManagerKind::Npm, Action::Update) if self.dev_mode => ("update", DEV),
            (ManagerKind::Npm, Action::Update) => ("update", NONE),
            (ManagerKind::Yarn, Action::Install) if self.is_yarn_next()? => ("install", NONE),
            (ManagerKind::Yarn, Action::Install) => ("install --non-interactive", NONE),
            (ManagerKind::Yarn, Action::Update) if self.is_yarn_next()? => ("up", NONE),
            (ManagerKind::Yarn, Action::Update) => ("upgrade --non-interactive", NONE),
            (ManagerKind::Pnpm, Action::Install) => ("install", NONE),
            (ManagerKind::Pnpm, Action::Update) => ("update", NONE),
            (_, Action::Check) => ("check --non-interactive", NONE),
        };
        CommandSpec::from_config(&self.config, self.kind.default_bin(), action, command, extra)
    }

    /// Drop installed copies of packages that are already declared so the
    /// next run picks up their new content. Only npm needs this.
    pub fn refresh_existing(&self, names: &[String]) -> Result<()> {
        if self.kind != ManagerKind::Npm {
            return Ok(());
        }
        let modules = self.root().join(NODE_MODULES);
        for name in names {
            let path = modules.join(name);
            tracing::debug!(path = %path, "Removing installed asset package");
            io::remove_path(&path)?;
        }
        Ok(())
    }

    /// Run the install, or the update when [`Self::is_updatable`], under
    /// the `manager-timeout` setting.
    pub fn run(&self) -> Result<InstallOutcome> {
        let updatable = self.is_updatable()?;
        let action = if updatable {
            Action::Update
        } else {
            Action::Install
        };
        tracing::info!(
            "{} {} dependencies",
            if updatable { "Updating" } else { "Installing" },
            self.name()
        );

        let spec = self.command(action)?;
        let timeout = timeout_from_secs(self.config.get_u64("manager-timeout")?);
        let output = self.runner.run(&spec, timeout)?;
        let outcome = InstallOutcome::from_output(spec.command_line(), &output);
        tracing::debug!(
            command = %outcome.command,
            exit_code = outcome.exit_code,
            "Asset manager finished"
        );
        Ok(outcome)
    }

    fn probe_version(&self) -> Result<String> {
        let output = self.runner.execute(&self.command(Action::Version)?)?;
        Ok(output.stdout)
    }
}

/// Picks the asset manager for a project.
#[derive(Debug)]
pub struct ManagerFinder {
    managers: Vec<AssetManager>,
}

impl ManagerFinder {
    /// Finder over every supported manager in detection order.
    pub fn new(config: &Config, runner: &ProcessRunner) -> Result<Self> {
        let managers = ManagerKind::DETECTION_ORDER
            .into_iter()
            .map(|kind| AssetManager::new(kind, config, runner.clone()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { managers })
    }

    /// The manager named `requested`, or the first one with a lock file,
    /// or the first one whose binary answers a version probe.
    pub fn find(self, requested: Option<&str>) -> Result<AssetManager> {
        if let Some(requested) = requested {
            return self
                .managers
                .into_iter()
                .find(|m| m.name() == requested)
                .ok_or_else(|| Error::ManagerNotFound {
                    manager: requested.to_string(),
                });
        }

        let mut managers = self.managers;
        if let Some(idx) = managers.iter().position(AssetManager::has_lock_file) {
            let manager = managers.swap_remove(idx);
            tracing::debug!(manager = manager.name(), "Selected asset manager by lock file");
            return Ok(manager);
        }

        let mut available = None;
        for (idx, manager) in managers.iter().enumerate() {
            if manager.is_available()? {
                available = Some(idx);
                break;
            }
        }

        let manager = managers.swap_remove(available.ok_or(Error::NoManagerAvailable)?);
        tracing::debug!(manager = manager.name(), "Selected available asset manager");
        Ok(manager)
    }

    /// Select using the `manager` config key.
    pub fn select(config: &Config, runner: &ProcessRunner) -> Result<AssetManager> {
        let requested = config.get_string("manager")?;
        Self::new(config, runner)?.find(requested.as_deref())
    }
}
