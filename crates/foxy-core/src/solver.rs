//! The solve run: collect, merge, install, and roll back on failure.

use foxy_fs::{NormalizedPath, io};

use crate::asset_package::AssetPackage;
use crate::collector::{ActivationRules, AssetMap, DependencyCollector};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fallback::FallbackCoordinator;
use crate::host::{Host, HostPackage, InstallOptions};
use crate::manager::AssetManager;

/// Default staging directory, relative to the vendor directory.
pub const DEFAULT_ASSET_DIR: &str = "foxy/composer-asset";

/// Hooks around a solve run. Every method defaults to a no-op.
pub trait SolveListener {
    /// Called before the asset manifests are collected.
    fn pre_solve(&mut self, _packages: &[HostPackage]) -> Result<()> {
        Ok(())
    }

    /// Called after collection; entries may be added or removed.
    fn get_assets(&mut self, _packages: &[HostPackage], _assets: &mut AssetMap) -> Result<()> {
        Ok(())
    }

    /// Called after a successful asset manager run.
    fn post_solve(&mut self, _packages: &[HostPackage], _exit_code: i32) -> Result<()> {
        Ok(())
    }
}

/// Orchestrates one asset solve for a host project.
pub struct Solver {
    config: Config,
    manager: AssetManager,
    collector: DependencyCollector,
    listeners: Vec<Box<dyn SolveListener>>,
}

impl std::fmt::Debug for Solver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Solver")
            .field("manager", &self.manager.name())
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl Solver {
    /// Build a solver; `enable-packages` is compiled here so a bad pattern
    /// fails before anything runs.
    pub fn new(config: Config, manager: AssetManager) -> Result<Self> {
        let rules = ActivationRules::from_value(config.get("enable-packages")?.as_ref())?;
        let collector = DependencyCollector::new(rules, manager.root().clone());
        Ok(Self {
            config,
            manager,
            collector,
            listeners: Vec::new(),
        })
    }

    pub fn add_listener(&mut self, listener: Box<dyn SolveListener>) {
        self.listeners.push(listener);
    }

    pub fn manager(&self) -> &AssetManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut AssetManager {
        &mut self.manager
    }

    /// Staging directory for collected manifests.
    pub fn asset_dir(&self, host: &dyn Host) -> Result<NormalizedPath> {
        Ok(match self.config.get_string("composer-asset-dir")? {
            Some(dir) if NormalizedPath::new(&dir).is_absolute() => NormalizedPath::new(dir),
            Some(dir) => host.root_dir().join(&dir),
            None => host.vendor_dir().join(DEFAULT_ASSET_DIR),
        })
    }

    /// Run the solve. Returns the asset manager exit code, `0` when the run
    /// is disabled or skipped.
    ///
    /// A non-zero exit restores the captured state and fails with
    /// [`Error::InstallFailure`].
    pub fn solve(&mut self, host: &mut dyn Host, options: &InstallOptions) -> Result<i32> {
        if !self.config.get_bool("enabled")? {
            tracing::debug!("Foxy is disabled, skipping asset solve");
            return Ok(0);
        }

        self.manager.set_dev_mode(options.dev_mode());
        let mut fallback = FallbackCoordinator::new(self.manager.manifest_path(), &self.config)?;
        fallback.save(&*host)?;
        self.manager.validate()?;

        let packages = host.packages()?;
        let assets = self.collect_assets(&*host, &packages)?;
        self.merge_assets(&*host, &assets)?;

        if !self.config.get_bool("run-asset-manager")? {
            tracing::debug!("Asset manager run disabled");
            fallback.commit()?;
            return Ok(0);
        }

        let outcome = match self.manager.run() {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!(error = %err, "Asset manager could not be run");
                fallback.restore(host, options)?;
                return Err(err);
            }
        };

        if outcome.success() {
            fallback.commit()?;
            for listener in &mut self.listeners {
                listener.post_solve(&packages, outcome.exit_code)?;
            }
            return Ok(outcome.exit_code);
        }

        tracing::error!(
            command = %outcome.command,
            exit_code = outcome.exit_code,
            reason = outcome.error_reason.as_deref().unwrap_or_default(),
            "The asset manager ended with an error"
        );
        fallback.restore(host, options)?;
        Err(Error::InstallFailure {
            manager: self.manager.name().to_string(),
            exit_code: outcome.exit_code,
        })
    }

    fn collect_assets(&mut self, host: &dyn Host, packages: &[HostPackage]) -> Result<AssetMap> {
        let asset_dir = self.asset_dir(host)?;
        io::remove_path(&asset_dir)?;

        for listener in &mut self.listeners {
            listener.pre_solve(packages)?;
        }
        let mut assets = self.collector.collect(host, packages, &asset_dir)?;
        for listener in &mut self.listeners {
            listener.get_assets(packages, &mut assets)?;
        }

        tracing::debug!(count = assets.len(), "Collected asset packages");
        Ok(assets)
    }

    fn merge_assets(&self, host: &dyn Host, assets: &AssetMap) -> Result<()> {
        let root_package = host.root_package()?;
        let mut package = AssetPackage::open(self.manager.manifest_path(), &root_package)?;
        let outcome = package.merge(assets);

        self.manager.refresh_existing(&outcome.already_present)?;
        tracing::info!("Merging Composer dependencies in the asset package");
        tracing::debug!(
            added = outcome.added.len(),
            removed = outcome.removed.len(),
            kept = outcome.already_present.len(),
            "Merged asset dependencies"
        );
        package.write()
    }
}
