//! Rollback of the asset manifest and the host lock after a failed install.
//!
//! A [`FallbackCoordinator`] moves through `Idle -> Captured` and then ends in
//! either `Committed` or `RolledBack`. The snapshot is taken once, before
//! anything is mutated, and is the only source used for restoration.

use std::fmt;

use foxy_fs::{NormalizedPath, io};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::host::{Host, InstallOptions, InstallRequest, LockData};

/// Lifecycle of a [`FallbackCoordinator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackState {
    Idle,
    Captured,
    Committed,
    RolledBack,
}

impl fmt::Display for FallbackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Captured => "captured",
            Self::Committed => "committed",
            Self::RolledBack => "rolled back",
        })
    }
}

/// State captured before mutation. `None` means the item was absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub manifest: Option<Vec<u8>>,
    pub lock: Option<LockData>,
}

/// Captures and restores the asset manifest and the host lock.
#[derive(Debug)]
pub struct FallbackCoordinator {
    manifest_path: NormalizedPath,
    fallback_asset: bool,
    fallback_composer: bool,
    state: FallbackState,
    snapshot: Snapshot,
}

impl FallbackCoordinator {
    /// Coordinator honouring `fallback-asset` and `fallback-composer`.
    pub fn new(manifest_path: NormalizedPath, config: &Config) -> Result<Self> {
        Ok(Self::with_flags(
            manifest_path,
            config.get_bool("fallback-asset")?,
            config.get_bool("fallback-composer")?,
        ))
    }

    pub fn with_flags(manifest_path: NormalizedPath, fallback_asset: bool, fallback_composer: bool) -> Self {
        Self {
            manifest_path,
            fallback_asset,
            fallback_composer,
            state: FallbackState::Idle,
            snapshot: Snapshot::default(),
        }
    }

    pub fn state(&self) -> FallbackState {
        self.state
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Capture the manifest bytes and the host lock data.
    ///
    /// Unreadable items are recorded as absent.
    pub fn save(&mut self, host: &dyn Host) -> Result<()> {
        self.transition("save", FallbackState::Idle, FallbackState::Captured)?;

        let manifest = io::read_optional(&self.manifest_path).unwrap_or_else(|err| {
            tracing::debug!(path = %self.manifest_path, error = %err, "Asset manifest not captured");
            None
        });
        let lock = host.lock_data().unwrap_or_else(|err| {
            tracing::debug!(error = %err, "Host lock not captured");
            None
        });

        tracing::debug!(
            manifest = manifest.is_some(),
            lock = lock.is_some(),
            "Captured fallback snapshot"
        );
        self.snapshot = Snapshot { manifest, lock };
        Ok(())
    }

    /// Keep the current state; the snapshot is discarded.
    pub fn commit(&mut self) -> Result<()> {
        self.transition("commit", FallbackState::Captured, FallbackState::Committed)?;
        self.snapshot = Snapshot::default();
        Ok(())
    }

    /// Put the manifest back, then the host lock and installed packages.
    pub fn restore(&mut self, host: &mut dyn Host, options: &InstallOptions) -> Result<()> {
        self.transition("restore", FallbackState::Captured, FallbackState::RolledBack)?;
        let snapshot = std::mem::take(&mut self.snapshot);

        if self.fallback_asset {
            self.restore_manifest(snapshot.manifest.as_deref())?;
        }
        if self.fallback_composer {
            restore_host(host, snapshot.lock, options)?;
        }
        Ok(())
    }

    fn restore_manifest(&self, original: Option<&[u8]>) -> Result<()> {
        tracing::info!("Fallback to previous state for the Asset package");
        io::remove_path(&self.manifest_path)?;
        if let Some(bytes) = original {
            io::write_atomic(&self.manifest_path, bytes)?;
        }
        Ok(())
    }

    fn transition(&mut self, operation: &'static str, from: FallbackState, to: FallbackState) -> Result<()> {
        if self.state != from {
            return Err(Error::InvalidFallbackState {
                operation,
                state: self.state.to_string(),
            });
        }
        self.state = to;
        Ok(())
    }
}

fn restore_host(host: &mut dyn Host, lock: Option<LockData>, options: &InstallOptions) -> Result<()> {
    tracing::info!("Fallback to previous state for Composer");
    host.set_lock_data(lock)?;

    let locked = host.lock_data()?.is_some_and(|lock| lock.is_locked());
    if locked {
        let host_config = host.root_package()?.config;
        let request = InstallRequest::resolve(options, &host_config);
        tracing::debug!(args = ?request.to_args(), "Reinstalling locked host packages");
        host.install_from_lock(&request)
    } else {
        let vendor = host.vendor_dir();
        tracing::debug!(path = %vendor, "Removing vendor directory");
        io::remove_path(&vendor)?;
        Ok(())
    }
}
