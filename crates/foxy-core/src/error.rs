//! Error types for foxy-core

use std::path::PathBuf;

/// Result type for foxy-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in foxy-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed configuration value, e.g. invalid JSON in an environment variable
    #[error("Invalid configuration for {key}: {message}")]
    Configuration { key: String, message: String },

    /// Activation pattern that cannot be compiled
    #[error("Invalid package pattern \"{pattern}\": {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Version constraint that cannot be parsed
    #[error("Invalid version constraint \"{constraint}\": {reason}")]
    InvalidConstraint { constraint: String, reason: String },

    /// The asset manager binary did not report a version
    #[error("The binary of \"{manager}\" must be installed")]
    ToolMissing { manager: String },

    /// The installed asset manager does not satisfy the configured constraint
    #[error(
        "The installed {manager} version \"{version}\" doesn't match with the constraint version \"{constraint}\""
    )]
    VersionMismatch {
        manager: String,
        version: String,
        constraint: String,
    },

    /// The configured asset manager has no adapter
    #[error("The asset manager \"{manager}\" doesn't exist")]
    ManagerNotFound { manager: String },

    /// Auto-detection found no usable asset manager
    #[error("No asset manager is found")]
    NoManagerAvailable,

    /// The asset manager exited with a non-zero code
    #[error("The asset manager ended with an error ({manager} exited with code {exit_code})")]
    InstallFailure { manager: String, exit_code: i32 },

    /// Fallback operation called in the wrong state
    #[error("Invalid fallback transition: cannot {operation} while {state}")]
    InvalidFallbackState {
        operation: &'static str,
        state: String,
    },

    /// Error reported by the host package manager
    #[error("Host error: {message}")]
    Host { message: String },

    /// A required file is missing
    #[error("File not found: {path}")]
    NotFound { path: PathBuf },

    // Transparent wrappers for underlying crate errors
    /// Filesystem error from foxy-fs
    #[error(transparent)]
    Fs(#[from] foxy_fs::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn host(message: impl Into<String>) -> Self {
        Self::Host {
            message: message.into(),
        }
    }
}
