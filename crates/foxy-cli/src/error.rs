//! CLI error type

pub type Result<T> = std::result::Result<T, CliError>;

/// Everything a command can fail with; printed as `error: <message>`.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] foxy_core::Error),

    #[error(transparent)]
    Fs(#[from] foxy_fs::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Rendering a config value failed
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Problem with the invocation itself, e.g. no `composer.json`
    #[error("{message}")]
    User { message: String },
}

impl CliError {
    pub fn user(message: impl Into<String>) -> Self {
        Self::User {
            message: message.into(),
        }
    }
}
