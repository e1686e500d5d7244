use thiserror::Error;

/// Errors raised while loading or validating the monitor configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Session-level fetcher failures.
///
/// These are distinct from per-request outcomes: a `FetchError` means the
/// underlying session can no longer be trusted and must be recycled.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to start fetch session: {0}")]
    Startup(String),
    #[error("fetch session lost: {0}")]
    SessionLost(String),
}

/// Failures delivering a notification
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("notification rejected with status {0}")]
    Rejected(u16),
}

/// Errors that end a monitor run
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}
