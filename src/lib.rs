// Re-export modules
pub mod acquire;
pub mod config;
pub mod error;
pub mod fetchers;
pub mod filter;
pub mod logging;
pub mod monitor;
pub mod notify;
pub mod pagination;
pub mod parsers;
pub mod results;
pub mod session;
pub mod utils;

// Re-export commonly used types for convenience
pub use config::{Backend, MonitorConfig};
pub use error::MonitorError;
pub use monitor::{Monitor, MonitorState, Step};
pub use results::{Comment, PageResult, PageStatus};

use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Builder that layers configuration sources into a ready monitor
pub struct ThreadWatch {
    config: MonitorConfig,
    start_page: Option<u32>,
    backend: Option<Backend>,
}

impl ThreadWatch {
    /// Start from built-in defaults
    pub fn new() -> Self {
        Self::with_config(MonitorConfig::default())
    }

    /// Start from an explicit configuration
    pub fn with_config(config: MonitorConfig) -> Self {
        Self {
            config,
            start_page: None,
            backend: None,
        }
    }

    /// Load configuration from a JSON file
    pub fn with_config_file(path: impl AsRef<Path>) -> Result<Self, MonitorError> {
        Ok(Self::with_config(MonitorConfig::from_file(path)?))
    }

    /// Overlay environment variables
    pub fn with_env(mut self) -> Result<Self, MonitorError> {
        self.config.apply_env()?;
        Ok(self)
    }

    /// Override the first page to watch
    pub fn with_start_page(mut self, page: Option<u32>) -> Self {
        self.start_page = page;
        self
    }

    /// Override the fetch backend
    pub fn with_backend(mut self, backend: Option<Backend>) -> Self {
        self.backend = backend;
        self
    }

    /// Effective configuration after all overrides
    pub fn config(&self) -> MonitorConfig {
        let mut config = self.config.clone();
        if let Some(page) = self.start_page {
            config.start_page = page;
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        config
    }

    /// Validate and build the monitor with its initial state
    pub fn build(
        self,
        shutdown: CancellationToken,
    ) -> Result<(Monitor, MonitorState), MonitorError> {
        let monitor = Monitor::from_config(self.config(), shutdown)?;
        let state = monitor.initial_state(None);
        Ok((monitor, state))
    }
}

impl Default for ThreadWatch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply_last() {
        let mut base = MonitorConfig::default();
        base.start_page = 5;
        let watch = ThreadWatch::with_config(base)
            .with_start_page(Some(241))
            .with_backend(Some(Backend::Http));

        let config = watch.config();
        assert_eq!(config.start_page, 241);
        assert_eq!(config.backend, Backend::Http);
    }

    #[test]
    fn test_absent_overrides_keep_config() {
        let mut base = MonitorConfig::default();
        base.start_page = 5;
        let config = ThreadWatch::with_config(base).with_start_page(None).config();
        assert_eq!(config.start_page, 5);
    }

    #[test]
    fn test_build_rejects_missing_credentials() {
        let result = ThreadWatch::new().build(CancellationToken::new());
        assert!(matches!(result, Err(MonitorError::Config(_))));
    }
}
