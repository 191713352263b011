//! Configuration builder

use crate::types::{HostConfig, RetryConfig};
use coral_core::Result;
use std::path::PathBuf;
use std::time::Duration;

/// Builder for constructing host configuration programmatically
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: HostConfig,
}

impl ConfigBuilder {
    /// Create a new configuration builder with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backing store URL
    pub fn store_url(mut self, url: impl Into<String>) -> Self {
        self.config.store_url = url.into();
        self
    }

    /// Request best-effort cluster initialization on connect
    pub fn init_cluster(mut self, init: bool) -> Self {
        self.config.init_cluster = init;
        self
    }

    /// Set the listen port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = Some(port);
        self
    }

    /// Create the server without ever binding a port (embedding/tests)
    pub fn unbound(mut self) -> Self {
        self.config.port = None;
        self
    }

    /// Set the public root URL
    pub fn root_url(mut self, url: impl Into<String>) -> Self {
        self.config.root_url = url.into();
        self
    }

    /// Add a static asset directory
    pub fn static_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.serve_static_paths.push(path.into());
        self
    }

    /// Set the application version string
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.config.version = Some(version.into());
        self
    }

    /// Set the store connection retry policy
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Set the fixed delay between listen retries on an occupied port
    pub fn listen_retry_delay(mut self, delay: Duration) -> Self {
        self.config.listen_retry_delay = delay;
        self
    }

    /// Enable or disable the OS termination signal handler
    pub fn handle_signals(mut self, handle: bool) -> Self {
        self.config.handle_signals = handle;
        self
    }

    /// Validate and build the configuration
    pub fn build(mut self) -> Result<HostConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
