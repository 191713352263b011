//! Configuration types

use coral_core::{normalize_root_url, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Host configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostConfig {
    /// Backing store connection URL
    #[serde(default = "default_store_url")]
    pub store_url: String,

    /// Attempt one-time cluster initialization on connect (best-effort)
    #[serde(default)]
    pub init_cluster: bool,

    /// Listen port; `None` means create the server but never bind
    #[serde(default = "default_port")]
    pub port: Option<u16>,

    /// Public root URL used to compute endpoint URLs
    #[serde(default = "default_root_url")]
    pub root_url: String,

    /// Path the API endpoint is mounted on
    #[serde(default = "default_api_path")]
    pub api_path: String,

    /// Directories served as static assets
    #[serde(default)]
    pub serve_static_paths: Vec<PathBuf>,

    /// Application version reported on the shared context
    #[serde(default)]
    pub version: Option<String>,

    /// Store connection retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Fixed delay between listen retries when the port is occupied
    #[serde(default = "default_listen_retry_delay", with = "humantime_serde")]
    pub listen_retry_delay: Duration,

    /// Install the OS signal handler that stops the host on termination
    #[serde(default = "default_handle_signals")]
    pub handle_signals: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            store_url: default_store_url(),
            init_cluster: false,
            port: default_port(),
            root_url: default_root_url(),
            api_path: default_api_path(),
            serve_static_paths: Vec::new(),
            version: None,
            retry: RetryConfig::default(),
            listen_retry_delay: default_listen_retry_delay(),
            handle_signals: default_handle_signals(),
        }
    }
}

impl HostConfig {
    /// Build a configuration from `CORAL_*` environment variables on top of defaults.
    ///
    /// Recognized: `CORAL_STORE_URL`, `CORAL_PORT` (empty disables binding),
    /// `CORAL_ROOT_URL`, `CORAL_INIT_CLUSTER`, `CORAL_STATIC_PATHS`
    /// (colon-separated), `CORAL_VERSION`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("CORAL_STORE_URL") {
            config.store_url = url;
        }
        if let Ok(port) = std::env::var("CORAL_PORT") {
            config.port = if port.is_empty() {
                None
            } else {
                Some(port.parse().map_err(|_| {
                    Error::config(format!("CORAL_PORT is not a valid port: \"{port}\""))
                })?)
            };
        }
        if let Ok(root) = std::env::var("CORAL_ROOT_URL") {
            config.root_url = root;
        }
        if let Ok(flag) = std::env::var("CORAL_INIT_CLUSTER") {
            config.init_cluster = matches!(flag.as_str(), "1" | "true" | "yes");
        }
        if let Ok(paths) = std::env::var("CORAL_STATIC_PATHS") {
            config.serve_static_paths = paths
                .split(':')
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .collect();
        }
        if let Ok(version) = std::env::var("CORAL_VERSION") {
            config.version = Some(version);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration, normalizing the root URL in place.
    pub fn validate(&mut self) -> Result<()> {
        if self.store_url.is_empty() {
            return Err(Error::config("store_url must not be empty"));
        }

        Url::parse(&self.root_url)
            .map_err(|e| Error::config(format!("root_url \"{}\" is invalid: {e}", self.root_url)))?;
        self.root_url = normalize_root_url(&self.root_url);

        if !self.api_path.starts_with('/') || self.api_path.len() < 2 {
            return Err(Error::config(format!(
                "api_path \"{}\" must start with '/' and name a path",
                self.api_path
            )));
        }

        if self.retry.max_attempts == 0 {
            return Err(Error::config("retry.max_attempts must be at least 1"));
        }

        if self.listen_retry_delay.is_zero() {
            return Err(Error::config("listen_retry_delay must be greater than zero"));
        }

        Ok(())
    }
}

/// Bounded exponential-backoff retry policy for store connection attempts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Total connection attempts before failing
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt; doubles each retry
    #[serde(default = "default_base_delay", with = "humantime_serde")]
    pub base_delay: Duration,

    /// Backoff cap
    #[serde(default = "default_max_delay", with = "humantime_serde")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            max_delay: default_max_delay(),
        }
    }
}

impl RetryConfig {
    /// Backoff delay before attempt `attempt` (1-based; attempt 1 has no delay).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exp = attempt.saturating_sub(2).min(16);
        let delay = self.base_delay.saturating_mul(1u32 << exp);
        delay.min(self.max_delay)
    }
}

fn default_store_url() -> String {
    "memory://local".to_string()
}

fn default_port() -> Option<u16> {
    Some(3000)
}

fn default_root_url() -> String {
    "http://localhost:3000/".to_string()
}

fn default_api_path() -> String {
    "/api".to_string()
}

fn default_listen_retry_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_handle_signals() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(10)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let mut config = HostConfig::default();
        config.validate().unwrap();
        assert_eq!(config.port, Some(3000));
        assert!(config.root_url.ends_with('/'));
    }

    #[test]
    fn test_validate_normalizes_root_url() {
        let mut config = HostConfig {
            root_url: "http://shop.example.com".to_string(),
            ..Default::default()
        };
        config.validate().unwrap();
        assert_eq!(config.root_url, "http://shop.example.com/");
    }

    #[test]
    fn test_validate_rejects_bad_root_url() {
        let mut config = HostConfig {
            root_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = HostConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backoff_is_bounded() {
        let retry = RetryConfig {
            max_attempts: 10,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(2),
        };
        assert_eq!(retry.delay_before(1), Duration::ZERO);
        assert_eq!(retry.delay_before(2), Duration::from_millis(500));
        assert_eq!(retry.delay_before(3), Duration::from_secs(1));
        assert_eq!(retry.delay_before(4), Duration::from_secs(2));
        assert_eq!(retry.delay_before(9), Duration::from_secs(2));
    }
}
