//! # Coral Configuration
//!
//! Boundary configuration for the Coral host:
//! - Typed [`HostConfig`] with serde defaults
//! - Environment variable overrides (the host is env-configured)
//! - Programmatic [`ConfigBuilder`]
//! - Validation

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod builder;
pub mod types;

pub use builder::ConfigBuilder;
pub use types::{HostConfig, RetryConfig};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::builder::ConfigBuilder;
    pub use crate::types::{HostConfig, RetryConfig};
}
