//! # Coral Runtime
//!
//! Host runtime and lifecycle orchestration:
//! - [`Host`]: start/stop control over the whole application
//! - Lifecycle orchestration (plugin handlers, startup/shutdown hooks,
//!   migration gate)
//! - [`ApiServer`]: HTTP bind/listen/close with port-in-use recovery
//! - Graceful shutdown with signal handling

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod host;
pub mod lifecycle;
pub mod logging;
pub mod server;
pub mod shutdown;

pub use host::Host;
pub use lifecycle::{LifecycleOrchestrator, MIN_SUPPORTED_MIGRATION_VERSION};
pub use logging::init_tracing;
pub use server::ApiServer;
pub use shutdown::{ShutdownSignal, SignalHandler};

/// Host lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPhase {
    /// No plugins registered yet
    Idle,
    /// At least one plugin is registered; `start` has not been called
    PluginsRegistered,
    /// The backing store connection exists
    Connected,
    /// The server is assembled but not listening
    ServerInitialized,
    /// Startup hooks ran and the server is listening (or deliberately unbound)
    Started,
    /// `stop` is in progress
    Stopping,
    /// The host is fully stopped
    Stopped,
}

/// Re-export commonly used types
pub mod prelude {
    pub use crate::host::Host;
    pub use crate::logging::init_tracing;
    pub use crate::shutdown::{ShutdownSignal, SignalHandler};
    pub use crate::HostPhase;
}
