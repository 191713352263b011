//! Error types for the Coral host

/// Result type alias using [`Error`]
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Main error type for the Coral host
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed plugin descriptor or host configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Collision while merging a plugin's contributions into shared state
    #[error("Registration error: {0}")]
    Registration(String),

    /// Backing store unreachable after exhausting the retry policy
    #[error("Store connection error: {0}")]
    Connection(String),

    /// Store operation failed on an established connection
    #[error("Store error: {0}")]
    Store(String),

    /// A startup or pre-startup hook raised
    #[error("Hook '{hook}' of plugin '{plugin}' failed: {source}")]
    Hook {
        /// Owning plugin name
        plugin: String,
        /// Hook function name
        hook: String,
        /// The underlying failure raised by the hook
        #[source]
        source: anyhow::Error,
    },

    /// A persisted migration marker predates the supported minimum
    #[error("Migration gate: {0}")]
    MigrationGate(String),

    /// Server or lifecycle runtime error
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    /// Create a registration error
    pub fn registration(message: impl Into<String>) -> Self {
        Error::Registration(message.into())
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Error::Connection(message.into())
    }

    /// Create a store error
    pub fn store(message: impl Into<String>) -> Self {
        Error::Store(message.into())
    }

    /// Create a runtime error
    pub fn runtime(message: impl Into<String>) -> Self {
        Error::Runtime(message.into())
    }

    /// Create a hook execution error
    pub fn hook(
        plugin: impl Into<String>,
        hook: impl Into<String>,
        source: anyhow::Error,
    ) -> Self {
        Error::Hook {
            plugin: plugin.into(),
            hook: hook.into(),
            source,
        }
    }
}
