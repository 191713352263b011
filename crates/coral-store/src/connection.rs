//! Store connection lifecycle
//!
//! Owns the single backing-store connection: connect with a bounded
//! exponential-backoff retry policy, optional best-effort cluster
//! initialization, idempotent disconnect.

use crate::client::{StoreConnection, StoreDriver};
use coral_core::{Error, Result};
use coral_config::RetryConfig;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection exists
    Disconnected,
    /// A connection attempt is in flight
    Connecting,
    /// A live connection exists
    Connected,
    /// The connection is being torn down
    Disconnecting,
}

/// Manages the lifecycle of the single backing-store connection
pub struct ConnectionManager {
    driver: Arc<dyn StoreDriver>,
    retry: RetryConfig,
    state: RwLock<ConnectionState>,
    conn: RwLock<Option<Arc<dyn StoreConnection>>>,
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state())
            .finish()
    }
}

impl ConnectionManager {
    /// Create a manager over `driver` with the given retry policy
    pub fn new(driver: Arc<dyn StoreDriver>, retry: RetryConfig) -> Self {
        Self {
            driver,
            retry,
            state: RwLock::new(ConnectionState::Disconnected),
            conn: RwLock::new(None),
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// The live connection, if one exists
    pub fn connection(&self) -> Option<Arc<dyn StoreConnection>> {
        self.conn.read().clone()
    }

    /// Connect to the store at `url`.
    ///
    /// When `init_cluster` is set, a one-time cluster-initialization step runs
    /// first; its failure is logged and swallowed since the store may already
    /// be configured. Connection attempts retry with exponential backoff up to
    /// the policy's `max_attempts`, then fail with [`Error::Connection`].
    pub async fn connect(
        &self,
        url: &str,
        init_cluster: bool,
    ) -> Result<Arc<dyn StoreConnection>> {
        *self.state.write() = ConnectionState::Connecting;

        if init_cluster {
            match self.driver.init_cluster(url).await {
                Ok(()) => info!("Store cluster initialized"),
                Err(error) => warn!(
                    %error,
                    "Failed to initialize the store cluster. This may result in errors or some things not working."
                ),
            }
        }

        let max_attempts = self.retry.max_attempts;
        for attempt in 1..=max_attempts {
            let delay = self.retry.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match self.driver.connect(url).await {
                Ok(conn) => {
                    *self.conn.write() = Some(Arc::clone(&conn));
                    *self.state.write() = ConnectionState::Connected;
                    info!(attempt, "Store connected");
                    return Ok(conn);
                }
                Err(error) => {
                    warn!(attempt, max_attempts, %error, "Store connection attempt failed");
                }
            }
        }

        *self.state.write() = ConnectionState::Disconnected;
        Err(Error::connection(format!(
            "unable to reach store at \"{url}\" after {max_attempts} attempts"
        )))
    }

    /// Close the connection.
    ///
    /// Safe to call when already disconnected, and tolerant of a connection
    /// that was closed out from under the manager.
    pub async fn disconnect(&self) -> Result<()> {
        let taken = { self.conn.write().take() };

        match taken {
            None => {
                *self.state.write() = ConnectionState::Disconnected;
                Ok(())
            }
            Some(conn) => {
                *self.state.write() = ConnectionState::Disconnecting;
                if let Err(error) = conn.close().await {
                    warn!(%error, "Store connection close reported an error");
                }
                *self.state.write() = ConnectionState::Disconnected;
                info!("Store disconnected");
                Ok(())
            }
        }
    }
}
