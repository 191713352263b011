//! The application host
//!
//! Owns the registry, the store connection, the server, and the lifecycle
//! sequencing between them. `start` drives connect → migration gate →
//! collection registration → server assembly → startup hooks → listen;
//! `stop` drives the reverse: close → shutdown hooks → event-bus stop →
//! disconnect.

use crate::lifecycle::LifecycleOrchestrator;
use crate::server::{ApiServer, AppState};
use crate::shutdown::{ShutdownSignal, SignalHandler};
use crate::HostPhase;
use coral_config::HostConfig;
use coral_core::{AppEvents, Error, Middleware, Result};
use coral_plugins::{HostContext, PluginDescriptor, PluginRegistry};
use coral_store::{CollectionRegistry, ConnectionManager, ConnectionState, StoreDriver};
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info};

struct Inner {
    config: HostConfig,
    events: AppEvents,
    registry: RwLock<PluginRegistry>,
    connection: ConnectionManager,
    server: ApiServer,
    phase: RwLock<HostPhase>,
    context: RwLock<Option<Arc<HostContext>>>,
    shutdown: ShutdownSignal,
}

/// The application host. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct Host {
    inner: Arc<Inner>,
}

impl Host {
    /// Create a host over `driver` with the given configuration.
    ///
    /// The configuration is validated here so a malformed boundary config
    /// fails before any plugin registers.
    pub fn new(mut config: HostConfig, driver: Arc<dyn StoreDriver>) -> Result<Self> {
        config.validate()?;

        let events = AppEvents::new();
        let shutdown = ShutdownSignal::new();
        let registry = PluginRegistry::new(
            config.version.clone(),
            config.root_url.clone(),
            events.clone(),
        );
        let connection = ConnectionManager::new(driver, config.retry.clone());
        let server = ApiServer::new(config.listen_retry_delay, shutdown.clone());

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                events,
                registry: RwLock::new(registry),
                connection,
                server,
                phase: RwLock::new(HostPhase::Idle),
                context: RwLock::new(None),
                shutdown,
            }),
        })
    }

    /// Register one plugin's contributions. Fails once the host has started.
    pub fn register_plugin(&self, descriptor: PluginDescriptor) -> Result<()> {
        self.inner.registry.write().register(descriptor)?;

        let mut phase = self.inner.phase.write();
        if *phase == HostPhase::Idle {
            *phase = HostPhase::PluginsRegistered;
        }
        Ok(())
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> HostPhase {
        *self.inner.phase.read()
    }

    /// Current store connection state
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    /// The frozen shared context; `None` until `start` has assembled it
    pub fn context(&self) -> Option<Arc<HostContext>> {
        self.inner.context.read().clone()
    }

    /// The application event bus
    pub fn events(&self) -> &AppEvents {
        &self.inner.events
    }

    /// The host configuration
    pub fn config(&self) -> &HostConfig {
        &self.inner.config
    }

    /// The bound server address, when listening
    pub fn server_addr(&self) -> Option<SocketAddr> {
        self.inner.server.bound_addr()
    }

    /// Registered plugin names, in registration order
    pub fn plugin_names(&self) -> Vec<String> {
        self.inner
            .registry
            .read()
            .plugin_names()
            .into_iter()
            .map(String::from)
            .collect()
    }

    /// Start the entire host.
    ///
    /// Connects to the store, gates on the legacy migration marker, builds
    /// the collection handles, assembles the server, runs plugin startup
    /// hooks in registration order, and finally listens on the configured
    /// port (or stays unbound when no port is configured). Any failure aborts
    /// the boot; the process is expected to exit rather than continue
    /// half-started.
    pub async fn start(&self) -> Result<()> {
        {
            let phase = *self.inner.phase.read();
            if !matches!(phase, HostPhase::Idle | HostPhase::PluginsRegistered) {
                return Err(Error::runtime(format!(
                    "cannot start the host from the {phase:?} phase"
                )));
            }
        }

        if self.inner.config.handle_signals {
            self.install_termination_handling();
        }

        let config = &self.inner.config;

        let conn = self
            .inner
            .connection
            .connect(&config.store_url, config.init_cluster)
            .await?;
        *self.inner.phase.write() = HostPhase::Connected;

        LifecycleOrchestrator::check_migration_gate(&conn).await?;

        let declared = { self.inner.registry.read().declared_collections() };
        let collections = CollectionRegistry::register_all(&declared, &conn).await?;

        let (ctx, middleware, descriptors) = {
            let mut registry = self.inner.registry.write();
            registry.seal();
            registry.context_mut().set_collections(collections);

            let ctx = Arc::new(registry.context().clone());
            let middleware = registry.middleware().to_vec();
            let descriptors = registry.descriptors().to_vec();
            (ctx, middleware, descriptors)
        };
        *self.inner.context.write() = Some(Arc::clone(&ctx));

        for entry in &middleware {
            debug!(plugin = %entry.plugin, middleware = %entry.name, "Middleware installed");
        }
        let stack: Arc<[Arc<dyn Middleware>]> = middleware
            .iter()
            .map(|entry| Arc::clone(&entry.middleware))
            .collect::<Vec<_>>()
            .into();

        self.inner.server.init(AppState {
            ctx: Arc::clone(&ctx),
            middleware: stack,
            api_path: config.api_path.clone(),
            static_paths: config.serve_static_paths.clone(),
        });
        *self.inner.phase.write() = HostPhase::ServerInitialized;

        LifecycleOrchestrator::run_startup(&ctx, &descriptors).await?;

        self.inner.server.listen(config.port).await?;
        *self.inner.phase.write() = HostPhase::Started;

        if let Ok(url) = ctx.absolute_url(&config.api_path) {
            info!(url = %url, plugins = descriptors.len(), "Host started");
        }
        Ok(())
    }

    /// Stop the entire host.
    ///
    /// Stops the server, runs shutdown hooks best-effort, stops the event
    /// bus, and disconnects from the store. Safe to call more than once.
    pub async fn stop(&self) -> Result<()> {
        {
            let mut phase = self.inner.phase.write();
            if matches!(*phase, HostPhase::Stopping | HostPhase::Stopped) {
                return Ok(());
            }
            *phase = HostPhase::Stopping;
        }

        // Wake anything waiting on the shutdown signal, including a pending
        // listen retry.
        self.inner.shutdown.trigger();

        self.inner.server.close().await?;

        let ctx = self.inner.context.read().clone();
        if let Some(ctx) = ctx {
            LifecycleOrchestrator::run_shutdown(&ctx).await;
        }

        self.inner.events.stop();

        self.inner.connection.disconnect().await?;
        *self.inner.phase.write() = HostPhase::Stopped;
        info!("Host stopped");
        Ok(())
    }

    /// Listen for OS termination signals and stop the host at most once.
    fn install_termination_handling(&self) {
        tokio::spawn(SignalHandler::new(self.inner.shutdown.clone()).run());

        let host = self.clone();
        let mut shutdown_rx = self.inner.shutdown.subscribe();
        tokio::spawn(async move {
            if shutdown_rx.recv().await.is_ok() {
                info!("Stopping host...");
                if let Err(err) = host.stop().await {
                    error!(error = %err, "Error while stopping the host");
                }
            }
        });
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("phase", &self.phase())
            .field("plugins", &self.plugin_names())
            .field("connection", &self.connection_state())
            .finish()
    }
}
