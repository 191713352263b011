//! Lifecycle orchestration
//!
//! Runs the ordered startup sequence (plugin-discovery callbacks, then
//! pre-startup hooks, then startup hooks) and the shutdown hooks. Hooks of a
//! given type run strictly sequentially, in plugin registration order, each
//! awaited to completion before the next begins. There is no per-hook
//! timeout: a hung hook hangs the sequence, which keeps boot behavior
//! deterministic and debuggable.

use coral_core::{Error, Result};
use coral_plugins::{HostContext, PluginDescriptor, PRE_STARTUP, SHUTDOWN, STARTUP};
use coral_store::StoreConnection;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Oldest legacy migration version this host will boot against.
///
/// Databases carrying an older marker must complete the legacy migration
/// track out-of-band before this host can run against them.
pub const MIN_SUPPORTED_MIGRATION_VERSION: i64 = 76;

/// Runs the ordered startup and shutdown sequences
#[derive(Debug)]
pub struct LifecycleOrchestrator;

impl LifecycleOrchestrator {
    /// Check the persisted legacy-migration marker.
    ///
    /// Absence of the marker means a fresh database (or one intentionally
    /// cleaned after completing migrations) and passes. A marker below
    /// [`MIN_SUPPORTED_MIGRATION_VERSION`] blocks boot.
    pub async fn check_migration_gate(conn: &Arc<dyn StoreConnection>) -> Result<()> {
        let marker = conn
            .find_one("Migrations", &json!({ "_id": "control" }))
            .await?;

        let Some(marker) = marker else {
            debug!("No legacy migration marker found; nothing to check");
            return Ok(());
        };

        if let Some(version) = marker.get("version").and_then(|v| v.as_i64()) {
            if version < MIN_SUPPORTED_MIGRATION_VERSION {
                return Err(Error::MigrationGate(format!(
                    "detected a legacy migration version ({version}) below {MIN_SUPPORTED_MIGRATION_VERSION}. \
                     Complete the legacy migration track before starting this version of the host."
                )));
            }
        }

        Ok(())
    }

    /// Run the startup sequence against the frozen context.
    ///
    /// Plugin-discovery callbacks run first, synchronously, each receiving
    /// every registered descriptor so one plugin can inspect another's
    /// declared configuration before any async startup work begins. A failing
    /// pre-startup or startup hook aborts the remaining hooks and propagates:
    /// a broken plugin must not silently run in a partially-initialized state.
    pub async fn run_startup(
        ctx: &Arc<HostContext>,
        descriptors: &[PluginDescriptor],
    ) -> Result<()> {
        let handlers = ctx.functions().plugin_handlers()?;
        for (name, plugin, func) in &handlers {
            debug!(handler = %name, plugin = %plugin, "Running plugin-discovery handler");
            for descriptor in descriptors {
                func(descriptor);
            }
        }

        Self::run_hooks(ctx, PRE_STARTUP, "pre-startup").await?;
        Self::run_hooks(ctx, STARTUP, "startup").await?;
        Ok(())
    }

    /// Run shutdown hooks, best-effort.
    ///
    /// A failing shutdown hook is logged and does not stop the remaining
    /// hooks; the caller always proceeds to disconnect.
    pub async fn run_shutdown(ctx: &Arc<HostContext>) {
        let hooks = match ctx.functions().hooks(SHUTDOWN) {
            Ok(hooks) => hooks,
            Err(error) => {
                error!(%error, "Skipping malformed shutdown functions");
                return;
            }
        };

        for entry in hooks {
            info!(hook = %entry.name, plugin = %entry.plugin, "Running shutdown function");
            let started = Instant::now();
            match (entry.func)(Arc::clone(ctx)).await {
                Ok(()) => info!(
                    hook = %entry.name,
                    plugin = %entry.plugin,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Shutdown function finished"
                ),
                Err(error) => error!(
                    hook = %entry.name,
                    plugin = %entry.plugin,
                    %error,
                    "Shutdown function failed; continuing with the remaining shutdown steps"
                ),
            }
        }
    }

    async fn run_hooks(ctx: &Arc<HostContext>, ty: &str, label: &str) -> Result<()> {
        for entry in ctx.functions().hooks(ty)? {
            info!(hook = %entry.name, plugin = %entry.plugin, "Running {} function", label);
            let started = Instant::now();
            (entry.func)(Arc::clone(ctx))
                .await
                .map_err(|source| Error::hook(&entry.plugin, &entry.name, source))?;
            info!(
                hook = %entry.name,
                plugin = %entry.plugin,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "{} function finished",
                label
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coral_store::memory::MemoryConnection;

    fn conn() -> Arc<dyn StoreConnection> {
        Arc::new(MemoryConnection::new())
    }

    #[tokio::test]
    async fn test_gate_passes_without_marker() {
        let conn = conn();
        LifecycleOrchestrator::check_migration_gate(&conn)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_gate_blocks_old_marker() {
        let conn = conn();
        conn.insert_one("Migrations", json!({ "_id": "control", "version": 50 }))
            .await
            .unwrap();

        let err = LifecycleOrchestrator::check_migration_gate(&conn)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MigrationGate(_)));
        assert!(err.to_string().contains("50"));
    }

    #[tokio::test]
    async fn test_gate_passes_recent_marker() {
        let conn = conn();
        conn.insert_one("Migrations", json!({ "_id": "control", "version": 80 }))
            .await
            .unwrap();

        LifecycleOrchestrator::check_migration_gate(&conn)
            .await
            .unwrap();
    }
}
