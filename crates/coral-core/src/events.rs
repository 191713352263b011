//! Application event bus
//!
//! Named async events shared between the host and plugins. Handlers run
//! sequentially, in registration order. Once stopped, emits are ignored;
//! the host stops the bus during shutdown, after shutdown hooks and before
//! the store disconnects, because handlers lose store access at that point.

use crate::types::BoxFuture;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

/// Async event handler
pub type EventHandlerFn = Arc<dyn Fn(Value) -> BoxFuture<anyhow::Result<()>> + Send + Sync>;

#[derive(Default)]
struct Inner {
    handlers: RwLock<HashMap<String, Vec<EventHandlerFn>>>,
    stopped: AtomicBool,
}

/// Clonable handle to the host's event bus
#[derive(Clone, Default)]
pub struct AppEvents {
    inner: Arc<Inner>,
}

impl AppEvents {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `event`
    pub fn on<F, Fut>(&self, event: impl Into<String>, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler: EventHandlerFn = Arc::new(move |payload| Box::pin(handler(payload)));
        self.inner
            .handlers
            .write()
            .entry(event.into())
            .or_default()
            .push(handler);
    }

    /// Emit `event`, awaiting each handler in registration order.
    ///
    /// Handler failures are logged and do not stop later handlers. Emits on a
    /// stopped bus are ignored.
    pub async fn emit(&self, event: &str, payload: Value) {
        if self.inner.stopped.load(Ordering::SeqCst) {
            debug!(event, "Event bus is stopped; emit ignored");
            return;
        }

        let handlers = {
            let map = self.inner.handlers.read();
            map.get(event).cloned().unwrap_or_default()
        };

        for handler in handlers {
            if let Err(err) = handler(payload.clone()).await {
                error!(event, error = %err, "Event handler failed");
            }
        }
    }

    /// Stop the bus; further emits are ignored and handlers are dropped
    pub fn stop(&self) {
        if !self.inner.stopped.swap(true, Ordering::SeqCst) {
            self.inner.handlers.write().clear();
            debug!("Event bus stopped");
        }
    }

    /// Whether the bus has been stopped
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for AppEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppEvents")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
