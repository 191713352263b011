//! Middleware trait and chain utilities
//!
//! Plugins contribute middleware entries at registration time; the host
//! assembles them into one chain, in registration order, around a terminal
//! request handler.

use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use std::fmt;
use std::sync::Arc;

/// Body type alias
pub type Body = Full<Bytes>;

/// Middleware trait for request/response processing
#[async_trait]
pub trait Middleware: Send + Sync + fmt::Debug {
    /// Process a request and delegate to the rest of the chain via `next`
    async fn call(&self, req: Request<Body>, next: Next) -> Result<Response<Body>>;
}

/// Type alias for the terminal handler at the end of the chain
pub type HandlerFn = Box<
    dyn Fn(
            Request<Body>,
        )
            -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response<Body>>> + Send>>
        + Send
        + Sync,
>;

/// Represents the next middleware/handler in the chain
pub struct Next {
    stack: Arc<[Arc<dyn Middleware>]>,
    index: usize,
    terminal: Option<Arc<HandlerFn>>,
}

impl Next {
    /// Create a chain over a middleware stack with no terminal handler
    pub fn new(stack: Arc<[Arc<dyn Middleware>]>) -> Self {
        Self {
            stack,
            index: 0,
            terminal: None,
        }
    }

    /// Create a chain that falls through to `handler` after the stack
    pub fn with_handler(stack: Arc<[Arc<dyn Middleware>]>, handler: HandlerFn) -> Self {
        Self {
            stack,
            index: 0,
            terminal: Some(Arc::new(handler)),
        }
    }

    /// Run the next middleware, or the terminal handler once the stack is spent
    pub async fn run(self, req: Request<Body>) -> Result<Response<Body>> {
        if let Some(middleware) = self.stack.get(self.index) {
            let next = Self {
                stack: Arc::clone(&self.stack),
                index: self.index + 1,
                terminal: self.terminal.clone(),
            };
            middleware.call(req, next).await
        } else if let Some(handler) = self.terminal {
            handler(req).await
        } else {
            Err(Error::runtime("middleware chain completed without handler"))
        }
    }
}

impl Clone for Next {
    fn clone(&self) -> Self {
        Self {
            stack: Arc::clone(&self.stack),
            index: self.index,
            terminal: self.terminal.clone(),
        }
    }
}

impl fmt::Debug for Next {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("index", &self.index)
            .field("remaining", &(self.stack.len() - self.index))
            .finish()
    }
}
