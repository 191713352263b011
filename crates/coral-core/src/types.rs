//! Shared type aliases

use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by async plugin-supplied functions
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;
