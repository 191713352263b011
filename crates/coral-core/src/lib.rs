//! # Coral Core
//!
//! Core types, traits, and error handling for the Coral application host.
//!
//! This crate provides the foundational abstractions used throughout the host:
//! - Error types and the shared [`Result`] alias
//! - The HTTP [`Middleware`] chain plugins contribute entries to
//! - The [`AppEvents`] bus threaded through the shared context
//! - URL helpers for computing public endpoint URLs

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod error;
pub mod events;
pub mod middleware;
pub mod types;
pub mod urls;

pub use error::{Error, Result};
pub use events::{AppEvents, EventHandlerFn};
pub use middleware::{Body, Middleware, Next};
pub use types::BoxFuture;
pub use urls::{absolute_url, normalize_root_url};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::events::AppEvents;
    pub use crate::middleware::{Body, Middleware, Next};
    pub use crate::types::BoxFuture;
    pub use crate::urls::absolute_url;
}
