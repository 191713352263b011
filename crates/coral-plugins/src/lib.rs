//! # Coral Plugins
//!
//! Plugin registration for the Coral application host:
//! - [`PluginDescriptor`]: the capability bag one extension contributes
//! - [`HandlerMap`]: deep-merged query/mutation/resolver trees
//! - [`FunctionsByType`]: ordered, typed lifecycle function registry
//! - [`HostContext`]: the shared context passed to every hook and handler
//! - [`PluginRegistry`]: validates and merges descriptors into shared state

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod context;
pub mod descriptor;
pub mod functions;
pub mod handlers;
pub mod registry;

pub use context::HostContext;
pub use descriptor::{GraphQlCapability, MiddlewareSpec, PluginBuilder, PluginDescriptor};
pub use functions::{
    FunctionKind, FunctionsByType, HookEntry, HookFn, NamedFunction, PluginHandlerFn,
    RegisteredFunction, PRE_STARTUP, REGISTER_PLUGIN_HANDLER, SHUTDOWN, STARTUP,
};
pub use handlers::{handler, HandlerFn, HandlerMap};
pub use registry::{MiddlewareEntry, PluginRegistry};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::context::HostContext;
    pub use crate::descriptor::{PluginBuilder, PluginDescriptor};
    pub use crate::functions::{NamedFunction, PRE_STARTUP, SHUTDOWN, STARTUP};
    pub use crate::handlers::HandlerMap;
    pub use crate::registry::PluginRegistry;
}
