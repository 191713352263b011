//! The shared host context
//!
//! One context value is assembled during plugin registration and the connect
//! phase, then frozen and passed as `Arc<HostContext>` into every lifecycle
//! hook and request handler. After the host reaches its started phase the
//! context is never mutated again, so no synchronization is needed.

use crate::functions::{FunctionsByType, RegisteredFunction};
use crate::handlers::{HandlerFn, HandlerMap};
use coral_core::{absolute_url, AppEvents, Error, Result};
use coral_store::Collection;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Context keys owned by the host itself; context additions may not shadow them
const RESERVED_CONTEXT_KEYS: &[&str] = &[
    "app",
    "appEvents",
    "appVersion",
    "auth",
    "collections",
    "mutations",
    "queries",
    "rootUrl",
];

/// The single shared context carrying merged capabilities and live handles
#[derive(Clone, Default)]
pub struct HostContext {
    app_version: Option<String>,
    root_url: String,
    events: AppEvents,
    auth: HashMap<String, HandlerFn>,
    mutations: HandlerMap,
    queries: HandlerMap,
    functions: FunctionsByType,
    collections: HashMap<String, Collection>,
    extras: HashMap<String, Value>,
}

impl HostContext {
    /// Create a context for an app at `root_url`
    pub fn new(app_version: Option<String>, root_url: impl Into<String>, events: AppEvents) -> Self {
        Self {
            app_version,
            root_url: root_url.into(),
            events,
            ..Default::default()
        }
    }

    /// Application version, when one was configured
    pub fn app_version(&self) -> Option<&str> {
        self.app_version.as_deref()
    }

    /// Public root URL (always slash-terminated)
    pub fn root_url(&self) -> &str {
        &self.root_url
    }

    /// Compute a public URL for `path` under the root URL
    pub fn absolute_url(&self, path: &str) -> Result<String> {
        absolute_url(&self.root_url, path)
    }

    /// The application event bus
    pub fn events(&self) -> &AppEvents {
        &self.events
    }

    /// Look up an auth function by hook name
    pub fn auth_fn(&self, name: &str) -> Option<&HandlerFn> {
        self.auth.get(name)
    }

    /// The merged mutation tree
    pub fn mutations(&self) -> &HandlerMap {
        &self.mutations
    }

    /// The merged query tree
    pub fn queries(&self) -> &HandlerMap {
        &self.queries
    }

    /// All functions registered under `ty`, in plugin registration order
    pub fn functions_of_type(&self, ty: &str) -> &[RegisteredFunction] {
        self.functions.of_type(ty)
    }

    /// The full typed-function registry
    pub fn functions(&self) -> &FunctionsByType {
        &self.functions
    }

    /// Look up a live collection handle by its plugin-declared key
    pub fn collection(&self, key: &str) -> Option<&Collection> {
        self.collections.get(key)
    }

    /// All live collection handles; empty until the store is connected
    pub fn collections(&self) -> &HashMap<String, Collection> {
        &self.collections
    }

    /// Look up a plugin-contributed context value
    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extras.get(key)
    }

    /// Whether `key` already exists on the context (host-owned or contributed)
    pub fn has_key(&self, key: &str) -> bool {
        RESERVED_CONTEXT_KEYS.contains(&key) || self.extras.contains_key(key)
    }

    /// Install the collection handles once the store connection exists
    pub fn set_collections(&mut self, collections: HashMap<String, Collection>) {
        self.collections = collections;
    }

    pub(crate) fn insert_auth(&mut self, key: String, func: HandlerFn) {
        self.auth.insert(key, func);
    }

    pub(crate) fn has_auth(&self, key: &str) -> bool {
        self.auth.contains_key(key)
    }

    pub(crate) fn mutations_mut(&mut self) -> &mut HandlerMap {
        &mut self.mutations
    }

    pub(crate) fn queries_mut(&mut self) -> &mut HandlerMap {
        &mut self.queries
    }

    pub(crate) fn functions_mut(&mut self) -> &mut FunctionsByType {
        &mut self.functions
    }

    /// Insert a plugin-contributed value; fails when the key would shadow one
    pub(crate) fn insert_extra(&mut self, plugin: &str, key: &str, value: Value) -> Result<()> {
        if self.has_key(key) {
            return Err(Error::registration(format!(
                "plugin \"{plugin}\" is trying to add the \"{key}\" key to the context, but it is already there"
            )));
        }
        self.extras.insert(key.to_string(), value);
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self::new(None, "http://localhost:3000/", AppEvents::new())
    }
}

impl fmt::Debug for HostContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostContext")
            .field("app_version", &self.app_version)
            .field("root_url", &self.root_url)
            .field("auth", &self.auth.keys().collect::<Vec<_>>())
            .field("mutations", &self.mutations)
            .field("queries", &self.queries)
            .field("collections", &self.collections.keys().collect::<Vec<_>>())
            .field("extras", &self.extras.keys().collect::<Vec<_>>())
            .finish()
    }
}
