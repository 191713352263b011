//! Plugin descriptors
//!
//! A descriptor is the bundle of capabilities one extension contributes to
//! the host at registration time. Every capability is optional; the host
//! validates and merges whatever is present. Descriptors are immutable once
//! registered.

use crate::functions::NamedFunction;
use crate::handlers::{handler, HandlerFn, HandlerMap};
use crate::HostContext;
use coral_core::Middleware;
use coral_store::CollectionSpec;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// GraphQL-style contribution: a resolver tree plus schema fragments
#[derive(Clone, Default)]
pub struct GraphQlCapability {
    /// Resolver tree, deep-merged into the shared resolver map
    pub resolvers: HandlerMap,
    /// Schema fragments, appended in registration order
    pub schemas: Vec<String>,
}

impl fmt::Debug for GraphQlCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphQlCapability")
            .field("resolvers", &self.resolvers)
            .field("schemas", &self.schemas.len())
            .finish()
    }
}

/// A named middleware contribution; stamped with the plugin name on ingestion
#[derive(Debug, Clone)]
pub struct MiddlewareSpec {
    /// Middleware name, for logs
    pub name: String,
    /// The middleware itself
    pub middleware: Arc<dyn Middleware>,
}

/// The bundle of capabilities one plugin contributes to the host
#[derive(Clone, Default)]
pub struct PluginDescriptor {
    /// Globally unique plugin name; the identity key
    pub name: String,
    /// Plugin version string, for operator display
    pub version: Option<String>,
    /// Declared collections: `(collection key, spec)`
    pub collections: Vec<(String, CollectionSpec)>,
    /// GraphQL-style contribution
    pub graphql: Option<GraphQlCapability>,
    /// Mutation handlers, deep-merged
    pub mutations: HandlerMap,
    /// Query handlers, deep-merged
    pub queries: HandlerMap,
    /// Auth functions by hook name; names must be unique across plugins
    pub auth: Vec<(String, HandlerFn)>,
    /// Typed functions: `(type tag, function)`
    pub functions_by_type: Vec<(String, NamedFunction)>,
    /// HTTP middleware, applied in registration order
    pub middleware: Vec<MiddlewareSpec>,
    /// Values added to the shared context; keys must not shadow existing ones
    pub context_additions: Vec<(String, Value)>,
}

impl PluginDescriptor {
    /// Start building a descriptor for the plugin `name`
    pub fn builder(name: impl Into<String>) -> PluginBuilder {
        PluginBuilder {
            descriptor: PluginDescriptor {
                name: name.into(),
                ..Default::default()
            },
        }
    }
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("collections", &self.collections.len())
            .field("mutations", &self.mutations)
            .field("queries", &self.queries)
            .field("auth", &self.auth.len())
            .field("functions_by_type", &self.functions_by_type.len())
            .field("middleware", &self.middleware.len())
            .field("context_additions", &self.context_additions.len())
            .finish()
    }
}

/// Builder for [`PluginDescriptor`]
#[derive(Debug)]
pub struct PluginBuilder {
    descriptor: PluginDescriptor,
}

impl PluginBuilder {
    /// Set the plugin version string
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.descriptor.version = Some(version.into());
        self
    }

    /// Declare a collection under `key`
    pub fn collection(mut self, key: impl Into<String>, spec: CollectionSpec) -> Self {
        self.descriptor.collections.push((key.into(), spec));
        self
    }

    /// Contribute a schema fragment
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.descriptor
            .graphql
            .get_or_insert_with(Default::default)
            .schemas
            .push(schema.into());
        self
    }

    /// Contribute a resolver under a dotted path
    pub fn resolver<F, Fut>(mut self, path: &str, f: F) -> Self
    where
        F: Fn(Arc<HostContext>, Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.descriptor
            .graphql
            .get_or_insert_with(Default::default)
            .resolvers
            .insert(path, handler(f));
        self
    }

    /// Contribute a mutation handler under a dotted path
    pub fn mutation<F, Fut>(mut self, path: &str, f: F) -> Self
    where
        F: Fn(Arc<HostContext>, Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.descriptor.mutations.insert(path, handler(f));
        self
    }

    /// Contribute a query handler under a dotted path
    pub fn query<F, Fut>(mut self, path: &str, f: F) -> Self
    where
        F: Fn(Arc<HostContext>, Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.descriptor.queries.insert(path, handler(f));
        self
    }

    /// Contribute an auth function under `hook_name`
    pub fn auth_fn<F, Fut>(mut self, hook_name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Arc<HostContext>, Value) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.descriptor.auth.push((hook_name.into(), handler(f)));
        self
    }

    /// Register a typed function
    pub fn function(mut self, ty: impl Into<String>, function: NamedFunction) -> Self {
        self.descriptor.functions_by_type.push((ty.into(), function));
        self
    }

    /// Register a `pre_startup` hook
    pub fn pre_startup<F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Arc<HostContext>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.function(crate::functions::PRE_STARTUP, NamedFunction::hook(name, f))
    }

    /// Register a `startup` hook
    pub fn startup<F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Arc<HostContext>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.function(crate::functions::STARTUP, NamedFunction::hook(name, f))
    }

    /// Register a `shutdown` hook
    pub fn shutdown<F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Arc<HostContext>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.function(crate::functions::SHUTDOWN, NamedFunction::hook(name, f))
    }

    /// Register a plugin-descriptor handler, run before async startup work
    pub fn plugin_handler<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&PluginDescriptor) + Send + Sync + 'static,
    {
        self.function(
            crate::functions::REGISTER_PLUGIN_HANDLER,
            NamedFunction::plugin_handler(name, f),
        )
    }

    /// Contribute a named middleware
    pub fn middleware(mut self, name: impl Into<String>, middleware: Arc<dyn Middleware>) -> Self {
        self.descriptor.middleware.push(MiddlewareSpec {
            name: name.into(),
            middleware,
        });
        self
    }

    /// Add a value to the shared context under `key`
    pub fn context_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.descriptor.context_additions.push((key.into(), value));
        self
    }

    /// Finish building
    pub fn build(self) -> PluginDescriptor {
        self.descriptor
    }
}
