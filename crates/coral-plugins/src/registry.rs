//! Plugin registry
//!
//! Accepts plugin descriptors one at a time, before startup, and merges each
//! descriptor's capabilities into shared host state. All uniqueness checks
//! (plugin name, auth-hook names, context-addition keys) run before any
//! shared state is touched, so a rejected registration leaves earlier
//! plugins' contributions unchanged.

use crate::context::HostContext;
use crate::descriptor::{MiddlewareSpec, PluginDescriptor};
use coral_core::{AppEvents, Error, Middleware, Result};
use coral_store::CollectionSpec;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// A middleware entry stamped with its owning plugin
#[derive(Debug, Clone)]
pub struct MiddlewareEntry {
    /// Owning plugin name
    pub plugin: String,
    /// Middleware name, for logs
    pub name: String,
    /// The middleware itself
    pub middleware: Arc<dyn Middleware>,
}

/// Validates descriptors and merges their capabilities into shared state
pub struct PluginRegistry {
    descriptors: Vec<PluginDescriptor>,
    names: HashSet<String>,
    context: HostContext,
    schemas: Vec<String>,
    resolvers: crate::handlers::HandlerMap,
    middleware: Vec<MiddlewareEntry>,
    sealed: bool,
}

impl PluginRegistry {
    /// Create a registry whose merged state feeds the given context
    pub fn new(app_version: Option<String>, root_url: impl Into<String>, events: AppEvents) -> Self {
        Self {
            descriptors: Vec::new(),
            names: HashSet::new(),
            context: HostContext::new(app_version, root_url, events),
            schemas: Vec::new(),
            resolvers: crate::handlers::HandlerMap::new(),
            middleware: Vec::new(),
            sealed: false,
        }
    }

    /// Register one plugin's contributions.
    ///
    /// Callable any number of times before startup, never after. Failures are
    /// fatal to boot: they indicate a build-time programming error, not a
    /// transient condition.
    pub fn register(&mut self, descriptor: PluginDescriptor) -> Result<()> {
        if self.sealed {
            return Err(Error::registration(format!(
                "cannot register plugin \"{}\" after the host has started",
                descriptor.name
            )));
        }

        if descriptor.name.is_empty() {
            return Err(Error::config(
                "plugin configuration passed to register must have a non-empty name",
            ));
        }

        if self.names.contains(&descriptor.name) {
            return Err(Error::registration(format!(
                "multiple plugins registered with the name \"{}\"",
                descriptor.name
            )));
        }

        // Validate every uniqueness constraint before mutating shared state.
        self.check_auth_collisions(&descriptor)?;
        self.check_context_collisions(&descriptor)?;

        let name = descriptor.name.clone();

        if let Some(graphql) = &descriptor.graphql {
            self.resolvers.merge(graphql.resolvers.clone());
            self.schemas.extend(graphql.schemas.iter().cloned());
        }

        self.context.mutations_mut().merge(descriptor.mutations.clone());
        self.context.queries_mut().merge(descriptor.queries.clone());

        for (key, func) in &descriptor.auth {
            self.context.insert_auth(key.clone(), func.clone());
        }

        for (ty, function) in &descriptor.functions_by_type {
            self.context.functions_mut().register(ty, &name, function.clone());
        }

        for MiddlewareSpec { name: mw_name, middleware } in &descriptor.middleware {
            self.middleware.push(MiddlewareEntry {
                plugin: name.clone(),
                name: mw_name.clone(),
                middleware: Arc::clone(middleware),
            });
        }

        for (key, value) in &descriptor.context_additions {
            self.context.insert_extra(&name, key, value.clone())?;
        }

        self.names.insert(name.clone());
        self.descriptors.push(descriptor);
        info!(plugin = %name, "Plugin registered");
        Ok(())
    }

    fn check_auth_collisions(&self, descriptor: &PluginDescriptor) -> Result<()> {
        let mut seen = HashSet::new();
        for (key, _) in &descriptor.auth {
            if self.context.has_auth(key) || !seen.insert(key.as_str()) {
                return Err(Error::registration(format!(
                    "plugin \"{}\" tried to register the auth function \"{key}\", \
                     but another plugin already registered that type of function",
                    descriptor.name
                )));
            }
        }
        Ok(())
    }

    fn check_context_collisions(&self, descriptor: &PluginDescriptor) -> Result<()> {
        let mut seen = HashSet::new();
        for (key, _) in &descriptor.context_additions {
            if self.context.has_key(key) || !seen.insert(key.as_str()) {
                return Err(Error::registration(format!(
                    "plugin \"{}\" is trying to add the \"{key}\" key to the context, but it is already there",
                    descriptor.name
                )));
            }
        }
        Ok(())
    }

    /// Freeze the registry; later `register` calls fail
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    /// Registered descriptors, in registration order
    pub fn descriptors(&self) -> &[PluginDescriptor] {
        &self.descriptors
    }

    /// Number of registered plugins
    pub fn plugin_count(&self) -> usize {
        self.descriptors.len()
    }

    /// Registered plugin names, in registration order
    pub fn plugin_names(&self) -> Vec<&str> {
        self.descriptors.iter().map(|d| d.name.as_str()).collect()
    }

    /// Every plugin's declared collections, in registration order
    pub fn declared_collections(&self) -> Vec<(String, Vec<(String, CollectionSpec)>)> {
        self.descriptors
            .iter()
            .map(|d| (d.name.clone(), d.collections.clone()))
            .collect()
    }

    /// Appended schema fragments, in registration order
    pub fn schemas(&self) -> &[String] {
        &self.schemas
    }

    /// The merged resolver tree
    pub fn resolvers(&self) -> &crate::handlers::HandlerMap {
        &self.resolvers
    }

    /// Middleware entries, in registration order, stamped with plugin names
    pub fn middleware(&self) -> &[MiddlewareEntry] {
        &self.middleware
    }

    /// The shared context the registry merges into
    pub fn context(&self) -> &HostContext {
        &self.context
    }

    /// Mutable access for the connect phase (installing collection handles)
    pub fn context_mut(&mut self) -> &mut HostContext {
        &mut self.context
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.plugin_names())
            .field("schemas", &self.schemas.len())
            .field("middleware", &self.middleware.len())
            .field("sealed", &self.sealed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::PluginDescriptor;
    use serde_json::json;

    fn registry() -> PluginRegistry {
        PluginRegistry::new(None, "http://localhost:3000/", AppEvents::new())
    }

    #[test]
    fn test_plugins_kept_in_registration_order() {
        let mut registry = registry();
        for name in ["shops", "catalog", "orders"] {
            registry
                .register(PluginDescriptor::builder(name).build())
                .unwrap();
        }

        assert_eq!(registry.plugin_count(), 3);
        assert_eq!(registry.plugin_names(), vec!["shops", "catalog", "orders"]);
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let mut registry = registry();
        let err = registry
            .register(PluginDescriptor::builder("").build())
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_duplicate_name_is_rejected_and_first_plugin_unchanged() {
        let mut registry = registry();
        registry
            .register(
                PluginDescriptor::builder("shops")
                    .version("1.0.0")
                    .build(),
            )
            .unwrap();

        let err = registry
            .register(PluginDescriptor::builder("shops").version("2.0.0").build())
            .unwrap_err();
        assert!(matches!(err, Error::Registration(_)));

        assert_eq!(registry.plugin_count(), 1);
        assert_eq!(registry.descriptors()[0].version.as_deref(), Some("1.0.0"));
    }

    #[test]
    fn test_register_after_seal_fails() {
        let mut registry = registry();
        registry.seal();
        let err = registry
            .register(PluginDescriptor::builder("late").build())
            .unwrap_err();
        assert!(matches!(err, Error::Registration(_)));
    }

    #[tokio::test]
    async fn test_queries_and_mutations_deep_merge() {
        let mut registry = registry();
        registry
            .register(
                PluginDescriptor::builder("core")
                    .query("shop.byId", |_ctx, _| async { Ok(json!("core")) })
                    .mutation("shop.update", |_ctx, _| async { Ok(json!("core")) })
                    .build(),
            )
            .unwrap();
        registry
            .register(
                PluginDescriptor::builder("marketplace")
                    .query("shop.byId", |_ctx, _| async { Ok(json!("marketplace")) })
                    .query("marketplace.sellers", |_ctx, _| async { Ok(json!([])) })
                    .build(),
            )
            .unwrap();

        let ctx = Arc::new(registry.context().clone());
        let result = registry.context().queries().get("shop.byId").unwrap()(
            Arc::clone(&ctx),
            json!({}),
        )
        .await
        .unwrap();
        // Later-registered plugin wins the leaf.
        assert_eq!(result, json!("marketplace"));
        assert!(registry.context().queries().get("marketplace.sellers").is_some());
        assert!(registry.context().mutations().get("shop.update").is_some());
    }

    #[test]
    fn test_auth_collision_is_rejected() {
        let mut registry = registry();
        registry
            .register(
                PluginDescriptor::builder("accounts")
                    .auth_fn("accountByUserId", |_ctx, _| async { Ok(json!(null)) })
                    .build(),
            )
            .unwrap();

        let err = registry
            .register(
                PluginDescriptor::builder("sso")
                    .auth_fn("accountByUserId", |_ctx, _| async { Ok(json!(null)) })
                    .build(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Registration(_)));
        assert!(err.to_string().contains("sso"));
    }

    #[test]
    fn test_failed_registration_leaves_shared_state_untouched() {
        let mut registry = registry();
        registry
            .register(
                PluginDescriptor::builder("accounts")
                    .auth_fn("accountByUserId", |_ctx, _| async { Ok(json!(null)) })
                    .build(),
            )
            .unwrap();

        // This descriptor merges queries AND collides on auth; nothing of it
        // may survive the failed registration.
        let err = registry.register(
            PluginDescriptor::builder("sso")
                .query("sso.providers", |_ctx, _| async { Ok(json!([])) })
                .schema("type SsoProvider { id: ID! }")
                .auth_fn("accountByUserId", |_ctx, _| async { Ok(json!(null)) })
                .build(),
        );

        assert!(err.is_err());
        assert_eq!(registry.plugin_count(), 1);
        assert!(registry.context().queries().get("sso.providers").is_none());
        assert!(registry.schemas().is_empty());
    }

    #[test]
    fn test_context_addition_collision_is_rejected() {
        let mut registry = registry();
        registry
            .register(
                PluginDescriptor::builder("billing")
                    .context_value("stripe", json!({ "mode": "live" }))
                    .build(),
            )
            .unwrap();

        let err = registry
            .register(
                PluginDescriptor::builder("payments")
                    .context_value("stripe", json!({ "mode": "test" }))
                    .build(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Registration(_)));

        // The first writer's value is retained.
        assert_eq!(registry.context().extra("stripe").unwrap()["mode"], "live");
    }

    #[test]
    fn test_schemas_append_in_registration_order() {
        let mut registry = registry();
        registry
            .register(
                PluginDescriptor::builder("shops")
                    .schema("type Shop { id: ID! }")
                    .build(),
            )
            .unwrap();
        registry
            .register(
                PluginDescriptor::builder("catalog")
                    .schema("type Product { id: ID! }")
                    .build(),
            )
            .unwrap();

        assert_eq!(registry.schemas().len(), 2);
        assert!(registry.schemas()[0].contains("Shop"));
        assert!(registry.schemas()[1].contains("Product"));
    }

    #[test]
    fn test_middleware_is_stamped_with_plugin_name() {
        use async_trait::async_trait;
        use coral_core::{Body, Next};
        use http::{Request, Response};

        #[derive(Debug)]
        struct Passthrough;

        #[async_trait]
        impl Middleware for Passthrough {
            async fn call(
                &self,
                req: Request<Body>,
                next: Next,
            ) -> coral_core::Result<Response<Body>> {
                next.run(req).await
            }
        }

        let mut registry = registry();
        registry
            .register(
                PluginDescriptor::builder("audit")
                    .middleware("requestLog", Arc::new(Passthrough))
                    .build(),
            )
            .unwrap();

        let entries = registry.middleware();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].plugin, "audit");
        assert_eq!(entries[0].name, "requestLog");
    }
}
