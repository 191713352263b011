//! Typed lifecycle function registry
//!
//! Plugins register named functions under free-form type tags. Well-known
//! tags drive the boot/shutdown sequence; anything else is retrievable by
//! other plugins through the shared context. Duplicate names within a type
//! are permitted but logged, since they make debugging harder.

use crate::context::HostContext;
use crate::descriptor::PluginDescriptor;
use coral_core::{BoxFuture, Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Functions of this type run synchronously before any async startup work,
/// receiving every registered plugin's descriptor
pub const REGISTER_PLUGIN_HANDLER: &str = "register_plugin_handler";

/// Functions of this type run before `startup`, in registration order
pub const PRE_STARTUP: &str = "pre_startup";

/// Functions of this type run during boot, in registration order
pub const STARTUP: &str = "startup";

/// Functions of this type run during shutdown, best-effort
pub const SHUTDOWN: &str = "shutdown";

/// Async lifecycle hook; receives the shared context
pub type HookFn = Arc<dyn Fn(Arc<HostContext>) -> BoxFuture<anyhow::Result<()>> + Send + Sync>;

/// Synchronous callback receiving one plugin descriptor at a time
pub type PluginHandlerFn = Arc<dyn Fn(&PluginDescriptor) + Send + Sync>;

/// The two shapes a typed function can take
#[derive(Clone)]
pub enum FunctionKind {
    /// Awaited lifecycle hook
    Hook(HookFn),
    /// Synchronous descriptor inspector
    PluginHandler(PluginHandlerFn),
}

impl fmt::Debug for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionKind::Hook(_) => f.write_str("Hook"),
            FunctionKind::PluginHandler(_) => f.write_str("PluginHandler"),
        }
    }
}

/// A named function as a plugin declares it
#[derive(Clone)]
pub struct NamedFunction {
    /// Function name, used in logs and duplicate detection
    pub name: String,
    /// What the function is
    pub kind: FunctionKind,
}

impl NamedFunction {
    /// Create an async hook
    pub fn hook<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Arc<HostContext>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            kind: FunctionKind::Hook(Arc::new(move |ctx| Box::pin(f(ctx)))),
        }
    }

    /// Create a synchronous plugin-descriptor handler
    pub fn plugin_handler<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&PluginDescriptor) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind: FunctionKind::PluginHandler(Arc::new(f)),
        }
    }
}

impl fmt::Debug for NamedFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedFunction")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

/// A registered function stamped with its owning plugin
#[derive(Clone, Debug)]
pub struct RegisteredFunction {
    /// Function name
    pub name: String,
    /// Owning plugin name
    pub plugin: String,
    /// The function itself
    pub kind: FunctionKind,
}

/// An async hook extracted for execution
#[derive(Clone)]
pub struct HookEntry {
    /// Function name
    pub name: String,
    /// Owning plugin name
    pub plugin: String,
    /// The hook
    pub func: HookFn,
}

impl fmt::Debug for HookEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookEntry")
            .field("name", &self.name)
            .field("plugin", &self.plugin)
            .finish()
    }
}

/// Ordered registry of typed functions, appended in plugin registration order
#[derive(Clone, Debug, Default)]
pub struct FunctionsByType {
    by_type: HashMap<String, Vec<RegisteredFunction>>,
}

impl FunctionsByType {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `function` under `ty`, stamped with `plugin`.
    ///
    /// A function with the same type and name registered by another plugin is
    /// allowed but logged, naming both plugins; both remain callable.
    pub fn register(&mut self, ty: &str, plugin: &str, function: NamedFunction) {
        let entries = self.by_type.entry(ty.to_string()).or_default();

        if let Some(existing) = entries
            .iter()
            .find(|f| f.name == function.name && f.plugin != plugin)
        {
            warn!(
                r#type = %ty,
                function = %function.name,
                plugin = %plugin,
                already_registered_by = %existing.plugin,
                "A function of this type and name is already registered. \
                 Choose a unique and descriptive name for every typed function to help with debugging."
            );
        }

        entries.push(RegisteredFunction {
            name: function.name,
            plugin: plugin.to_string(),
            kind: function.kind,
        });
    }

    /// All functions registered under `ty`, in registration order
    pub fn of_type(&self, ty: &str) -> &[RegisteredFunction] {
        self.by_type.get(ty).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The async hooks registered under `ty`.
    ///
    /// A synchronous handler registered under an awaited type is a plugin
    /// programming error and fails here rather than at call time.
    pub fn hooks(&self, ty: &str) -> Result<Vec<HookEntry>> {
        self.of_type(ty)
            .iter()
            .map(|entry| match &entry.kind {
                FunctionKind::Hook(func) => Ok(HookEntry {
                    name: entry.name.clone(),
                    plugin: entry.plugin.clone(),
                    func: Arc::clone(func),
                }),
                FunctionKind::PluginHandler(_) => Err(Error::config(format!(
                    "plugin \"{}\" registered \"{}\" under type \"{ty}\", which must be an async hook",
                    entry.plugin, entry.name
                ))),
            })
            .collect()
    }

    /// The synchronous plugin handlers registered under [`REGISTER_PLUGIN_HANDLER`]
    pub fn plugin_handlers(&self) -> Result<Vec<(String, String, PluginHandlerFn)>> {
        self.of_type(REGISTER_PLUGIN_HANDLER)
            .iter()
            .map(|entry| match &entry.kind {
                FunctionKind::PluginHandler(func) => Ok((
                    entry.name.clone(),
                    entry.plugin.clone(),
                    Arc::clone(func),
                )),
                FunctionKind::Hook(_) => Err(Error::config(format!(
                    "plugin \"{}\" registered \"{}\" as a {REGISTER_PLUGIN_HANDLER} function, \
                     but it is not a synchronous plugin handler",
                    entry.plugin, entry.name
                ))),
            })
            .collect()
    }
}
