//! Collection registration
//!
//! Given every plugin's declared collections, in plugin registration order,
//! allocate one handle per declared key and provision secondary indexes.
//! Keys are claimed first-writer-wins; a later claim is a configuration
//! error. Indexes within one collection provision concurrently; collections
//! are processed sequentially so an early configuration error surfaces
//! before later plugins begin expensive work.

use crate::client::{Collection, IndexSpec, StoreConnection};
use coral_core::{Error, Result};
use futures::future::try_join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// One plugin-declared collection: the storage name it maps to, plus indexes
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSpec {
    /// Storage-level collection name
    pub name: String,

    /// Secondary indexes to provision
    pub indexes: Vec<IndexSpec>,
}

impl CollectionSpec {
    /// Declare a collection stored under `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            indexes: Vec::new(),
        }
    }

    /// Add a secondary index declaration
    pub fn index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }
}

/// Allocates collection handles from plugin declarations
#[derive(Debug)]
pub struct CollectionRegistry;

impl CollectionRegistry {
    /// Register every declared collection against `conn`.
    ///
    /// `declared` carries `(plugin_name, [(collection_key, spec)])` in plugin
    /// registration order, which is the order collisions are detected in.
    pub async fn register_all(
        declared: &[(String, Vec<(String, CollectionSpec)>)],
        conn: &Arc<dyn StoreConnection>,
    ) -> Result<HashMap<String, Collection>> {
        let mut handles: HashMap<String, Collection> = HashMap::new();

        for (plugin_name, entries) in declared {
            for (key, spec) in entries {
                if spec.name.is_empty() {
                    return Err(Error::config(format!(
                        "collection \"{key}\" declared by plugin \"{plugin_name}\" needs a storage name"
                    )));
                }

                if handles.contains_key(key) {
                    return Err(Error::config(format!(
                        "plugin \"{plugin_name}\" declares a collection with key \"{key}\", \
                         but another plugin has already claimed that key"
                    )));
                }

                let collection = Collection::new(&spec.name, Arc::clone(conn));

                if !spec.indexes.is_empty() {
                    try_join_all(
                        spec.indexes
                            .iter()
                            .map(|index| conn.create_index(&spec.name, index)),
                    )
                    .await?;
                    debug!(
                        plugin = %plugin_name,
                        key = %key,
                        indexes = spec.indexes.len(),
                        "Indexes provisioned"
                    );
                }

                handles.insert(key.clone(), collection);
            }
        }

        info!(collections = handles.len(), "Collections registered");
        Ok(handles)
    }
}
