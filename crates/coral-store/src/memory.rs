//! In-memory store backend
//!
//! Fast, zero external services, single-process only. Used for embedding the
//! host in tests and for development without a real backing store.

use crate::client::{Document, IndexSpec, StoreConnection, StoreDriver};
use coral_core::{Error, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// In-memory store driver
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    shared: Option<Arc<MemoryConnection>>,
}

impl MemoryStore {
    /// Create a new in-memory driver; every connect yields a fresh empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Share one connection across connects, letting callers seed documents
    /// before the host boots against it
    pub fn with_connection(conn: Arc<MemoryConnection>) -> Self {
        Self { shared: Some(conn) }
    }
}

#[async_trait]
impl StoreDriver for MemoryStore {
    async fn connect(&self, url: &str) -> Result<Arc<dyn StoreConnection>> {
        debug!(url, "Memory store connected");
        match &self.shared {
            Some(conn) => {
                let conn: Arc<dyn StoreConnection> = conn.clone();
                Ok(conn)
            }
            None => Ok(Arc::new(MemoryConnection::new())),
        }
    }

    async fn init_cluster(&self, url: &str) -> Result<()> {
        trace!(url, "Memory store has no cluster to initialize");
        Ok(())
    }
}

/// A live in-memory connection
#[derive(Debug, Default)]
pub struct MemoryConnection {
    collections: DashMap<String, DashMap<String, Document>>,
    indexes: DashMap<String, Vec<IndexSpec>>,
    closed: AtomicBool,
}

impl MemoryConnection {
    /// Create an empty connection
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::store("connection is closed"));
        }
        Ok(())
    }

    fn doc_id(doc: &mut Document) -> String {
        if let Some(id) = doc.get("_id").and_then(|v| v.as_str()) {
            return id.to_string();
        }
        let id = uuid::Uuid::new_v4().to_string();
        if let Some(map) = doc.as_object_mut() {
            map.insert("_id".to_string(), serde_json::Value::String(id.clone()));
        }
        id
    }
}

/// Top-level field equality; an empty filter matches every document.
fn matches(doc: &Document, filter: &Document) -> bool {
    match filter.as_object() {
        Some(fields) => fields
            .iter()
            .all(|(key, expected)| doc.get(key) == Some(expected)),
        None => true,
    }
}

#[async_trait]
impl StoreConnection for MemoryConnection {
    async fn insert_one(&self, collection: &str, mut doc: Document) -> Result<Document> {
        self.ensure_open()?;
        trace!(collection, "Memory INSERT");

        if !doc.is_object() {
            return Err(Error::store("documents must be JSON objects"));
        }
        let id = Self::doc_id(&mut doc);
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(id, doc.clone());
        Ok(doc)
    }

    async fn find_one(&self, collection: &str, filter: &Document) -> Result<Option<Document>> {
        self.ensure_open()?;
        trace!(collection, "Memory FIND_ONE");

        let Some(docs) = self.collections.get(collection) else {
            return Ok(None);
        };
        let result = docs
            .iter()
            .find(|entry| matches(entry.value(), filter))
            .map(|entry| entry.value().clone());
        Ok(result)
    }

    async fn find(&self, collection: &str, filter: &Document) -> Result<Vec<Document>> {
        self.ensure_open()?;
        trace!(collection, "Memory FIND");

        let Some(docs) = self.collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(docs
            .iter()
            .filter(|entry| matches(entry.value(), filter))
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Document,
        update: Document,
    ) -> Result<bool> {
        self.ensure_open()?;
        trace!(collection, "Memory UPDATE_ONE");

        let Some(docs) = self.collections.get(collection) else {
            return Ok(false);
        };
        let target = docs
            .iter()
            .find(|entry| matches(entry.value(), filter))
            .map(|entry| entry.key().clone());

        let Some(id) = target else {
            return Ok(false);
        };
        if let Some(mut doc) = docs.get_mut(&id) {
            if let (Some(doc_map), Some(update_map)) = (doc.as_object_mut(), update.as_object()) {
                for (key, value) in update_map {
                    if key != "_id" {
                        doc_map.insert(key.clone(), value.clone());
                    }
                }
            }
            return Ok(true);
        }
        Ok(false)
    }

    async fn delete_one(&self, collection: &str, filter: &Document) -> Result<bool> {
        self.ensure_open()?;
        trace!(collection, "Memory DELETE_ONE");

        let Some(docs) = self.collections.get(collection) else {
            return Ok(false);
        };
        let target = docs
            .iter()
            .find(|entry| matches(entry.value(), filter))
            .map(|entry| entry.key().clone());

        match target {
            Some(id) => Ok(docs.remove(&id).is_some()),
            None => Ok(false),
        }
    }

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<()> {
        self.ensure_open()?;
        trace!(
            collection,
            index = %index.effective_name(),
            "Memory CREATE_INDEX"
        );

        let mut indexes = self.indexes.entry(collection.to_string()).or_default();
        let name = index.effective_name();
        if !indexes.iter().any(|ix| ix.effective_name() == name) {
            indexes.push(index.clone());
        }
        Ok(())
    }

    async fn list_indexes(&self, collection: &str) -> Result<Vec<IndexSpec>> {
        self.ensure_open()?;
        Ok(self
            .indexes
            .get(collection)
            .map(|ixs| ixs.value().clone())
            .unwrap_or_default())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            trace!("Memory connection already closed");
        } else {
            debug!("Memory connection closed");
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
