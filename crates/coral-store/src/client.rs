//! Store driver and connection traits
//!
//! The backing store is an external collaborator. The host only assumes a
//! driver that can produce connections and a connection that can read/write
//! JSON documents and provision indexes.

use coral_core::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A stored document
pub type Document = serde_json::Value;

/// Sort order for one indexed field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexOrder {
    /// Ascending order
    Ascending,
    /// Descending order
    Descending,
}

/// A secondary index declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Indexed fields, in order
    pub keys: Vec<(String, IndexOrder)>,

    /// Reject duplicate values
    #[serde(default)]
    pub unique: bool,

    /// Explicit index name; derived from the keys when absent
    #[serde(default)]
    pub name: Option<String>,
}

impl IndexSpec {
    /// Single-field ascending index
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            keys: vec![(field.into(), IndexOrder::Ascending)],
            unique: false,
            name: None,
        }
    }

    /// Single-field descending index
    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            keys: vec![(field.into(), IndexOrder::Descending)],
            unique: false,
            name: None,
        }
    }

    /// Mark the index unique
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Give the index an explicit name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The name the store will know this index by
    pub fn effective_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self
                .keys
                .iter()
                .map(|(field, order)| {
                    let dir = match order {
                        IndexOrder::Ascending => "1",
                        IndexOrder::Descending => "-1",
                    };
                    format!("{field}_{dir}")
                })
                .collect::<Vec<_>>()
                .join("_"),
        }
    }
}

/// Produces store connections; retries inside `connect` are the caller's concern
#[async_trait]
pub trait StoreDriver: Send + Sync + 'static {
    /// Open a connection to the store at `url`
    async fn connect(&self, url: &str) -> Result<Arc<dyn StoreConnection>>;

    /// One-time cluster/replica bootstrap; callers treat failure as non-fatal
    async fn init_cluster(&self, url: &str) -> Result<()>;
}

/// A live store connection
#[async_trait]
pub trait StoreConnection: Send + Sync + 'static {
    /// Insert a document, assigning an `_id` when absent; returns the stored document
    async fn insert_one(&self, collection: &str, doc: Document) -> Result<Document>;

    /// Find the first document matching `filter` (top-level field equality)
    async fn find_one(&self, collection: &str, filter: &Document) -> Result<Option<Document>>;

    /// Find all documents matching `filter`
    async fn find(&self, collection: &str, filter: &Document) -> Result<Vec<Document>>;

    /// Merge `update`'s fields into the first matching document; true when one matched
    async fn update_one(&self, collection: &str, filter: &Document, update: Document)
        -> Result<bool>;

    /// Delete the first matching document; true when one matched
    async fn delete_one(&self, collection: &str, filter: &Document) -> Result<bool>;

    /// Provision one secondary index
    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<()>;

    /// List provisioned indexes
    async fn list_indexes(&self, collection: &str) -> Result<Vec<IndexSpec>>;

    /// Close the connection; safe to call on an already-closed connection
    async fn close(&self) -> Result<()>;

    /// Whether `close` has been called
    fn is_closed(&self) -> bool;
}

/// Named handle over one logical collection
#[derive(Clone)]
pub struct Collection {
    name: String,
    conn: Arc<dyn StoreConnection>,
}

impl Collection {
    /// Create a handle for the storage collection `name`
    pub fn new(name: impl Into<String>, conn: Arc<dyn StoreConnection>) -> Self {
        Self {
            name: name.into(),
            conn,
        }
    }

    /// Storage-level collection name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert a document
    pub async fn insert_one(&self, doc: Document) -> Result<Document> {
        self.conn.insert_one(&self.name, doc).await
    }

    /// Find the first document matching `filter`
    pub async fn find_one(&self, filter: &Document) -> Result<Option<Document>> {
        self.conn.find_one(&self.name, filter).await
    }

    /// Find all documents matching `filter`
    pub async fn find(&self, filter: &Document) -> Result<Vec<Document>> {
        self.conn.find(&self.name, filter).await
    }

    /// Merge `update` into the first matching document
    pub async fn update_one(&self, filter: &Document, update: Document) -> Result<bool> {
        self.conn.update_one(&self.name, filter, update).await
    }

    /// Delete the first matching document
    pub async fn delete_one(&self, filter: &Document) -> Result<bool> {
        self.conn.delete_one(&self.name, filter).await
    }

    /// List provisioned indexes
    pub async fn list_indexes(&self) -> Result<Vec<IndexSpec>> {
        self.conn.list_indexes(&self.name).await
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .finish()
    }
}
