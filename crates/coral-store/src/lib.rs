//! # Coral Store
//!
//! Store connection and collection lifecycle management:
//! - [`StoreDriver`]/[`StoreConnection`]: the pluggable backing-store seam
//! - [`MemoryStore`]: in-memory backend for embedding and tests
//! - [`ConnectionManager`]: connect-with-retry, best-effort cluster init,
//!   idempotent disconnect
//! - [`CollectionRegistry`]: allocates one handle per plugin-declared
//!   collection key and provisions secondary indexes

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod client;
pub mod collections;
pub mod connection;
pub mod memory;

pub use client::{Collection, Document, IndexOrder, IndexSpec, StoreConnection, StoreDriver};
pub use collections::{CollectionRegistry, CollectionSpec};
pub use connection::{ConnectionManager, ConnectionState};
pub use memory::{MemoryConnection, MemoryStore};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::client::{Collection, Document, IndexSpec, StoreConnection, StoreDriver};
    pub use crate::collections::{CollectionRegistry, CollectionSpec};
    pub use crate::connection::{ConnectionManager, ConnectionState};
    pub use crate::memory::MemoryStore;
}
