//! Main cosmosdal crate providing a typed data access layer over a document store.
//!
//! The store is organized as a three-level hierarchy: databases contain collections, and
//! collections contain documents. This crate re-exports the managers, models and options from
//! the sub-crates and provides [`CosmosDal`], a single entry point owning the store client.
//!
//! # Features
//!
//! - **Deterministic addressing** - Every resource is addressed by a link derived from its ids
//! - **Scoped errors** - Store failures surface as database, collection or document errors
//! - **Deferred, paged queries** - Queries run on the first fetch and return results block by block
//! - **Partitioned collections** - Partition keys, unique keys and throughput at creation time
//!
//! # Quick Start
//!
//! ```ignore
//! use cosmosdal::{prelude::*, memory::InMemoryStore};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), CosmosDalError> {
//!     let dal = CosmosDal::new(InMemoryStore::new());
//!
//!     dal.databases().create("my_db").await?;
//!     dal.collections()
//!         .create("my_collection", "my_db", CollectionOptions::new().with_partition_key(["/id"]))
//!         .await?;
//!
//!     let documents = dal.documents();
//!     documents
//!         .upsert(&json!({ "id": "doc-001", "owner_id": "user-123" }), "my_collection", "my_db")
//!         .await?;
//!
//!     // Pinned to the "/id" partition, so no cross-partition flag is needed.
//!     let mut results = documents.query_documents(
//!         "my_collection",
//!         "my_db",
//!         QuerySpec::new("SELECT r.id FROM r WHERE r.id=@id").with_parameter("@id", "doc-001"),
//!         QueryOptions::new(),
//!     );
//!     let page = results.fetch_next().await?;
//!     assert_eq!(page[0].resource_id(), "doc-001");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory store client for development and testing
//!
//! Any other client plugs in by implementing [`client::StoreClient`].

pub mod prelude;

use cosmosdal_core::{
    client::StoreClient,
    disposable::Disposable,
    manager::{CollectionManager, DatabaseManager, DocumentManager},
};

pub use cosmosdal_core::{client, cursor, disposable, error, link, manager, model, options};

// Re-export JSON types for convenience
pub use serde_json;

/// In-memory store client implementations.
pub mod memory {
    pub use cosmosdal_memory::{
        InMemoryStore, InMemoryStoreBuilder, MAX_THROUGHPUT, MIN_THROUGHPUT, QueryError,
    };
}

/// A data access layer bound to a store client.
///
/// Owns the client and hands out managers borrowing it. Managers are stateless, so creating
/// one per call site is cheap.
///
/// # Type Parameters
///
/// * `C` - The store client implementation
#[derive(Debug)]
pub struct CosmosDal<C: StoreClient> {
    client: C,
}

impl<C: StoreClient> CosmosDal<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Returns the underlying store client.
    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn into_client(self) -> C {
        self.client
    }

    /// Returns a manager for databases.
    pub fn databases(&self) -> DatabaseManager<'_, C> {
        DatabaseManager::new(&self.client)
    }

    /// Returns a manager for collections.
    pub fn collections(&self) -> CollectionManager<'_, C> {
        CollectionManager::new(&self.client)
    }

    /// Returns a manager for documents and document queries.
    pub fn documents(&self) -> DocumentManager<'_, C> {
        DocumentManager::new(&self.client)
    }

    /// Wraps the layer so it is released when the returned value goes out of scope.
    pub fn disposable(self) -> Disposable<Self> {
        Disposable::new(self)
    }
}
