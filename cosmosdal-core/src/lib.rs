//! A typed data access layer over a database → collection → document store.
//!
//! This crate is the core of the cosmosdal project and provides:
//!
//! - **Resource links** ([`link`]) - Deterministic hierarchical addresses for databases, collections and documents
//! - **Resource models** ([`model`]) - Typed wrappers exposing a stable identity over opaque store records
//! - **Store client abstraction** ([`client`]) - Traits a store client implements to back the managers
//! - **Options and wire shapes** ([`options`]) - Collection policies, query specifications and request/feed options
//! - **Query pagination** ([`cursor`]) - Deferred, block-wise iteration over query and feed results
//! - **Managers** ([`manager`]) - CRUD and query facades for each resource level
//! - **Error handling** ([`error`]) - Store failures and the per-level error taxonomy
//! - **Scoped acquisition** ([`disposable`]) - Release a manager on every exit path
//!
//! # Example
//!
//! ```ignore
//! use cosmosdal_core::manager::{DatabaseManager, CollectionManager, DocumentManager};
//! use cosmosdal_core::options::{CollectionOptions, QueryOptions, QuerySpec};
//! use serde_json::json;
//!
//! let databases = DatabaseManager::new(&client);
//! databases.create("my_db").await?;
//!
//! let collections = CollectionManager::new(&client);
//! collections
//!     .create("orders", "my_db", CollectionOptions::new().with_partition_key(["/id"]))
//!     .await?;
//!
//! let documents = DocumentManager::new(&client);
//! documents.upsert(&json!({ "id": "doc-001", "owner_id": "user-123" }), "orders", "my_db").await?;
//!
//! let mut results = documents.query_documents(
//!     "orders",
//!     "my_db",
//!     QuerySpec::new("SELECT * FROM r WHERE r.owner_id=@owner").with_parameter("@owner", "user-123"),
//!     QueryOptions::new().enable_cross_partition_query(),
//! );
//! let page = results.fetch_next().await?;
//! ```

pub mod client;
pub mod cursor;
pub mod disposable;
pub mod error;
pub mod link;
pub mod manager;
pub mod model;
pub mod options;
