//! CRUD and query facades for each level of the hierarchy.
//!
//! A manager borrows a [`StoreClient`](crate::client::StoreClient) and performs exactly one
//! round trip per operation. Store failures are translated into the manager's own error kind:
//!
//! - [`DatabaseManager`] - databases, failing with [`DatabaseError`](crate::error::DatabaseError)
//! - [`CollectionManager`] - collections, failing with [`CollectionError`](crate::error::CollectionError)
//! - [`DocumentManager`] - documents and document queries, failing with [`DocumentError`](crate::error::DocumentError)
//!
//! Managers hold no state besides the client reference and are cheap to create per call site.

mod collection;
mod database;
mod document;
#[cfg(test)]
mod testing;

pub use collection::CollectionManager;
pub use database::DatabaseManager;
pub use document::DocumentManager;
