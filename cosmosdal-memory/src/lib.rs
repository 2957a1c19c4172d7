//! In-memory store client for cosmosdal.
//!
//! This crate provides [`InMemoryStore`], a thread-safe implementation of the
//! [`StoreClient`](cosmosdal_core::client::StoreClient) trait that emulates the document store
//! without a network. It is meant for development and tests.
//!
//! # Features
//!
//! - **Store status codes** - Conflicts, missing resources and rejected requests fail with 409, 404 and 400
//! - **Partitioned collections** - Partition key extraction, per-partition point reads and cross-partition query gating
//! - **Unique keys** - Enforced within a partition on every upsert
//! - **SQL subset** - `SELECT`, `TOP`, `VALUE`, `WHERE`, `ORDER BY`, `EXISTS` subqueries and common built-in functions
//! - **Paging** - Results are planned on the first fetch and served in `maxItemCount` blocks
//!
//! # Quick Start
//!
//! ```ignore
//! use cosmosdal_core::{client::StoreClientBuilder, manager::DatabaseManager};
//! use cosmosdal_memory::InMemoryStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = InMemoryStore::builder().build().await?;
//!
//!     DatabaseManager::new(&store).create("my_db").await?;
//!
//!     Ok(())
//! }
//! ```

mod address;
mod cursor;
mod evaluator;
mod sql;
pub mod store;

pub use sql::QueryError;
pub use store::{InMemoryStore, InMemoryStoreBuilder, MAX_THROUGHPUT, MIN_THROUGHPUT};
