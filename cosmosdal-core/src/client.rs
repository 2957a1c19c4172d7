//! Store client abstraction.
//!
//! This module defines the traits a store client implements so the managers can drive it.
//! The managers never talk to the network themselves: every call goes through a
//! [`StoreClient`], addressed by the links from [`crate::link`].
//!
//! # Traits
//!
//! - [`StoreClient`]: create/read/delete/read-feed/query primitives for each resource level
//! - [`StoreCursor`]: the "fetch next block" primitive behind read feeds and queries
//! - [`StoreClientBuilder`]: factory trait for creating client instances
//!
//! # Deferred execution
//!
//! Feed and query primitives are plain (non-async) methods that only describe the request.
//! Nothing is sent to the store until the returned cursor's first
//! [`fetch_next_block`](StoreCursor::fetch_next_block), so planning failures such as a
//! rejected cross-partition query surface there.

use async_trait::async_trait;
use serde_json::Value;
use std::{fmt::Debug, sync::Arc};

use crate::{
    error::StoreResult,
    options::{CollectionDefinition, DatabaseDefinition, FeedOptions, QuerySpec, RequestOptions},
};

/// Continuation state of a read feed or query, hidden behind "fetch the next block".
#[async_trait]
pub trait StoreCursor: Send {
    /// Fetches the next block of raw records.
    ///
    /// Returns an empty vector once every record has been returned.
    async fn fetch_next_block(&mut self) -> StoreResult<Vec<Value>>;
}

/// A boxed cursor borrowed from a store client for `'a`.
pub type BoxStoreCursor<'a> = Box<dyn StoreCursor + 'a>;

/// Abstract interface of the underlying document store client.
///
/// All failures are reported as a single [`StoreError`](crate::error::StoreError) kind carrying
/// a status code and a message.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`. Whether concurrent requests are safe beyond that is
/// part of the implementation's own contract.
#[async_trait]
pub trait StoreClient: Send + Sync + Debug {
    /// Creates a database and returns its record.
    async fn create_database(&self, definition: DatabaseDefinition) -> StoreResult<Value>;

    /// Reads a database by link.
    async fn read_database(&self, database_link: &str) -> StoreResult<Value>;

    /// Deletes a database, its collections and their documents.
    async fn delete_database(&self, database_link: &str) -> StoreResult<()>;

    /// Opens a read feed over all databases.
    fn read_databases(&self, options: FeedOptions) -> BoxStoreCursor<'_>;

    /// Opens a query over all databases.
    fn query_databases(&self, query: QuerySpec, options: FeedOptions) -> BoxStoreCursor<'_>;

    /// Creates a collection inside a database and returns its record.
    async fn create_collection(
        &self,
        database_link: &str,
        definition: CollectionDefinition,
        options: RequestOptions,
    ) -> StoreResult<Value>;

    /// Reads a collection by link.
    async fn read_collection(&self, collection_link: &str) -> StoreResult<Value>;

    /// Deletes a collection and its documents.
    async fn delete_collection(&self, collection_link: &str) -> StoreResult<()>;

    /// Opens a read feed over the collections of a database.
    fn read_collections(&self, database_link: &str, options: FeedOptions) -> BoxStoreCursor<'_>;

    /// Opens a query over the collections of a database.
    fn query_collections(
        &self,
        database_link: &str,
        query: QuerySpec,
        options: FeedOptions,
    ) -> BoxStoreCursor<'_>;

    /// Inserts a document, or replaces the document with the same id, and returns its record.
    async fn upsert_document(&self, collection_link: &str, document: Value) -> StoreResult<Value>;

    /// Reads a document by link.
    async fn read_document(&self, document_link: &str, options: RequestOptions) -> StoreResult<Value>;

    /// Deletes a document by link.
    async fn delete_document(&self, document_link: &str, options: RequestOptions) -> StoreResult<()>;

    /// Opens a read feed over the documents of a collection.
    fn read_documents(&self, collection_link: &str, options: FeedOptions) -> BoxStoreCursor<'_>;

    /// Opens a query over the documents of a collection.
    fn query_documents(
        &self,
        collection_link: &str,
        query: QuerySpec,
        options: FeedOptions,
    ) -> BoxStoreCursor<'_>;
}

#[async_trait]
impl<C> StoreClient for Arc<C>
where
    C: StoreClient + ?Sized,
{
    async fn create_database(&self, definition: DatabaseDefinition) -> StoreResult<Value> {
        (**self).create_database(definition).await
    }

    async fn read_database(&self, database_link: &str) -> StoreResult<Value> {
        (**self).read_database(database_link).await
    }

    async fn delete_database(&self, database_link: &str) -> StoreResult<()> {
        (**self).delete_database(database_link).await
    }

    fn read_databases(&self, options: FeedOptions) -> BoxStoreCursor<'_> {
        (**self).read_databases(options)
    }

    fn query_databases(&self, query: QuerySpec, options: FeedOptions) -> BoxStoreCursor<'_> {
        (**self).query_databases(query, options)
    }

    async fn create_collection(
        &self,
        database_link: &str,
        definition: CollectionDefinition,
        options: RequestOptions,
    ) -> StoreResult<Value> {
        (**self)
            .create_collection(database_link, definition, options)
            .await
    }

    async fn read_collection(&self, collection_link: &str) -> StoreResult<Value> {
        (**self).read_collection(collection_link).await
    }

    async fn delete_collection(&self, collection_link: &str) -> StoreResult<()> {
        (**self).delete_collection(collection_link).await
    }

    fn read_collections(&self, database_link: &str, options: FeedOptions) -> BoxStoreCursor<'_> {
        (**self).read_collections(database_link, options)
    }

    fn query_collections(
        &self,
        database_link: &str,
        query: QuerySpec,
        options: FeedOptions,
    ) -> BoxStoreCursor<'_> {
        (**self).query_collections(database_link, query, options)
    }

    async fn upsert_document(&self, collection_link: &str, document: Value) -> StoreResult<Value> {
        (**self)
            .upsert_document(collection_link, document)
            .await
    }

    async fn read_document(&self, document_link: &str, options: RequestOptions) -> StoreResult<Value> {
        (**self)
            .read_document(document_link, options)
            .await
    }

    async fn delete_document(&self, document_link: &str, options: RequestOptions) -> StoreResult<()> {
        (**self)
            .delete_document(document_link, options)
            .await
    }

    fn read_documents(&self, collection_link: &str, options: FeedOptions) -> BoxStoreCursor<'_> {
        (**self).read_documents(collection_link, options)
    }

    fn query_documents(
        &self,
        collection_link: &str,
        query: QuerySpec,
        options: FeedOptions,
    ) -> BoxStoreCursor<'_> {
        (**self).query_documents(collection_link, query, options)
    }
}

/// Factory trait for creating store clients from configuration.
#[async_trait]
pub trait StoreClientBuilder {
    type Client: StoreClient;

    async fn build(self) -> StoreResult<Self::Client>;
}
