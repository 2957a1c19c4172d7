use futures::stream::BoxStream;
use tracing::debug;

use crate::{
    client::StoreClient,
    cursor::QueryResults,
    error::{CollectionError, CollectionResult, StoreError},
    link::{collection_link, database_link},
    model::{Collection, Resource},
    options::{CollectionOptions, FeedOptions, QuerySpec},
};

const TARGET: &str = "cosmosdal::collection";

fn translate(link: &str, err: StoreError) -> CollectionError {
    debug!(target: TARGET, %link, status_code = err.status_code, message = %err.message, "store fault");
    err.into()
}

/// Creates, deletes, lists and looks up the collections of a database.
///
/// Every failure is reported as a [`CollectionError`], whatever its status code.
#[derive(Debug)]
pub struct CollectionManager<'a, C: StoreClient + ?Sized> {
    client: &'a C,
}

impl<'a, C: StoreClient + ?Sized> CollectionManager<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Creates a collection inside a database.
    ///
    /// Unique keys, partition key and throughput in `options` are independent and may be
    /// combined. The partition key policy cannot be changed afterwards.
    ///
    /// # Errors
    ///
    /// Returns a [`CollectionError`] with status 409 if the collection already exists, 404 if the
    /// database does not exist, or 400 if the store rejects the requested throughput.
    pub async fn create(
        &self,
        collection_id: &str,
        database_id: &str,
        options: CollectionOptions,
    ) -> CollectionResult<Collection> {
        let link = collection_link(database_id, collection_id);
        debug!(
            target: TARGET,
            %link,
            partitioned = options.partition_key.is_some(),
            unique_keys = options.unique_keys.len(),
            throughput = ?options.throughput,
            "creating collection"
        );

        let native = self
            .client
            .create_collection(
                &database_link(database_id),
                options.definition(collection_id),
                options.request_options(),
            )
            .await
            .map_err(|err| translate(&link, err))?;

        Collection::from_native(native).map_err(|err| translate(&link, err))
    }

    /// Deletes a collection and its documents.
    ///
    /// # Errors
    ///
    /// Returns a [`CollectionError`] with status 404 if the collection does not exist.
    pub async fn delete(&self, collection_id: &str, database_id: &str) -> CollectionResult<()> {
        let link = collection_link(database_id, collection_id);
        debug!(target: TARGET, %link, "deleting collection");

        self.client
            .delete_collection(&link)
            .await
            .map_err(|err| translate(&link, err))
    }

    /// Reads a collection by id.
    ///
    /// # Errors
    ///
    /// Returns a [`CollectionError`] with status 404 if the collection does not exist.
    pub async fn get(&self, collection_id: &str, database_id: &str) -> CollectionResult<Collection> {
        let link = collection_link(database_id, collection_id);
        debug!(target: TARGET, %link, "reading collection");

        let native = self
            .client
            .read_collection(&link)
            .await
            .map_err(|err| translate(&link, err))?;

        Collection::from_native(native).map_err(|err| translate(&link, err))
    }

    /// Looks a collection up by id, returning `None` when no collection matches.
    pub async fn find(
        &self,
        collection_id: &str,
        database_id: &str,
    ) -> CollectionResult<Option<Collection>> {
        let link = database_link(database_id);
        debug!(target: TARGET, %link, id = collection_id, "finding collection");

        let mut results = QueryResults::<Collection>::new(self.client.query_collections(
            &link,
            QuerySpec::by_id(collection_id),
            FeedOptions::new(),
        ));

        Ok(results
            .fetch_next()
            .await
            .inspect_err(|err| {
                debug!(target: TARGET, %link, status_code = err.status_code, message = %err.message, "store fault")
            })?
            .into_iter()
            .next())
    }

    /// Lists the collections of a database.
    ///
    /// The stream is lazy; a missing database surfaces as the first item.
    pub fn list(&self, database_id: &str) -> BoxStream<'a, CollectionResult<Collection>> {
        let link = database_link(database_id);
        debug!(target: TARGET, %link, "listing collections");

        QueryResults::<Collection>::new(self.client.read_collections(&link, FeedOptions::new()))
            .into_stream()
    }
}
