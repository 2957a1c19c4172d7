use serde::Serialize;
use serde_json::to_value;
use tracing::debug;

use crate::{
    client::StoreClient,
    cursor::{DocumentQueryResults, QueryResults},
    error::{DocumentError, DocumentResult, StoreError},
    link::{collection_link, document_link},
    model::{Document, Resource},
    options::{FeedOptions, MaxItemCount, PartitionKey, QueryOptions, QuerySpec, RequestOptions},
};

const TARGET: &str = "cosmosdal::document";

fn translate(link: &str, err: StoreError) -> DocumentError {
    debug!(target: TARGET, %link, status_code = err.status_code, message = %err.message, "store fault");
    err.into()
}

/// Upserts, reads, deletes and queries the documents of a collection.
///
/// Every failure is reported as a [`DocumentError`], whatever its status code. Read feeds and
/// queries return a [`DocumentQueryResults`] handle; they are not sent to the store until the
/// handle's first [`fetch_next`](QueryResults::fetch_next).
#[derive(Debug)]
pub struct DocumentManager<'a, C: StoreClient + ?Sized> {
    client: &'a C,
}

impl<'a, C: StoreClient + ?Sized> DocumentManager<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Inserts a document, or replaces the document with the same id.
    ///
    /// `document` must serialize to an object with a string `id`. On a partitioned collection it
    /// must also carry the partition key field. Upserting the same document twice yields the
    /// same stored content.
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentError`] with status 400 if `document` does not serialize, or with the
    /// store's status if the collection is missing or the document is rejected.
    pub async fn upsert<T>(
        &self,
        document: &T,
        collection_id: &str,
        database_id: &str,
    ) -> DocumentResult<Document>
    where
        T: Serialize + ?Sized,
    {
        let link = collection_link(database_id, collection_id);
        debug!(target: TARGET, %link, "upserting document");

        let body = to_value(document).map_err(|err| translate(&link, err.into()))?;
        let native = self
            .client
            .upsert_document(&link, body)
            .await
            .map_err(|err| translate(&link, err))?;

        Document::from_native(native).map_err(|err| translate(&link, err))
    }

    /// Reads a document by id from a collection without a partition key.
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentError`] with status 404 if the document does not exist, or 400 if the
    /// collection is partitioned (use [`get_in_partition`](Self::get_in_partition)).
    pub async fn get(
        &self,
        document_id: &str,
        collection_id: &str,
        database_id: &str,
    ) -> DocumentResult<Document> {
        self.read(document_id, collection_id, database_id, RequestOptions::new())
            .await
    }

    /// Reads a document by id from a partitioned collection.
    pub async fn get_in_partition(
        &self,
        document_id: &str,
        collection_id: &str,
        database_id: &str,
        partition_key: impl Into<PartitionKey>,
    ) -> DocumentResult<Document> {
        self.read(
            document_id,
            collection_id,
            database_id,
            RequestOptions::new().with_partition_key(partition_key),
        )
        .await
    }

    async fn read(
        &self,
        document_id: &str,
        collection_id: &str,
        database_id: &str,
        options: RequestOptions,
    ) -> DocumentResult<Document> {
        let link = document_link(database_id, collection_id, document_id);
        debug!(target: TARGET, %link, partition_key = ?options.partition_key, "reading document");

        let native = self
            .client
            .read_document(&link, options)
            .await
            .map_err(|err| translate(&link, err))?;

        Document::from_native(native).map_err(|err| translate(&link, err))
    }

    /// Deletes a document by id.
    ///
    /// `partition_key` must be given, and must match the document, when the collection is
    /// partitioned.
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentError`] if the document does not exist, or if the collection is
    /// partitioned and the key is missing or wrong.
    pub async fn delete(
        &self,
        document_id: &str,
        collection_id: &str,
        database_id: &str,
        partition_key: Option<PartitionKey>,
    ) -> DocumentResult<()> {
        let link = document_link(database_id, collection_id, document_id);
        debug!(target: TARGET, %link, partition_key = ?partition_key, "deleting document");

        let options = RequestOptions {
            partition_key,
            ..RequestOptions::new()
        };

        self.client
            .delete_document(&link, options)
            .await
            .map_err(|err| translate(&link, err))
    }

    /// Reads every document of a collection, `max_item_count` documents per block.
    ///
    /// `None` (or zero) asks for unbounded blocks. Prefer a bound on large collections to avoid
    /// throttling.
    pub fn get_documents(
        &self,
        collection_id: &str,
        database_id: &str,
        max_item_count: Option<u32>,
    ) -> DocumentQueryResults<'a> {
        let link = collection_link(database_id, collection_id);
        let max_item_count = max_item_count.map_or(MaxItemCount::Unbounded, MaxItemCount::from);
        debug!(target: TARGET, %link, ?max_item_count, "reading documents");

        QueryResults::new(
            self.client
                .read_documents(&link, FeedOptions::new().with_max_item_count(max_item_count)),
        )
    }

    /// Queries the documents of a collection.
    ///
    /// The query is only described here; it is sent when the returned handle is first fetched,
    /// and that is where a rejected query (bad syntax, a cross-partition query without
    /// [`QueryOptions::enable_cross_partition_query`]) surfaces as a [`DocumentError`].
    pub fn query_documents(
        &self,
        collection_id: &str,
        database_id: &str,
        query: impl Into<QuerySpec>,
        options: QueryOptions,
    ) -> DocumentQueryResults<'a> {
        let link = collection_link(database_id, collection_id);
        let query = query.into();
        debug!(
            target: TARGET,
            %link,
            query = %query.query,
            parameters = query.parameters.len(),
            cross_partition = options.enable_cross_partition_query,
            "querying documents"
        );

        QueryResults::new(
            self.client
                .query_documents(&link, query, options.feed_options()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::testing::RecordingClient;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn test_point_operations_address_the_document_link() {
        let client = RecordingClient::default();
        let documents = DocumentManager::new(&client);

        let upserted = documents
            .upsert(&json!({ "id": "foobar", "subtotal": 419.4589 }), "orders", "my_db")
            .await
            .unwrap();
        assert_eq!(upserted.resource_id(), "foobar");

        documents.get("foobar", "orders", "my_db").await.unwrap();
        documents
            .get_in_partition("foobar", "orders", "my_db", "user-123")
            .await
            .unwrap();
        documents
            .delete("foobar", "orders", "my_db", Some("user-123".into()))
            .await
            .unwrap();
        documents.delete("foobar", "orders", "my_db", None).await.unwrap();

        assert_eq!(
            client.calls(),
            [
                r#"upsert_document dbs/my_db/colls/orders {"id":"foobar","subtotal":419.4589}"#,
                "read_document dbs/my_db/colls/orders/docs/foobar {}",
                r#"read_document dbs/my_db/colls/orders/docs/foobar {"partitionKey":"user-123"}"#,
                r#"delete_document dbs/my_db/colls/orders/docs/foobar {"partitionKey":"user-123"}"#,
                "delete_document dbs/my_db/colls/orders/docs/foobar {}",
            ]
        );
    }

    #[tokio::test]
    async fn test_unserializable_document_is_a_bad_request() {
        let client = RecordingClient::default();
        let documents = DocumentManager::new(&client);

        let mut document = BTreeMap::new();
        document.insert(vec![1u8], "keys must be strings");

        let err = documents.upsert(&document, "orders", "my_db").await.unwrap_err();
        assert_eq!(err.status_code, 400);
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_feeds_are_deferred_until_first_fetch() {
        let client = RecordingClient::failing(StoreError::bad_request(
            "Cross partition query is required but disabled.",
        ));
        let documents = DocumentManager::new(&client);

        let mut results = documents.query_documents(
            "orders",
            "my_db",
            QuerySpec::new("SELECT * FROM r WHERE r.owner_id=@owner").with_parameter("@owner", "user-456"),
            QueryOptions::new(),
        );
        assert_eq!(client.fetches(), 0);

        let err = results.fetch_next().await.unwrap_err();
        assert_eq!(err.status_code, 400);
        assert_eq!(client.fetches(), 1);
    }

    #[tokio::test]
    async fn test_feed_options_reach_the_store() {
        let client = RecordingClient::default();
        let documents = DocumentManager::new(&client);

        documents.get_documents("orders", "my_db", None);
        documents.get_documents("orders", "my_db", Some(3));
        documents.query_documents(
            "orders",
            "my_db",
            "SELECT * FROM r",
            QueryOptions::new()
                .with_max_item_count(10)
                .with_partition_key("user-123")
                .enable_cross_partition_query(),
        );

        assert_eq!(
            client.calls(),
            [
                r#"read_documents dbs/my_db/colls/orders {"maxItemCount":-1}"#,
                r#"read_documents dbs/my_db/colls/orders {"maxItemCount":3}"#,
                concat!(
                    r#"query_documents dbs/my_db/colls/orders SELECT * FROM r [] "#,
                    r#"{"maxItemCount":10,"partitionKey":"user-123","enableCrossPartitionQuery":true}"#
                ),
            ]
        );
    }
}
