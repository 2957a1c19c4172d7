//! The walkthrough from the crate documentation, end to end.

use cosmosdal::{memory::InMemoryStore, prelude::*};
use futures::StreamExt;
use serde_json::json;

const DATABASE: &str = "my_db";
const COLLECTION: &str = "my_collection";

#[tokio::test]
async fn test_walkthrough() -> Result<(), CosmosDalError> {
    let store = InMemoryStore::builder()
        .with_default_page_size(10)
        .build()
        .await
        .unwrap();
    let dal = CosmosDal::new(store).disposable();

    dal.databases().create(DATABASE).await?;
    dal.collections()
        .create(
            COLLECTION,
            DATABASE,
            CollectionOptions::new()
                .with_partition_key(["/id"])
                .with_throughput(400),
        )
        .await?;

    let documents = dal.documents();
    for (id, owner_id) in [("doc-001", "user-123"), ("doc-002", "user-123"), ("doc-003", "user-789")] {
        documents
            .upsert(&json!({ "id": id, "owner_id": owner_id }), COLLECTION, DATABASE)
            .await?;
    }

    // Pinned to a single "/id" partition.
    let mut by_id = documents.query_documents(
        COLLECTION,
        DATABASE,
        QuerySpec::new("SELECT r.id FROM r WHERE r.id=@id").with_parameter("@id", "doc-001"),
        QueryOptions::new(),
    );
    let page = by_id.fetch_next().await?;
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].resource_id(), "doc-001");
    assert_eq!(page[0].get("owner_id"), None);
    assert!(by_id.fetch_next().await?.is_empty());
    assert!(by_id.is_exhausted());

    // Spans partitions, so it has to be enabled explicitly.
    let owned: Vec<Document> = documents
        .query_documents(
            COLLECTION,
            DATABASE,
            QuerySpec::new("SELECT * FROM r WHERE r.owner_id=@owner_id")
                .with_parameter("@owner_id", "user-123"),
            QueryOptions::new()
                .with_max_item_count(1)
                .enable_cross_partition_query(),
        )
        .into_stream()
        .map(|document| document.unwrap())
        .collect()
        .await;
    let ids: Vec<&str> = owned.iter().map(Resource::resource_id).collect();
    assert_eq!(ids, ["doc-001", "doc-002"]);

    documents
        .delete("doc-003", COLLECTION, DATABASE, Some("doc-003".into()))
        .await?;
    dal.collections().delete(COLLECTION, DATABASE).await?;
    dal.databases().delete(DATABASE).await?;

    assert!(dal.databases().find(DATABASE).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_disposable_layer_is_released_at_scope_end() {
    let store = InMemoryStore::new();

    {
        let dal = CosmosDal::new(store.clone()).disposable();
        dal.databases().create(DATABASE).await.unwrap();
    }

    // The store outlives the layer that wrote to it.
    let client = CosmosDal::new(store)
        .disposable()
        .scope(|dal| dal.client().clone());
    let dal = CosmosDal::new(client);
    assert!(dal.databases().find(DATABASE).await.unwrap().is_some());
}

#[tokio::test]
async fn test_builder_rejects_bad_configuration() {
    let err = InMemoryStore::builder()
        .with_default_page_size(0)
        .build()
        .await
        .unwrap_err();

    assert_eq!(err.status_code, 400);
}
