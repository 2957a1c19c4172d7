mod common;

use common::{COLLECTION, DATABASE, dal_with_collection, order};
use cosmosdal::{error::status, prelude::*};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct Profile {
    id: String,
    owner_id: String,
    tags: Vec<String>,
}

fn user_fields(document: &Document) -> Vec<(String, Value)> {
    document
        .fields()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[tokio::test]
async fn test_upsert_then_get_round_trips_typed_documents() {
    let dal = dal_with_collection(CollectionOptions::new()).await;
    let profile = Profile {
        id: "doc-001".to_string(),
        owner_id: "user-123".to_string(),
        tags: vec!["red".to_string()],
    };

    let stored = dal
        .documents()
        .upsert(&profile, COLLECTION, DATABASE)
        .await
        .unwrap();
    assert_eq!(stored.resource_id(), "doc-001");
    assert_eq!(stored.self_link(), Some("dbs/my_db/colls/my_collection/docs/doc-001"));

    let read = dal.documents().get("doc-001", COLLECTION, DATABASE).await.unwrap();
    assert_eq!(read.deserialize::<Profile>().unwrap(), profile);
}

#[tokio::test]
async fn test_upsert_is_idempotent() {
    let dal = dal_with_collection(CollectionOptions::new()).await;
    let document = json!({ "id": "doc-001", "owner_id": "user-123" });

    let first = dal.documents().upsert(&document, COLLECTION, DATABASE).await.unwrap();
    let second = dal.documents().upsert(&document, COLLECTION, DATABASE).await.unwrap();

    assert_eq!(user_fields(&first), user_fields(&second));
    assert_eq!(first.native_resource().get("_rid"), second.native_resource().get("_rid"));

    let all = dal
        .documents()
        .get_documents(COLLECTION, DATABASE, None)
        .collect_all()
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn test_upsert_replaces_existing_content() {
    let dal = dal_with_collection(CollectionOptions::new()).await;
    let documents = dal.documents();

    documents
        .upsert(&json!({ "id": "doc-001", "stale": true }), COLLECTION, DATABASE)
        .await
        .unwrap();
    documents
        .upsert(&json!({ "id": "doc-001", "fresh": true }), COLLECTION, DATABASE)
        .await
        .unwrap();

    let read = documents.get("doc-001", COLLECTION, DATABASE).await.unwrap();
    assert_eq!(read.get("fresh"), Some(&json!(true)));
    assert_eq!(read.get("stale"), None);
}

#[tokio::test]
async fn test_upsert_rejects_documents_without_an_id() {
    let dal = dal_with_collection(CollectionOptions::new()).await;

    let err = dal
        .documents()
        .upsert(&json!({ "owner_id": "user-123" }), COLLECTION, DATABASE)
        .await
        .unwrap_err();
    assert_eq!(err.status_code, status::BAD_REQUEST);

    let err = dal
        .documents()
        .upsert(&42, COLLECTION, DATABASE)
        .await
        .unwrap_err();
    assert_eq!(err.status_code, status::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_and_delete_missing_documents() {
    let dal = dal_with_collection(CollectionOptions::new()).await;

    let err = dal.documents().get("nope", COLLECTION, DATABASE).await.unwrap_err();
    assert_eq!(err.status_code, status::NOT_FOUND);

    let err = dal
        .documents()
        .delete("nope", COLLECTION, DATABASE, None)
        .await
        .unwrap_err();
    assert_eq!(err.status_code, status::NOT_FOUND);
    assert!(matches!(CosmosDalError::from(err), CosmosDalError::Document(_)));
}

#[tokio::test]
async fn test_missing_collection_is_a_document_error() {
    let dal = dal_with_collection(CollectionOptions::new()).await;

    let err = dal
        .documents()
        .upsert(&json!({ "id": "doc-001" }), "nope", DATABASE)
        .await
        .unwrap_err();

    assert_eq!(err.status_code, status::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_removes_the_document() {
    let dal = dal_with_collection(CollectionOptions::new()).await;
    let documents = dal.documents();
    documents
        .upsert(&json!({ "id": "doc-001" }), COLLECTION, DATABASE)
        .await
        .unwrap();

    documents.delete("doc-001", COLLECTION, DATABASE, None).await.unwrap();

    let err = documents.get("doc-001", COLLECTION, DATABASE).await.unwrap_err();
    assert_eq!(err.status_code, status::NOT_FOUND);
}

#[tokio::test]
async fn test_max_item_count_bounds_each_block() {
    let dal = dal_with_collection(CollectionOptions::new()).await;
    for n in 0..10 {
        dal.documents()
            .upsert(&json!({ "id": format!("doc-{n:02}"), "kind": "match" }), COLLECTION, DATABASE)
            .await
            .unwrap();
    }

    let mut results = dal.documents().query_documents(
        COLLECTION,
        DATABASE,
        QuerySpec::new("SELECT * FROM r WHERE r.kind=@kind").with_parameter("@kind", "match"),
        QueryOptions::new().with_max_item_count(3),
    );
    assert_eq!(results.state(), CursorState::Fresh);

    let first = results.fetch_next().await.unwrap();
    assert_eq!(first.len(), 3);
    assert_eq!(results.state(), CursorState::Active);

    let mut sizes = vec![first.len()];
    loop {
        let block = results.fetch_next().await.unwrap();
        if block.is_empty() {
            break;
        }
        sizes.push(block.len());
    }

    assert_eq!(sizes, [3, 3, 3, 1]);
    assert!(results.is_exhausted());
    assert!(results.fetch_next().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_get_documents_reads_every_document() {
    let dal = dal_with_collection(CollectionOptions::new()).await;
    for n in 0..5 {
        dal.documents()
            .upsert(&json!({ "id": format!("doc-{n}") }), COLLECTION, DATABASE)
            .await
            .unwrap();
    }

    let mut unbounded = dal.documents().get_documents(COLLECTION, DATABASE, None);
    assert_eq!(unbounded.fetch_next().await.unwrap().len(), 5);

    let mut bounded = dal.documents().get_documents(COLLECTION, DATABASE, Some(2));
    assert_eq!(bounded.fetch_next().await.unwrap().len(), 2);

    let ids: Vec<String> = dal
        .documents()
        .get_documents(COLLECTION, DATABASE, Some(2))
        .collect_all()
        .await
        .unwrap()
        .iter()
        .map(|document| document.resource_id().to_string())
        .collect();
    assert_eq!(ids, ["doc-0", "doc-1", "doc-2", "doc-3", "doc-4"]);
}

#[tokio::test]
async fn test_exists_query_over_order_items() {
    let dal = dal_with_collection(CollectionOptions::new()).await;
    for document in [
        order("SalesOrder1", 419.4589, 100),
        order("SalesOrder2", 120.0, 100),
        order("SalesOrder3", 780.0, 200),
    ] {
        dal.documents().upsert(&document, COLLECTION, DATABASE).await.unwrap();
    }

    let query = QuerySpec::new(
        "SELECT * FROM r WHERE r.subtotal>@subtotal AND EXISTS(SELECT VALUE n FROM n in r.items WHERE n.product_id=@product_id)",
    )
    .with_parameter("@subtotal", 400)
    .with_parameter("@product_id", 100);

    let matches = dal
        .documents()
        .query_documents(COLLECTION, DATABASE, query, QueryOptions::new())
        .collect_all()
        .await
        .unwrap();

    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].resource_id(), "SalesOrder1");
    assert_eq!(matches[0].get("account_number"), Some(&json!("Account1")));
}

#[tokio::test]
async fn test_malformed_query_fails_on_first_fetch() {
    let dal = dal_with_collection(CollectionOptions::new()).await;

    let mut results = dal.documents().query_documents(
        COLLECTION,
        DATABASE,
        "SELECT FROM WHERE",
        QueryOptions::new(),
    );
    assert_eq!(results.state(), CursorState::Fresh);

    let err = results.fetch_next().await.unwrap_err();
    assert_eq!(err.status_code, status::BAD_REQUEST);
    assert_eq!(results.state(), CursorState::Fresh);
}
