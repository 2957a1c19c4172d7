use cosmosdal::{error::status, memory::InMemoryStore, prelude::*};
use futures::TryStreamExt;

#[tokio::test]
async fn test_create_get_and_delete() {
    let dal = CosmosDal::new(InMemoryStore::new());
    let databases = dal.databases();

    let created = databases.create("my_db").await.unwrap();
    assert_eq!(created.resource_id(), "my_db");
    assert_eq!(created.self_link(), Some("dbs/my_db"));
    assert!(created.etag().is_some());

    let read = databases.get("my_db").await.unwrap();
    assert_eq!(read, created);

    databases.delete("my_db").await.unwrap();
    let err = databases.get("my_db").await.unwrap_err();
    assert_eq!(err.status_code, status::NOT_FOUND);
}

#[tokio::test]
async fn test_create_twice_conflicts() {
    let dal = CosmosDal::new(InMemoryStore::new());

    dal.databases().create("my_db").await.unwrap();
    let err = dal.databases().create("my_db").await.unwrap_err();

    assert_eq!(err.status_code, status::CONFLICT);
}

#[tokio::test]
async fn test_delete_missing_is_not_found() {
    let dal = CosmosDal::new(InMemoryStore::new());

    let err = dal.databases().delete("nope").await.unwrap_err();

    assert_eq!(err.status_code, status::NOT_FOUND);
    assert!(matches!(CosmosDalError::from(err), CosmosDalError::Database(_)));
}

#[tokio::test]
async fn test_find_returns_none_without_a_match() {
    let dal = CosmosDal::new(InMemoryStore::new());
    dal.databases().create("my_db").await.unwrap();

    assert!(dal.databases().find("other_db").await.unwrap().is_none());

    let found = dal.databases().find("my_db").await.unwrap().unwrap();
    assert_eq!(found.resource_id(), "my_db");
}

#[tokio::test]
async fn test_list_streams_every_database() {
    let dal = CosmosDal::new(InMemoryStore::new());
    for id in ["a_db", "b_db", "c_db"] {
        dal.databases().create(id).await.unwrap();
    }

    let listed: Vec<Database> = dal.databases().list().try_collect().await.unwrap();
    let ids: Vec<&str> = listed.iter().map(Resource::resource_id).collect();

    assert_eq!(ids, ["a_db", "b_db", "c_db"]);
}

#[tokio::test]
async fn test_invalid_id_is_rejected() {
    let dal = CosmosDal::new(InMemoryStore::new());

    let err = dal.databases().create("bad/id").await.unwrap_err();

    assert_eq!(err.status_code, status::BAD_REQUEST);
}
