//! A store client double that records the requests it receives.

use async_trait::async_trait;
use serde_json::{Value, json, to_string};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use crate::{
    client::{BoxStoreCursor, StoreClient, StoreCursor},
    error::{StoreError, StoreResult},
    options::{CollectionDefinition, DatabaseDefinition, FeedOptions, QuerySpec, RequestOptions},
};

#[derive(Debug, Default)]
pub(crate) struct RecordingClient {
    calls: Mutex<Vec<String>>,
    fetches: Arc<AtomicUsize>,
    records: Vec<Value>,
    fault: Option<StoreError>,
}

impl RecordingClient {
    /// Every feed and query returns `records` in a single block.
    pub(crate) fn with_records(records: Vec<Value>) -> Self {
        Self {
            records,
            ..Default::default()
        }
    }

    /// Every request, including cursor fetches, fails with `fault`.
    pub(crate) fn failing(fault: StoreError) -> Self {
        Self {
            fault: Some(fault),
            ..Default::default()
        }
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn record(&self, call: String) -> StoreResult<()> {
        self.calls.lock().unwrap().push(call);
        match &self.fault {
            Some(fault) => Err(fault.clone()),
            None => Ok(()),
        }
    }

    fn cursor(&self, call: String) -> BoxStoreCursor<'_> {
        self.calls.lock().unwrap().push(call);
        Box::new(RecordingCursor {
            block: Some(self.records.clone()),
            fault: self.fault.clone(),
            fetches: self.fetches.clone(),
        })
    }
}

fn last_segment(link: &str) -> &str {
    link.rsplit('/').next().unwrap_or(link)
}

fn describe(query: &QuerySpec) -> String {
    let parameters = query
        .parameters
        .iter()
        .map(|p| format!("{}={}", p.name, p.value))
        .collect::<Vec<_>>()
        .join(", ");

    format!("{} [{parameters}]", query.query)
}

struct RecordingCursor {
    block: Option<Vec<Value>>,
    fault: Option<StoreError>,
    fetches: Arc<AtomicUsize>,
}

#[async_trait]
impl StoreCursor for RecordingCursor {
    async fn fetch_next_block(&mut self) -> StoreResult<Vec<Value>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(fault) = &self.fault {
            return Err(fault.clone());
        }
        Ok(self.block.take().unwrap_or_default())
    }
}

#[async_trait]
impl StoreClient for RecordingClient {
    async fn create_database(&self, definition: DatabaseDefinition) -> StoreResult<Value> {
        self.record(format!("create_database {}", definition.id))?;
        Ok(json!({ "id": definition.id }))
    }

    async fn read_database(&self, database_link: &str) -> StoreResult<Value> {
        self.record(format!("read_database {database_link}"))?;
        Ok(json!({ "id": last_segment(database_link) }))
    }

    async fn delete_database(&self, database_link: &str) -> StoreResult<()> {
        self.record(format!("delete_database {database_link}"))
    }

    fn read_databases(&self, _options: FeedOptions) -> BoxStoreCursor<'_> {
        self.cursor("read_databases".to_string())
    }

    fn query_databases(&self, query: QuerySpec, _options: FeedOptions) -> BoxStoreCursor<'_> {
        self.cursor(format!("query_databases {}", describe(&query)))
    }

    async fn create_collection(
        &self,
        database_link: &str,
        definition: CollectionDefinition,
        options: RequestOptions,
    ) -> StoreResult<Value> {
        self.record(format!(
            "create_collection {database_link} {} {}",
            to_string(&definition).unwrap(),
            to_string(&options).unwrap()
        ))?;
        Ok(json!({ "id": definition.id }))
    }

    async fn read_collection(&self, collection_link: &str) -> StoreResult<Value> {
        self.record(format!("read_collection {collection_link}"))?;
        Ok(json!({ "id": last_segment(collection_link) }))
    }

    async fn delete_collection(&self, collection_link: &str) -> StoreResult<()> {
        self.record(format!("delete_collection {collection_link}"))
    }

    fn read_collections(&self, database_link: &str, _options: FeedOptions) -> BoxStoreCursor<'_> {
        self.cursor(format!("read_collections {database_link}"))
    }

    fn query_collections(
        &self,
        database_link: &str,
        query: QuerySpec,
        _options: FeedOptions,
    ) -> BoxStoreCursor<'_> {
        self.cursor(format!("query_collections {database_link} {}", describe(&query)))
    }

    async fn upsert_document(&self, collection_link: &str, document: Value) -> StoreResult<Value> {
        self.record(format!("upsert_document {collection_link} {document}"))?;
        Ok(document)
    }

    async fn read_document(&self, document_link: &str, options: RequestOptions) -> StoreResult<Value> {
        self.record(format!(
            "read_document {document_link} {}",
            to_string(&options).unwrap()
        ))?;
        Ok(json!({ "id": last_segment(document_link) }))
    }

    async fn delete_document(&self, document_link: &str, options: RequestOptions) -> StoreResult<()> {
        self.record(format!(
            "delete_document {document_link} {}",
            to_string(&options).unwrap()
        ))
    }

    fn read_documents(&self, collection_link: &str, options: FeedOptions) -> BoxStoreCursor<'_> {
        self.cursor(format!(
            "read_documents {collection_link} {}",
            to_string(&options).unwrap()
        ))
    }

    fn query_documents(
        &self,
        collection_link: &str,
        query: QuerySpec,
        options: FeedOptions,
    ) -> BoxStoreCursor<'_> {
        self.cursor(format!(
            "query_documents {collection_link} {} {}",
            describe(&query),
            to_string(&options).unwrap()
        ))
    }
}
