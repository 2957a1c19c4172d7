//! In-memory store client.
//!
//! Databases, collections and documents live in ordered maps behind a single async-aware
//! read-write lock. Records are stamped with the system properties a real store assigns, and
//! every request is answered with the status codes the store contract prescribes.

use async_trait::async_trait;
use chrono::Utc;
use mea::rwlock::RwLock;
use serde_json::{Map, Value, to_string, to_value};
use std::{collections::BTreeMap, sync::Arc};
use tracing::trace;
use uuid::Uuid;

use cosmosdal_core::{
    client::{BoxStoreCursor, StoreClient, StoreClientBuilder},
    error::{StoreError, StoreResult, status},
    link::{collection_link, database_link, document_link},
    model::SYSTEM_PROPERTIES,
    options::{
        CollectionDefinition, DatabaseDefinition, FeedOptions, PartitionKey, PartitionKeyPolicy,
        QuerySpec, RequestOptions, UniqueKey,
    },
};

use crate::{
    address,
    cursor::{FeedCursor, FeedSource},
    evaluator::{execute, pins_partition},
    sql::SelectQuery,
};

/// Lowest throughput a collection may reserve.
pub const MIN_THROUGHPUT: u32 = 400;
/// Highest throughput a collection may reserve.
pub const MAX_THROUGHPUT: u32 = 10_000;

const CROSS_PARTITION_DISABLED: &str = "Cross partition query is required but disabled. \
    Please set x-ms-documentdb-query-enablecrosspartition to true, specify \
    x-ms-documentdb-partitionkey, or revise your query to avoid this exception.";

/// Key of a document inside a collection: the serialized partition key value (empty for
/// collections without a partition key) and the document id.
type DocumentKey = (String, String);

#[derive(Debug)]
struct CollectionEntry {
    record: Value,
    partition_key: Option<PartitionKeyPolicy>,
    unique_keys: Vec<UniqueKey>,
    throughput: u32,
    documents: BTreeMap<DocumentKey, Value>,
}

#[derive(Debug)]
struct DatabaseEntry {
    record: Value,
    collections: BTreeMap<String, CollectionEntry>,
}

#[derive(Debug, Default)]
struct StoreState {
    databases: BTreeMap<String, DatabaseEntry>,
}

impl StoreState {
    fn database(&self, database_id: &str) -> StoreResult<&DatabaseEntry> {
        self.databases
            .get(database_id)
            .ok_or_else(|| not_found("database", database_id))
    }

    fn database_mut(&mut self, database_id: &str) -> StoreResult<&mut DatabaseEntry> {
        self.databases
            .get_mut(database_id)
            .ok_or_else(|| not_found("database", database_id))
    }

    fn collection(&self, database_id: &str, collection_id: &str) -> StoreResult<&CollectionEntry> {
        self.database(database_id)?
            .collections
            .get(collection_id)
            .ok_or_else(|| not_found("collection", collection_id))
    }

    fn collection_mut(
        &mut self,
        database_id: &str,
        collection_id: &str,
    ) -> StoreResult<&mut CollectionEntry> {
        self.database_mut(database_id)?
            .collections
            .get_mut(collection_id)
            .ok_or_else(|| not_found("collection", collection_id))
    }
}

fn not_found(kind: &str, id: &str) -> StoreError {
    StoreError::not_found(format!(
        "Resource Not Found. The {kind} '{id}' does not exist."
    ))
}

fn conflict(kind: &str, id: &str) -> StoreError {
    StoreError::conflict(format!(
        "Entity with the specified id already exists in the system. The {kind} '{id}' already exists."
    ))
}

/// Adds the system properties a store assigns on every write.
fn stamp(mut body: Map<String, Value>, self_link: String, rid: Option<Value>) -> Value {
    body.insert(
        "_rid".to_string(),
        rid.unwrap_or_else(|| Value::String(Uuid::new_v4().simple().to_string())),
    );
    body.insert("_self".to_string(), Value::String(self_link));
    body.insert(
        "_etag".to_string(),
        Value::String(format!("\"{}\"", Uuid::new_v4())),
    );
    body.insert("_ts".to_string(), Value::from(Utc::now().timestamp()));
    Value::Object(body)
}

/// Splits a partition key path such as `/owner/id` into its fields.
fn path_fields(path: &str) -> Vec<&str> {
    path.split('/').filter(|field| !field.is_empty()).collect()
}

fn value_at<'v>(document: &'v Value, path: &str) -> Option<&'v Value> {
    path_fields(path)
        .into_iter()
        .try_fold(document, |value, field| value.get(field))
}

/// Serializes a partition key value so that equal numbers share a partition (`5` and `5.0`).
fn partition_value(value: &Value) -> StoreResult<String> {
    match value {
        Value::Number(number) => match number.as_f64() {
            Some(number) => Ok(to_string(&Value::from(number))?),
            None => Ok(to_string(value)?),
        },
        other => Ok(to_string(other)?),
    }
}

fn partition_key_of(policy: &PartitionKeyPolicy, document: &Value) -> StoreResult<String> {
    let path = policy.paths.first().map(String::as_str).unwrap_or_default();

    match value_at(document, path) {
        Some(value) => partition_value(value),
        None => Err(StoreError::bad_request(format!(
            "The partition key path {path} is missing from the document."
        ))),
    }
}

fn requested_partition(
    entry: &CollectionEntry,
    partition_key: Option<&PartitionKey>,
) -> StoreResult<String> {
    match (&entry.partition_key, partition_key) {
        (None, _) => Ok(String::new()),
        (Some(_), Some(partition_key)) => partition_value(partition_key.value()),
        (Some(_), None) => Err(StoreError::bad_request(
            "PartitionKey value must be supplied for this operation.",
        )),
    }
}

fn validate_partition_key(policy: &PartitionKeyPolicy) -> StoreResult<()> {
    match policy.paths.as_slice() {
        [path] if path.starts_with('/') && !path_fields(path).is_empty() => Ok(()),
        _ => Err(StoreError::bad_request(
            "The partition key definition must contain exactly one path starting with '/'.",
        )),
    }
}

/// Configuration of an [`InMemoryStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StoreConfig {
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub default_throughput: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_page_size: 100,
            max_page_size: 1000,
            default_throughput: MIN_THROUGHPUT,
        }
    }
}

/// Thread-safe in-memory store client.
///
/// Implements [`StoreClient`] with the observable contract of the document store: status
/// codes, link addressing, partition key rules, unique key enforcement, a SQL query subset and
/// block-wise paging. Nothing is persisted.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and keeps its state behind an `Arc`, so clones share the same
/// databases and may be used from concurrent tasks.
///
/// # Example
///
/// ```ignore
/// use cosmosdal_memory::InMemoryStore;
/// use cosmosdal_core::manager::DatabaseManager;
///
/// let store = InMemoryStore::builder().with_default_page_size(50).build().await?;
/// DatabaseManager::new(&store).create("my_db").await?;
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
    config: StoreConfig,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates an empty store with the default configuration.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    fn with_config(config: StoreConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            config,
        }
    }

    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Returns the throughput reserved by a collection.
    ///
    /// # Errors
    ///
    /// Fails with status 404 if the collection does not exist.
    pub async fn offer_throughput(&self, collection_link: &str) -> StoreResult<u32> {
        let (database_id, collection_id) = address::collection(collection_link)?;

        Ok(self
            .state
            .read()
            .await
            .collection(&database_id, &collection_id)?
            .throughput)
    }

    fn cursor(
        &self,
        source: StoreResult<FeedSource>,
        query: Option<QuerySpec>,
        options: FeedOptions,
    ) -> BoxStoreCursor<'_> {
        let page_size = match options.max_item_count {
            None => self.config.default_page_size,
            Some(max_item_count) => max_item_count
                .limit()
                .unwrap_or(self.config.max_page_size),
        };

        Box::new(FeedCursor::new(self.clone(), source, query, options, page_size))
    }

    /// Resolves a read feed or query into its full, ordered result set.
    pub(crate) async fn plan(
        &self,
        source: &FeedSource,
        query: Option<&QuerySpec>,
        options: &FeedOptions,
    ) -> StoreResult<Vec<Value>> {
        let parsed = match query {
            Some(spec) => {
                let parsed = SelectQuery::parse(&spec.query)?;
                parsed.bind(spec.parameters.iter().map(|p| p.name.as_str()))?;
                Some((parsed, spec.parameters.as_slice()))
            }
            None => None,
        };

        let state = self.state.read().await;

        let records: Vec<&Value> = match source {
            FeedSource::Databases => state
                .databases
                .values()
                .map(|entry| &entry.record)
                .collect(),
            FeedSource::Collections { database_id } => state
                .database(database_id)?
                .collections
                .values()
                .map(|entry| &entry.record)
                .collect(),
            FeedSource::Documents {
                database_id,
                collection_id,
            } => {
                let entry = state.collection(database_id, collection_id)?;

                if let (Some(policy), Some((parsed, _))) = (&entry.partition_key, &parsed) {
                    let pinned = policy
                        .paths
                        .first()
                        .is_some_and(|path| pins_partition(parsed, &path_fields(path)));

                    if options.partition_key.is_none()
                        && !options.enable_cross_partition_query
                        && !pinned
                    {
                        trace!(target: "cosmosdal::memory", %collection_id, "rejecting cross partition query");
                        return Err(StoreError::bad_request(CROSS_PARTITION_DISABLED));
                    }
                }

                let partition = match (&entry.partition_key, &options.partition_key) {
                    (Some(_), Some(partition_key)) => Some(partition_value(partition_key.value())?),
                    _ => None,
                };

                entry
                    .documents
                    .iter()
                    .filter(|((key, _), _)| partition.as_ref().is_none_or(|p| p == key))
                    .map(|(_, document)| document)
                    .collect()
            }
        };

        trace!(
            target: "cosmosdal::memory",
            ?source,
            candidates = records.len(),
            query = query.map(|q| q.query.as_str()),
            "planned feed"
        );

        match parsed {
            Some((parsed, parameters)) => execute(&parsed, parameters, records),
            None => Ok(records.into_iter().cloned().collect()),
        }
    }

    fn unique_key_violation(entry: &CollectionEntry, key: &DocumentKey, document: &Value) -> bool {
        entry.unique_keys.iter().any(|unique_key| {
            let values = |doc: &Value| {
                unique_key
                    .paths
                    .iter()
                    .map(|path| value_at(doc, path).cloned().unwrap_or(Value::Null))
                    .collect::<Vec<_>>()
            };
            let expected = values(document);

            entry
                .documents
                .iter()
                .any(|((partition, id), other)| {
                    partition == &key.0 && id != &key.1 && values(other) == expected
                })
        })
    }
}

#[async_trait]
impl StoreClient for InMemoryStore {
    async fn create_database(&self, definition: DatabaseDefinition) -> StoreResult<Value> {
        address::validate_id("database", &definition.id)?;

        let mut state = self.state.write().await;
        if state.databases.contains_key(&definition.id) {
            return Err(conflict("database", &definition.id));
        }

        let body = match to_value(&definition)? {
            Value::Object(body) => body,
            _ => Map::new(),
        };
        let record = stamp(body, database_link(&definition.id), None);
        trace!(target: "cosmosdal::memory", id = %definition.id, "created database");

        state.databases.insert(
            definition.id,
            DatabaseEntry {
                record: record.clone(),
                collections: BTreeMap::new(),
            },
        );

        Ok(record)
    }

    async fn read_database(&self, database_link: &str) -> StoreResult<Value> {
        let database_id = address::database(database_link)?;

        Ok(self
            .state
            .read()
            .await
            .database(&database_id)?
            .record
            .clone())
    }

    async fn delete_database(&self, database_link: &str) -> StoreResult<()> {
        let database_id = address::database(database_link)?;

        match self.state.write().await.databases.remove(&database_id) {
            Some(_) => {
                trace!(target: "cosmosdal::memory", id = %database_id, "deleted database");
                Ok(())
            }
            None => Err(not_found("database", &database_id)),
        }
    }

    fn read_databases(&self, options: FeedOptions) -> BoxStoreCursor<'_> {
        self.cursor(Ok(FeedSource::Databases), None, options)
    }

    fn query_databases(&self, query: QuerySpec, options: FeedOptions) -> BoxStoreCursor<'_> {
        self.cursor(Ok(FeedSource::Databases), Some(query), options)
    }

    async fn create_collection(
        &self,
        database_link: &str,
        definition: CollectionDefinition,
        options: RequestOptions,
    ) -> StoreResult<Value> {
        let database_id = address::database(database_link)?;
        address::validate_id("collection", &definition.id)?;

        if let Some(policy) = &definition.partition_key {
            validate_partition_key(policy)?;
        }

        let throughput = options
            .offer_throughput
            .unwrap_or(self.config.default_throughput);
        if !(MIN_THROUGHPUT..=MAX_THROUGHPUT).contains(&throughput) {
            return Err(StoreError::bad_request(format!(
                "The offer throughput {throughput} is invalid. It must be between {MIN_THROUGHPUT} and {MAX_THROUGHPUT}."
            )));
        }

        let mut state = self.state.write().await;
        let database = state.database_mut(&database_id)?;
        if database.collections.contains_key(&definition.id) {
            return Err(conflict("collection", &definition.id));
        }

        let body = match to_value(&definition)? {
            Value::Object(body) => body,
            _ => Map::new(),
        };
        let record = stamp(body, collection_link(&database_id, &definition.id), None);
        trace!(
            target: "cosmosdal::memory",
            database = %database_id,
            id = %definition.id,
            throughput,
            "created collection"
        );

        database.collections.insert(
            definition.id,
            CollectionEntry {
                record: record.clone(),
                partition_key: definition.partition_key,
                unique_keys: definition
                    .unique_key_policy
                    .map(|policy| policy.unique_keys)
                    .unwrap_or_default(),
                throughput,
                documents: BTreeMap::new(),
            },
        );

        Ok(record)
    }

    async fn read_collection(&self, collection_link: &str) -> StoreResult<Value> {
        let (database_id, collection_id) = address::collection(collection_link)?;

        Ok(self
            .state
            .read()
            .await
            .collection(&database_id, &collection_id)?
            .record
            .clone())
    }

    async fn delete_collection(&self, collection_link: &str) -> StoreResult<()> {
        let (database_id, collection_id) = address::collection(collection_link)?;

        let mut state = self.state.write().await;
        match state
            .database_mut(&database_id)?
            .collections
            .remove(&collection_id)
        {
            Some(_) => {
                trace!(target: "cosmosdal::memory", database = %database_id, id = %collection_id, "deleted collection");
                Ok(())
            }
            None => Err(not_found("collection", &collection_id)),
        }
    }

    fn read_collections(&self, database_link: &str, options: FeedOptions) -> BoxStoreCursor<'_> {
        let source = address::database(database_link)
            .map(|database_id| FeedSource::Collections { database_id });

        self.cursor(source, None, options)
    }

    fn query_collections(
        &self,
        database_link: &str,
        query: QuerySpec,
        options: FeedOptions,
    ) -> BoxStoreCursor<'_> {
        let source = address::database(database_link)
            .map(|database_id| FeedSource::Collections { database_id });

        self.cursor(source, Some(query), options)
    }

    async fn upsert_document(&self, collection_link: &str, document: Value) -> StoreResult<Value> {
        let (database_id, collection_id) = address::collection(collection_link)?;

        let Value::Object(mut body) = document else {
            return Err(StoreError::bad_request("The document body must be a JSON object."));
        };
        let id = match body.get("id") {
            Some(Value::String(id)) => id.clone(),
            _ => {
                return Err(StoreError::bad_request(
                    "The input content is invalid because the required property 'id' is missing or not a string.",
                ));
            }
        };
        address::validate_id("document", &id)?;
        for property in SYSTEM_PROPERTIES {
            body.remove(property);
        }

        let mut state = self.state.write().await;
        let entry = state.collection_mut(&database_id, &collection_id)?;

        let user_document = Value::Object(body.clone());
        let partition = match &entry.partition_key {
            Some(policy) => partition_key_of(policy, &user_document)?,
            None => String::new(),
        };
        let key = (partition, id.clone());

        if Self::unique_key_violation(entry, &key, &user_document) {
            return Err(StoreError::conflict(
                "Unique index constraint violation.",
            ));
        }

        let rid = entry
            .documents
            .get(&key)
            .and_then(|existing| existing.get("_rid").cloned());
        let replaced = rid.is_some();

        body.insert("_attachments".to_string(), Value::String("attachments/".to_string()));
        let record = stamp(body, document_link(&database_id, &collection_id, &id), rid);
        trace!(target: "cosmosdal::memory", collection = %collection_id, %id, replaced, "upserted document");

        entry.documents.insert(key, record.clone());

        Ok(record)
    }

    async fn read_document(&self, document_link: &str, options: RequestOptions) -> StoreResult<Value> {
        let (database_id, collection_id, id) = address::document(document_link)?;

        let state = self.state.read().await;
        let entry = state.collection(&database_id, &collection_id)?;
        let partition = requested_partition(entry, options.partition_key.as_ref())?;

        entry
            .documents
            .get(&(partition, id.clone()))
            .cloned()
            .ok_or_else(|| not_found("document", &id))
    }

    async fn delete_document(&self, document_link: &str, options: RequestOptions) -> StoreResult<()> {
        let (database_id, collection_id, id) = address::document(document_link)?;

        let mut state = self.state.write().await;
        let entry = state.collection_mut(&database_id, &collection_id)?;
        let partition = requested_partition(entry, options.partition_key.as_ref())?;

        match entry.documents.remove(&(partition, id.clone())) {
            Some(_) => {
                trace!(target: "cosmosdal::memory", collection = %collection_id, %id, "deleted document");
                Ok(())
            }
            None => Err(not_found("document", &id)),
        }
    }

    fn read_documents(&self, collection_link: &str, options: FeedOptions) -> BoxStoreCursor<'_> {
        let source = address::collection(collection_link).map(|(database_id, collection_id)| {
            FeedSource::Documents {
                database_id,
                collection_id,
            }
        });

        self.cursor(source, None, options)
    }

    fn query_documents(
        &self,
        collection_link: &str,
        query: QuerySpec,
        options: FeedOptions,
    ) -> BoxStoreCursor<'_> {
        let source = address::collection(collection_link).map(|(database_id, collection_id)| {
            FeedSource::Documents {
                database_id,
                collection_id,
            }
        });

        self.cursor(source, Some(query), options)
    }
}

/// Builder for [`InMemoryStore`] instances.
///
/// ```ignore
/// use cosmosdal_core::client::StoreClientBuilder;
/// use cosmosdal_memory::InMemoryStore;
///
/// let store = InMemoryStore::builder()
///     .with_default_page_size(25)
///     .with_max_page_size(500)
///     .build()
///     .await?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryStoreBuilder {
    config: StoreConfig,
}

impl InMemoryStoreBuilder {
    /// Block size used when a feed does not ask for one. Defaults to 100.
    pub fn with_default_page_size(mut self, page_size: usize) -> Self {
        self.config.default_page_size = page_size;
        self
    }

    /// Block size used for unbounded feeds (`maxItemCount` of `-1`). Defaults to 1000.
    pub fn with_max_page_size(mut self, page_size: usize) -> Self {
        self.config.max_page_size = page_size;
        self
    }

    /// Throughput reserved by collections created without one. Defaults to 400.
    pub fn with_default_throughput(mut self, throughput: u32) -> Self {
        self.config.default_throughput = throughput;
        self
    }
}

#[async_trait]
impl StoreClientBuilder for InMemoryStoreBuilder {
    type Client = InMemoryStore;

    /// Builds a new, empty [`InMemoryStore`].
    ///
    /// # Errors
    ///
    /// Fails with status 400 if a page size is zero or the default throughput is out of range.
    async fn build(self) -> StoreResult<Self::Client> {
        let config = self.config;

        if config.default_page_size == 0 || config.max_page_size == 0 {
            return Err(StoreError::new(
                status::BAD_REQUEST,
                "Page sizes must be greater than zero.",
            ));
        }
        if !(MIN_THROUGHPUT..=MAX_THROUGHPUT).contains(&config.default_throughput) {
            return Err(StoreError::bad_request(format!(
                "The default throughput {} is outside {MIN_THROUGHPUT}..={MAX_THROUGHPUT}.",
                config.default_throughput
            )));
        }

        Ok(InMemoryStore::with_config(config))
    }
}
