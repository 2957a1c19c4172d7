//! Collection policies, query specifications and per-operation options.
//!
//! The types in this module serve two purposes. The builder-style option structs
//! ([`CollectionOptions`], [`QueryOptions`]) enumerate what a caller may ask of a manager
//! operation. The wire structs ([`CollectionDefinition`], [`RequestOptions`], [`FeedOptions`],
//! [`QuerySpec`]) are what the managers hand to the [`StoreClient`](crate::client::StoreClient),
//! and serialize to the shapes the store expects.
//!
//! # Example
//!
//! ```ignore
//! use cosmosdal_core::options::{CollectionOptions, QueryOptions, QuerySpec, UniqueKey};
//!
//! let options = CollectionOptions::new()
//!     .with_partition_key(["/owner_id"])
//!     .with_unique_keys([UniqueKey::new(["/field1/field2", "/field3"])])
//!     .with_throughput(1000);
//!
//! let query = QuerySpec::new("SELECT * FROM r WHERE r.subtotal > @subtotal")
//!     .with_parameter("@subtotal", 400);
//!
//! let query_options = QueryOptions::new()
//!     .with_max_item_count(10)
//!     .enable_cross_partition_query();
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::num::NonZeroU32;

/// The partitioning scheme of a collection. Only hash partitioning is supported.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartitionKind {
    #[default]
    Hash,
}

/// Partition key policy of a collection.
///
/// Serializes to `{"paths": [...], "kind": "Hash", "version": 2}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PartitionKeyPolicy {
    /// The document paths making up the partition key, e.g. `/owner_id`.
    pub paths: Vec<String>,
    /// The partitioning scheme.
    pub kind: PartitionKind,
    /// The hash version.
    pub version: u8,
}

impl PartitionKeyPolicy {
    /// The hash version used for every collection created by this layer.
    pub const HASH_VERSION: u8 = 2;

    /// Creates a hash partition key policy over the given paths.
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            kind: PartitionKind::Hash,
            version: Self::HASH_VERSION,
        }
    }
}

/// A group of paths whose combined values must be unique within a partition.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UniqueKey {
    pub paths: Vec<String>,
}

impl UniqueKey {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }
}

/// Unique key policy of a collection.
///
/// Serializes to `{"uniqueKeys": [{"paths": [...]}, ...]}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct UniqueKeyPolicy {
    pub unique_keys: Vec<UniqueKey>,
}

/// The body sent to the store when creating a database.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DatabaseDefinition {
    pub id: String,
}

impl DatabaseDefinition {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// The body sent to the store when creating a collection.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CollectionDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_key: Option<PartitionKeyPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_key_policy: Option<UniqueKeyPolicy>,
}

/// Options recognized by [`CollectionManager::create`](crate::manager::CollectionManager::create).
///
/// All options are independent and may be combined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionOptions {
    /// Path groups enforcing document uniqueness. Empty means no unique key policy.
    pub unique_keys: Vec<UniqueKey>,
    /// Creates a hash-partitioned collection over these paths.
    pub partition_key: Option<PartitionKeyPolicy>,
    /// Request units to reserve. `None` leaves the store default in place.
    pub throughput: Option<u32>,
}

impl CollectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds unique key path groups.
    pub fn with_unique_keys(mut self, unique_keys: impl IntoIterator<Item = UniqueKey>) -> Self {
        self.unique_keys.extend(unique_keys);
        self
    }

    /// Partitions the collection over the given paths.
    pub fn with_partition_key<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.partition_key = Some(PartitionKeyPolicy::new(paths));
        self
    }

    /// Reserves the given number of request units.
    pub fn with_throughput(mut self, throughput: u32) -> Self {
        self.throughput = Some(throughput);
        self
    }

    /// Builds the creation body for a collection with the given id.
    pub fn definition(&self, id: impl Into<String>) -> CollectionDefinition {
        CollectionDefinition {
            id: id.into(),
            partition_key: self.partition_key.clone(),
            unique_key_policy: if self.unique_keys.is_empty() {
                None
            } else {
                Some(UniqueKeyPolicy {
                    unique_keys: self.unique_keys.clone(),
                })
            },
        }
    }

    /// Builds the request options for the creation call.
    pub fn request_options(&self) -> RequestOptions {
        RequestOptions {
            offer_throughput: self.throughput,
            partition_key: None,
        }
    }
}

/// The value of a document's partition key.
///
/// Usually a string, but numbers, booleans and null are valid partition key values too.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(transparent)]
pub struct PartitionKey(Value);

impl PartitionKey {
    pub fn new(value: impl Into<Value>) -> Self {
        Self(value.into())
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<&str> for PartitionKey {
    fn from(value: &str) -> Self {
        Self(Value::from(value))
    }
}

impl From<String> for PartitionKey {
    fn from(value: String) -> Self {
        Self(Value::from(value))
    }
}

impl From<i64> for PartitionKey {
    fn from(value: i64) -> Self {
        Self(Value::from(value))
    }
}

impl From<f64> for PartitionKey {
    fn from(value: f64) -> Self {
        Self(Value::from(value))
    }
}

impl From<bool> for PartitionKey {
    fn from(value: bool) -> Self {
        Self(Value::from(value))
    }
}

impl From<Value> for PartitionKey {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Options attached to a single-resource request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer_throughput: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_key: Option<PartitionKey>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_partition_key(mut self, partition_key: impl Into<PartitionKey>) -> Self {
        self.partition_key = Some(partition_key.into());
        self
    }
}

/// Maximum number of records the store returns in one block.
///
/// Serializes to `-1` for [`MaxItemCount::Unbounded`] and to the limit otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxItemCount {
    /// Let the store fill each block up to its own maximum.
    Unbounded,
    /// Never return more than this many records per block.
    Limited(NonZeroU32),
}

impl MaxItemCount {
    /// Returns the limit, or `None` when unbounded.
    pub fn limit(&self) -> Option<usize> {
        match self {
            MaxItemCount::Unbounded => None,
            MaxItemCount::Limited(limit) => Some(limit.get() as usize),
        }
    }
}

/// Zero has no meaning as a block size and maps to [`MaxItemCount::Unbounded`].
impl From<u32> for MaxItemCount {
    fn from(value: u32) -> Self {
        match NonZeroU32::new(value) {
            Some(limit) => MaxItemCount::Limited(limit),
            None => MaxItemCount::Unbounded,
        }
    }
}

impl Serialize for MaxItemCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MaxItemCount::Unbounded => serializer.serialize_i64(-1),
            MaxItemCount::Limited(limit) => serializer.serialize_i64(limit.get() as i64),
        }
    }
}

impl<'de> Deserialize<'de> for MaxItemCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = i64::deserialize(deserializer)?;

        Ok(match u32::try_from(value) {
            Ok(limit) => MaxItemCount::from(limit),
            Err(_) => MaxItemCount::Unbounded,
        })
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Options attached to a read feed or query.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FeedOptions {
    /// `None` leaves the block size to the store's default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_item_count: Option<MaxItemCount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_key: Option<PartitionKey>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub enable_cross_partition_query: bool,
}

impl FeedOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_item_count(mut self, max_item_count: MaxItemCount) -> Self {
        self.max_item_count = Some(max_item_count);
        self
    }
}

/// A named query parameter, e.g. `{"name": "@id", "value": "doc-001"}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct QueryParameter {
    pub name: String,
    pub value: Value,
}

/// A SQL query text together with its ordered named parameters.
///
/// Serializes to `{"query": "...", "parameters": [...]}`, omitting `parameters` when empty.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct QuerySpec {
    pub query: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<QueryParameter>,
}

impl QuerySpec {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            parameters: Vec::new(),
        }
    }

    /// Appends a named parameter. Parameters keep the order they were added in.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.push(QueryParameter {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// The equality query used to look a resource up by id.
    pub(crate) fn by_id(id: &str) -> Self {
        QuerySpec::new("SELECT * FROM r WHERE r.id=@id").with_parameter("@id", id)
    }
}

impl From<&str> for QuerySpec {
    fn from(query: &str) -> Self {
        QuerySpec::new(query)
    }
}

impl From<String> for QuerySpec {
    fn from(query: String) -> Self {
        QuerySpec::new(query)
    }
}

/// Options recognized by [`DocumentManager::query_documents`](crate::manager::DocumentManager::query_documents).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    /// Maximum documents per [`fetch_next`](crate::cursor::QueryResults::fetch_next).
    /// `None` (or zero) leaves the block size to the store.
    pub max_item_count: Option<u32>,
    /// Restricts the query to a single partition.
    pub partition_key: Option<PartitionKey>,
    /// Allows a query over a partitioned collection to fan out across partitions.
    pub enable_cross_partition_query: bool,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_item_count(mut self, max_item_count: u32) -> Self {
        self.max_item_count = Some(max_item_count);
        self
    }

    pub fn with_partition_key(mut self, partition_key: impl Into<PartitionKey>) -> Self {
        self.partition_key = Some(partition_key.into());
        self
    }

    pub fn enable_cross_partition_query(mut self) -> Self {
        self.enable_cross_partition_query = true;
        self
    }

    /// Builds the feed options sent to the store.
    pub fn feed_options(&self) -> FeedOptions {
        FeedOptions {
            max_item_count: self
                .max_item_count
                .and_then(NonZeroU32::new)
                .map(MaxItemCount::Limited),
            partition_key: self.partition_key.clone(),
            enable_cross_partition_query: self.enable_cross_partition_query,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn test_collection_definition_wire_shape() {
        let options = CollectionOptions::new()
            .with_partition_key(["/field1"])
            .with_unique_keys([UniqueKey::new(["/field1/field2", "/field3"])])
            .with_throughput(1000);

        assert_eq!(
            to_value(options.definition("foobar")).unwrap(),
            json!({
                "id": "foobar",
                "partitionKey": { "paths": ["/field1"], "kind": "Hash", "version": 2 },
                "uniqueKeyPolicy": { "uniqueKeys": [{ "paths": ["/field1/field2", "/field3"] }] },
            })
        );
        assert_eq!(
            to_value(options.request_options()).unwrap(),
            json!({ "offerThroughput": 1000 })
        );
    }

    #[test]
    fn test_empty_options_send_bare_definition() {
        let options = CollectionOptions::new();

        assert_eq!(to_value(options.definition("foobar")).unwrap(), json!({ "id": "foobar" }));
        assert_eq!(to_value(options.request_options()).unwrap(), json!({}));
    }

    #[test]
    fn test_query_spec_wire_shape() {
        let spec = QuerySpec::new("SELECT * FROM r WHERE r.subtotal>@subtotal AND r.owner=@owner")
            .with_parameter("@subtotal", 400)
            .with_parameter("@owner", "user-123");

        assert_eq!(
            to_value(&spec).unwrap(),
            json!({
                "query": "SELECT * FROM r WHERE r.subtotal>@subtotal AND r.owner=@owner",
                "parameters": [
                    { "name": "@subtotal", "value": 400 },
                    { "name": "@owner", "value": "user-123" },
                ],
            })
        );
        assert_eq!(
            to_value(QuerySpec::from("SELECT * FROM r")).unwrap(),
            json!({ "query": "SELECT * FROM r" })
        );
    }

    #[test]
    fn test_unbounded_sentinel_is_distinct_from_limits() {
        assert_eq!(MaxItemCount::from(0), MaxItemCount::Unbounded);
        assert_eq!(MaxItemCount::from(3).limit(), Some(3));
        assert_eq!(MaxItemCount::Unbounded.limit(), None);
        assert_eq!(to_value(MaxItemCount::Unbounded).unwrap(), json!(-1));
        assert_eq!(to_value(MaxItemCount::from(25)).unwrap(), json!(25));
    }

    #[test]
    fn test_query_options_to_feed_options() {
        let feed = QueryOptions::new()
            .with_max_item_count(3)
            .with_partition_key("doc-002")
            .enable_cross_partition_query()
            .feed_options();

        assert_eq!(
            to_value(&feed).unwrap(),
            json!({ "maxItemCount": 3, "partitionKey": "doc-002", "enableCrossPartitionQuery": true })
        );
        assert_eq!(to_value(QueryOptions::new().feed_options()).unwrap(), json!({}));
    }
}
