//! Typed wrappers around the records returned by the store.
//!
//! Every wrapper exposes a stable identity ([`Resource::resource_id`]) and keeps the raw record
//! as an opaque [`NativeResource`] attachment. Managers only ever return these wrappers; raw
//! store records never leave the layer.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value, from_value};

use crate::{
    error::{
        CollectionError, DatabaseError, DocumentError, DocumentResult, StoreError, StoreResult,
        status,
    },
    options::{PartitionKeyPolicy, UniqueKeyPolicy},
};

/// Properties the store assigns to every record it returns.
pub const SYSTEM_PROPERTIES: [&str; 5] = ["_rid", "_self", "_etag", "_ts", "_attachments"];

/// The raw record a resource wrapper was built from.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
#[serde(transparent)]
pub struct NativeResource(Map<String, Value>);

impl NativeResource {
    /// Returns the value of a top-level property.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

/// A record managed by the store at one level of the hierarchy.
///
/// The associated [`Error`](Resource::Error) is the error kind of the manager responsible for
/// this level; failures met while decoding or paginating these records are reported with it.
pub trait Resource: Sized + Send + 'static {
    /// The error kind of the manager owning this resource level.
    type Error: From<StoreError> + std::error::Error + Send + Sync + 'static;

    /// Human readable name of the resource level, used in messages and logs.
    const KIND: &'static str;

    /// Wraps a raw store record.
    ///
    /// # Errors
    ///
    /// Fails with status 500 when the record is not an object or has no string `id`.
    fn from_native(native: Value) -> StoreResult<Self>;

    /// Returns the id of this resource.
    fn resource_id(&self) -> &str;

    /// Returns the raw record this resource was built from.
    fn native_resource(&self) -> &NativeResource;

    /// Returns the store-assigned version tag, if present.
    fn etag(&self) -> Option<&str> {
        self.native_resource()
            .get("_etag")
            .and_then(Value::as_str)
    }

    /// Returns the store-assigned last-write timestamp in seconds, if present.
    fn timestamp(&self) -> Option<i64> {
        self.native_resource()
            .get("_ts")
            .and_then(Value::as_i64)
    }

    /// Returns the link the store reports for this resource, if present.
    fn self_link(&self) -> Option<&str> {
        self.native_resource()
            .get("_self")
            .and_then(Value::as_str)
    }
}

fn decode(native: Value, kind: &str) -> StoreResult<(String, NativeResource)> {
    let map = match native {
        Value::Object(map) => map,
        other => {
            return Err(StoreError::new(
                status::INTERNAL_SERVER_ERROR,
                format!("Expected a {kind} record to be an object, found {other}"),
            ));
        }
    };

    let id = map
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            StoreError::new(
                status::INTERNAL_SERVER_ERROR,
                format!("The {kind} record is missing a string `id` property"),
            )
        })?;

    Ok((id, NativeResource(map)))
}

/// A database.
#[derive(Debug, Clone, PartialEq)]
pub struct Database {
    resource_id: String,
    native: NativeResource,
}

impl Resource for Database {
    type Error = DatabaseError;
    const KIND: &'static str = "database";

    fn from_native(native: Value) -> StoreResult<Self> {
        let (resource_id, native) = decode(native, Self::KIND)?;
        Ok(Self { resource_id, native })
    }

    fn resource_id(&self) -> &str {
        &self.resource_id
    }

    fn native_resource(&self) -> &NativeResource {
        &self.native
    }
}

/// A collection inside a database.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    resource_id: String,
    native: NativeResource,
}

impl Collection {
    /// Returns the partition key policy the collection was created with.
    pub fn partition_key_policy(&self) -> Option<PartitionKeyPolicy> {
        self.native
            .get("partitionKey")
            .cloned()
            .and_then(|policy| from_value(policy).ok())
    }

    /// Returns the unique key policy the collection was created with.
    pub fn unique_key_policy(&self) -> Option<UniqueKeyPolicy> {
        self.native
            .get("uniqueKeyPolicy")
            .cloned()
            .and_then(|policy| from_value(policy).ok())
    }

    pub fn is_partitioned(&self) -> bool {
        self.partition_key_policy().is_some()
    }
}

impl Resource for Collection {
    type Error = CollectionError;
    const KIND: &'static str = "collection";

    fn from_native(native: Value) -> StoreResult<Self> {
        let (resource_id, native) = decode(native, Self::KIND)?;
        Ok(Self { resource_id, native })
    }

    fn resource_id(&self) -> &str {
        &self.resource_id
    }

    fn native_resource(&self) -> &NativeResource {
        &self.native
    }
}

/// A document inside a collection.
///
/// Besides its id, a document is a bag of arbitrary fields. Use [`Document::get`] for loose
/// access or [`Document::deserialize`] to read it back into a typed value.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    resource_id: String,
    native: NativeResource,
}

impl Document {
    /// Returns the value of a top-level field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.native.get(field)
    }

    /// Returns the per-document time to live in seconds, if set.
    pub fn ttl(&self) -> Option<i64> {
        self.native.get("ttl").and_then(Value::as_i64)
    }

    /// Iterates over the user fields, skipping store-assigned system properties.
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.native
            .as_map()
            .iter()
            .filter(|(key, _)| !SYSTEM_PROPERTIES.contains(&key.as_str()))
    }

    /// Deserializes the document into a typed value.
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentError`] with status 400 if the fields do not match `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> DocumentResult<T> {
        Ok(from_value(Value::Object(self.native.as_map().clone())).map_err(StoreError::from)?)
    }
}

impl Resource for Document {
    type Error = DocumentError;
    const KIND: &'static str = "document";

    fn from_native(native: Value) -> StoreResult<Self> {
        let (resource_id, native) = decode(native, Self::KIND)?;
        Ok(Self { resource_id, native })
    }

    fn resource_id(&self) -> &str {
        &self.resource_id
    }

    fn native_resource(&self) -> &NativeResource {
        &self.native
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize, Debug, PartialEq)]
    struct Order {
        id: String,
        subtotal: f64,
    }

    #[test]
    fn test_document_projects_identity_and_fields() {
        let document = Document::from_native(json!({
            "id": "foobar",
            "subtotal": 419.4589,
            "ttl": 2592000,
            "_rid": "abc",
            "_etag": "\"0001\"",
            "_ts": 1589587200,
        }))
        .unwrap();

        assert_eq!(document.resource_id(), "foobar");
        assert_eq!(document.ttl(), Some(2592000));
        assert_eq!(document.etag(), Some("\"0001\""));
        assert_eq!(document.timestamp(), Some(1589587200));
        assert_eq!(document.fields().count(), 3);
        assert_eq!(
            document.deserialize::<Order>().unwrap(),
            Order { id: "foobar".into(), subtotal: 419.4589 }
        );
    }

    #[test]
    fn test_record_without_id_is_rejected() {
        let err = Database::from_native(json!({ "name": "no id" })).unwrap_err();
        assert_eq!(err.status_code, status::INTERNAL_SERVER_ERROR);

        let err = Document::from_native(json!(["not", "an", "object"])).unwrap_err();
        assert_eq!(err.status_code, status::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_collection_decodes_policies() {
        let collection = Collection::from_native(json!({
            "id": "orders",
            "partitionKey": { "paths": ["/owner_id"], "kind": "Hash", "version": 2 },
            "uniqueKeyPolicy": { "uniqueKeys": [{ "paths": ["/email"] }] },
        }))
        .unwrap();

        assert!(collection.is_partitioned());
        assert_eq!(
            collection.partition_key_policy(),
            Some(PartitionKeyPolicy::new(["/owner_id"]))
        );
        assert_eq!(collection.unique_key_policy().unwrap().unique_keys.len(), 1);

        let plain = Collection::from_native(json!({ "id": "plain" })).unwrap();
        assert!(!plain.is_partitioned());
        assert!(plain.unique_key_policy().is_none());
    }
}
