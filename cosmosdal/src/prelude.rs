//! Convenient re-exports of commonly used types from cosmosdal.
//!
//! ```ignore
//! use cosmosdal::prelude::*;
//! ```
//!
//! This provides access to:
//! - The [`CosmosDal`] entry point and the three managers
//! - Resource models and the [`Resource`] trait
//! - Collection, query and feed options
//! - Pagination handles
//! - Error and result types

pub use crate::CosmosDal;

pub use cosmosdal_core::{
    client::{StoreClient, StoreClientBuilder, StoreCursor},
    cursor::{CursorState, DocumentQueryResults, QueryResults},
    disposable::Disposable,
    error::{
        CollectionError, CollectionResult, CosmosDalError, DatabaseError, DatabaseResult,
        DocumentError, DocumentResult, StoreError, StoreResult,
    },
    link::{collection_link, database_link, document_link},
    manager::{CollectionManager, DatabaseManager, DocumentManager},
    model::{Collection, Database, Document, NativeResource, Resource},
    options::{
        CollectionOptions, FeedOptions, MaxItemCount, PartitionKey, PartitionKeyPolicy,
        PartitionKind, QueryOptions, QueryParameter, QuerySpec, RequestOptions, UniqueKey,
        UniqueKeyPolicy,
    },
};
