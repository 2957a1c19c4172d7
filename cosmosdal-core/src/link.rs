//! Hierarchical resource links.
//!
//! Links are the addresses the store client understands. They are derived from ids only,
//! never validated against the store, and are the single source of truth for every manager.

/// Returns the link of a database, `dbs/{database_id}`.
pub fn database_link(database_id: &str) -> String {
    format!("dbs/{database_id}")
}

/// Returns the link of a collection, `dbs/{database_id}/colls/{collection_id}`.
pub fn collection_link(database_id: &str, collection_id: &str) -> String {
    format!("{}/colls/{collection_id}", database_link(database_id))
}

/// Returns the link of a document, `dbs/{database_id}/colls/{collection_id}/docs/{document_id}`.
pub fn document_link(database_id: &str, collection_id: &str, document_id: &str) -> String {
    format!("{}/docs/{document_id}", collection_link(database_id, collection_id))
}
