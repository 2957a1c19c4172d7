//! Parsing of resource links back into ids.

use cosmosdal_core::error::{StoreError, StoreResult};

/// Characters the store does not accept in a resource id.
const RESERVED: [char; 4] = ['/', '\\', '?', '#'];

pub(crate) fn validate_id(kind: &str, id: &str) -> StoreResult<()> {
    if id.is_empty() {
        return Err(StoreError::bad_request(format!("The {kind} id must not be empty.")));
    }
    if id.ends_with(' ') || id.contains(RESERVED) {
        return Err(StoreError::bad_request(format!(
            "The {kind} id '{id}' contains invalid characters."
        )));
    }
    Ok(())
}

fn segments<'l>(link: &'l str, expected: &[&str]) -> StoreResult<Vec<&'l str>> {
    let parts = link.trim_matches('/').split('/').collect::<Vec<_>>();
    let malformed = || StoreError::bad_request(format!("The resource link '{link}' is malformed."));

    if parts.len() != expected.len() * 2 {
        return Err(malformed());
    }

    parts
        .chunks(2)
        .zip(expected)
        .map(|(pair, kind)| match pair {
            [prefix, id] if prefix == kind && !id.is_empty() => Ok(*id),
            _ => Err(malformed()),
        })
        .collect()
}

/// Parses `dbs/{db}`.
pub(crate) fn database(link: &str) -> StoreResult<String> {
    let ids = segments(link, &["dbs"])?;
    Ok(ids[0].to_string())
}

/// Parses `dbs/{db}/colls/{coll}`.
pub(crate) fn collection(link: &str) -> StoreResult<(String, String)> {
    let ids = segments(link, &["dbs", "colls"])?;
    Ok((ids[0].to_string(), ids[1].to_string()))
}

/// Parses `dbs/{db}/colls/{coll}/docs/{doc}`.
pub(crate) fn document(link: &str) -> StoreResult<(String, String, String)> {
    let ids = segments(link, &["dbs", "colls", "docs"])?;
    Ok((ids[0].to_string(), ids[1].to_string(), ids[2].to_string()))
}
