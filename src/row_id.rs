//! Stable row identity for selection and focus tracking.
//!
//! Hosts may tag rows with `__rowId`; otherwise rows normally carry their
//! primary key under `<entity>id`. Rows with neither (aggregate queries,
//! link-entity projections) get an identity derived from their data:
//! non-metadata attributes sorted by name, joined as `key=value` pairs and
//! hashed. Identical rows in one batch are told apart by a `-N`
//! counter suffix.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::record::{ROW_ID_ATTRIBUTE, Record, is_metadata_key, is_truthy, value_text};

const HASH_PREFIX_LEN: usize = 16;

/// Attribute holding the primary key of `entity`'s rows.
pub fn primary_id_attribute(entity: &str) -> String {
    format!("{entity}id")
}

/// Identity of a single row, without collision handling: a host-assigned
/// `__rowId`, then the primary key, then the content hash.
pub fn row_identity(record: &Record, primary_entity: &str) -> String {
    [ROW_ID_ATTRIBUTE.to_string(), primary_id_attribute(primary_entity)]
        .iter()
        .find_map(|name| record.get(name).filter(|v| is_truthy(Some(v))))
        .map(value_text)
        .unwrap_or_else(|| content_hash(record))
}

/// Hash of the row's user data, independent of attribute order.
pub fn content_hash(record: &Record) -> String {
    let mut keys: Vec<&String> = record.keys().filter(|k| !is_metadata_key(k)).collect();
    keys.sort();

    let joined = keys
        .iter()
        .map(|k| {
            let value = record.get(k).map(value_text).unwrap_or_default();
            format!("{k}={value}")
        })
        .collect::<Vec<_>>()
        .join("|");

    let digest = Sha256::digest(joined.as_bytes());
    hex::encode(digest)[..HASH_PREFIX_LEN].to_string()
}

/// Identities for a batch of rows, unique within the batch.
pub fn assign_row_ids(records: &[Record], primary_entity: &str) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    records
        .iter()
        .map(|record| {
            let base = row_identity(record, primary_entity);
            let count = seen.entry(base.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                base
            } else {
                format!("{base}-{}", *count - 1)
            }
        })
        .collect()
}
