//! Identifier translation
//!
//! Callers address records through an `id` field; the store keeps identity
//! in `_id`. Every mapping crossing the accessor goes through these
//! functions: outbound before the store sees it, inbound before the caller
//! does.

use mongodb::bson::Document;

/// Identity field presented to callers
pub const EXTERNAL_ID: &str = "id";

/// Identity field used by the store
pub const NATIVE_ID: &str = "_id";

/// External → native.
///
/// An `id` key becomes `_id` and overwrites any `_id` already present.
/// Mappings without `id` pass through unchanged.
pub fn to_native(mapping: Document) -> Document {
    if !mapping.contains_key(EXTERNAL_ID) {
        return mapping;
    }

    let mut native = Document::new();
    let mut rest = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        match key.as_str() {
            EXTERNAL_ID => {
                native.insert(NATIVE_ID, value);
            }
            NATIVE_ID => {}
            _ => rest.push((key, value)),
        }
    }
    for (key, value) in rest {
        native.insert(key, value);
    }
    native
}

/// External → native for an optional mapping; absent becomes empty criteria.
pub fn criteria_to_native(criteria: Option<Document>) -> Document {
    criteria.map(to_native).unwrap_or_default()
}

/// Native → external.
///
/// `_id` is exposed as `id`, placed first. A literal `id` field already on
/// the record is overwritten by the derived one. Records without `_id` keep
/// their fields and gain no `id`.
pub fn to_external(record: Document) -> Document {
    let Some(native_id) = record.get(NATIVE_ID).cloned() else {
        return record;
    };

    let mut external = Document::new();
    external.insert(EXTERNAL_ID, native_id);
    for (key, value) in record {
        if key == NATIVE_ID || key == EXTERNAL_ID {
            continue;
        }
        external.insert(key, value);
    }
    external
}

/// Native → external for a lookup that may have found nothing.
pub fn maybe_to_external(record: Option<Document>) -> Option<Document> {
    record.map(to_external)
}

pub fn all_to_native(mappings: Vec<Document>) -> Vec<Document> {
    mappings.into_iter().map(to_native).collect()
}

pub fn all_to_external(records: Vec<Document>) -> Vec<Document> {
    records.into_iter().map(to_external).collect()
}
