//! Stored record layout
//!
//! Every kind is persisted through the same [`StoredRecord`] shape: the
//! ordering/ancestry columns are shared, the kind payload is JSON. One pair of
//! generic functions ([`encode`], [`decode`]) converts between the typed
//! [`OverlayItem`] and the record for all kinds.

use crate::id::{ExampleId, ItemId};
use crate::item::OverlayItem;
use crate::kind::{ItemKind, KindTag};
use serde::{Deserialize, Serialize};

/// Persisted row
///
/// `delta_parent_id`, `prev` and `next` are plain nullable columns; the
/// record store enforces no referential constraint on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub kind: KindTag,
    pub id: ItemId,
    pub example_id: ExampleId,
    #[serde(default)]
    pub delta_parent_id: Option<ItemId>,
    #[serde(default)]
    pub prev: Option<ItemId>,
    #[serde(default)]
    pub next: Option<ItemId>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub overridden: bool,
    pub payload: serde_json::Value,
}

/// Errors converting between records and typed items
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// Record belongs to a different kind table
    #[error("record {id} is a {actual}, expected {expected}")]
    KindMismatch {
        id: ItemId,
        expected: KindTag,
        actual: KindTag,
    },

    /// Payload could not be (de)serialized
    #[error("payload codec error for {kind} record: {source}")]
    Payload {
        kind: KindTag,
        #[source]
        source: serde_json::Error,
    },
}

/// Encode a typed item into its stored record
///
/// # Errors
/// Returns error if the payload fails to serialize
pub fn encode<K: ItemKind>(item: &OverlayItem<K>) -> Result<StoredRecord, RecordError> {
    let payload = serde_json::to_value(&item.fields).map_err(|source| RecordError::Payload {
        kind: K::TAG,
        source,
    })?;
    Ok(StoredRecord {
        kind: K::TAG,
        id: item.id,
        example_id: item.example_id,
        delta_parent_id: item.delta_parent_id,
        prev: item.prev,
        next: item.next,
        overridden: item.overridden,
        payload,
    })
}

/// Decode a stored record into a typed item
///
/// # Errors
/// Returns error if the record is of another kind or the payload is invalid
pub fn decode<K: ItemKind>(record: StoredRecord) -> Result<OverlayItem<K>, RecordError> {
    if record.kind != K::TAG {
        return Err(RecordError::KindMismatch {
            id: record.id,
            expected: K::TAG,
            actual: record.kind,
        });
    }
    let fields = serde_json::from_value(record.payload).map_err(|source| RecordError::Payload {
        kind: K::TAG,
        source,
    })?;
    Ok(OverlayItem {
        id: record.id,
        example_id: record.example_id,
        delta_parent_id: record.delta_parent_id,
        prev: record.prev,
        next: record.next,
        fields,
        overridden: record.overridden,
    })
}

/// Decode a batch of records, failing on the first bad one
///
/// # Errors
/// Returns the first decode error
pub fn decode_all<K: ItemKind>(
    records: impl IntoIterator<Item = StoredRecord>,
) -> Result<Vec<OverlayItem<K>>, RecordError> {
    records.into_iter().map(decode::<K>).collect()
}
