//! Error types for the record store

use ovl_model::{ExampleId, ItemId, KindTag, RecordError};

/// Record store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// List version moved since it was read (optimistic concurrency failure)
    #[error("list version conflict on {kind} list of example {example}: expected {expected}, found {actual}")]
    Conflict {
        kind: KindTag,
        example: ExampleId,
        expected: u64,
        actual: u64,
    },

    /// Row required by the batch does not exist
    #[error("{kind} row {id} does not exist")]
    MissingRow { kind: KindTag, id: ItemId },

    /// Row required to be absent already exists
    #[error("{kind} row {id} already exists")]
    RowExists { kind: KindTag, id: ItemId },

    /// Record submitted to another kind's table
    #[error("record {id} of kind {actual} submitted to {expected} table")]
    KindMismatch {
        id: ItemId,
        expected: KindTag,
        actual: KindTag,
    },

    /// Write would break a structural rule of the store
    #[error("store invariant violated: {0}")]
    Invariant(String),

    /// Backend failure
    #[error("backend error: {0}")]
    Backend(String),

    /// Record codec error
    #[error("record error: {0}")]
    Record(#[from] RecordError),
}

impl StoreError {
    /// Check if the failed operation may succeed when re-planned
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
