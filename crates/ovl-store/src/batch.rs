//! Atomic write batches
//!
//! A [`RecordBatch`] is a set of preconditions plus mutations against one
//! kind table. Stores apply it all-or-nothing: every precondition is checked
//! before any mutation is visible.

use ovl_model::{ExampleId, ItemId, KindTag, StoredRecord};
use smallvec::SmallVec;

/// Version counter of one example's list within one kind table
///
/// Bumped by every committed mutation touching a row of that list.
pub type ListVersion = u64;

/// Condition that must hold at commit time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// The example's list is still at the version the plan was built from
    ListVersion {
        example: ExampleId,
        version: ListVersion,
    },

    /// Row exists
    Exists(ItemId),

    /// Row does not exist
    Absent(ItemId),
}

/// Row write
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Insert or replace
    Put(StoredRecord),

    /// Remove (missing rows are ignored)
    Delete(ItemId),
}

impl Mutation {
    /// Row id this mutation writes
    #[inline]
    #[must_use]
    pub fn id(&self) -> ItemId {
        match self {
            Self::Put(record) => record.id,
            Self::Delete(id) => *id,
        }
    }
}

/// All-or-nothing write against one kind table
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBatch {
    kind: KindTag,
    preconditions: SmallVec<[Precondition; 2]>,
    mutations: SmallVec<[Mutation; 4]>,
}

impl RecordBatch {
    /// Create empty batch for `kind`
    #[inline]
    #[must_use]
    pub fn new(kind: KindTag) -> Self {
        Self {
            kind,
            preconditions: SmallVec::new(),
            mutations: SmallVec::new(),
        }
    }

    /// Require the example list to be at `version`
    #[inline]
    #[must_use]
    pub fn expect_version(mut self, example: ExampleId, version: ListVersion) -> Self {
        self.preconditions
            .push(Precondition::ListVersion { example, version });
        self
    }

    /// Require row to exist
    #[inline]
    #[must_use]
    pub fn expect_exists(mut self, id: ItemId) -> Self {
        self.preconditions.push(Precondition::Exists(id));
        self
    }

    /// Require row to be absent
    #[inline]
    #[must_use]
    pub fn expect_absent(mut self, id: ItemId) -> Self {
        self.preconditions.push(Precondition::Absent(id));
        self
    }

    /// Add insert/replace
    #[inline]
    #[must_use]
    pub fn put(mut self, record: StoredRecord) -> Self {
        self.mutations.push(Mutation::Put(record));
        self
    }

    /// Add delete
    #[inline]
    #[must_use]
    pub fn delete(mut self, id: ItemId) -> Self {
        self.mutations.push(Mutation::Delete(id));
        self
    }

    /// Kind table
    #[inline]
    #[must_use]
    pub fn kind(&self) -> KindTag {
        self.kind
    }

    /// Preconditions
    #[inline]
    #[must_use]
    pub fn preconditions(&self) -> &[Precondition] {
        &self.preconditions
    }

    /// Mutations
    #[inline]
    #[must_use]
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    /// Whether the batch writes nothing
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}
