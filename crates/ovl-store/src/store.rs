//! Record store trait
//!
//! The engine only needs point lookups, scans by parent key and atomic
//! multi-row commits. [`RecordStore`] is that contract; it is object safe so
//! services can hold an `Arc<dyn RecordStore>`.

use crate::batch::{ListVersion, RecordBatch};
use crate::error::StoreResult;
use ovl_model::{ExampleId, ItemId, KindTag, StoredRecord};
use std::fmt::Debug;

/// Rows of one example list plus the version they were read at
#[derive(Debug, Clone, Default)]
pub struct ExampleScan {
    /// Rows in unspecified order (callers order them by their links)
    pub records: Vec<StoredRecord>,

    /// List version at read time
    pub version: ListVersion,
}

/// Transactional record store
///
/// # Contract
/// - reads observe every previously committed batch (read-your-writes)
/// - `commit` applies all mutations or none
/// - every committed mutation bumps the list version of each example whose
///   rows it wrote or removed
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync + Debug {
    /// Point lookup
    async fn get(&self, kind: KindTag, id: ItemId) -> StoreResult<Option<StoredRecord>>;

    /// All rows whose `example_id` is `example`
    async fn scan_example(&self, kind: KindTag, example: ExampleId) -> StoreResult<ExampleScan>;

    /// All rows whose `delta_parent_id` is `parent`, across every example
    async fn scan_delta_children(
        &self,
        kind: KindTag,
        parent: ItemId,
    ) -> StoreResult<Vec<StoredRecord>>;

    /// Apply a batch atomically
    async fn commit(&self, batch: RecordBatch) -> StoreResult<()>;
}
