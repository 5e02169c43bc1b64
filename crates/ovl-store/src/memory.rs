//! In-memory record store
//!
//! All tables live behind one `parking_lot::RwLock`, which makes every commit
//! trivially atomic. Secondary indexes by example and by delta ancestor are
//! maintained inside the same critical section.

use crate::batch::{ListVersion, Mutation, Precondition, RecordBatch};
use crate::error::{StoreError, StoreResult};
use crate::store::{ExampleScan, RecordStore};
use dashmap::DashSet;
use ovl_model::{ExampleId, ItemId, KindTag, StoredRecord};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

type RowKey = (KindTag, ItemId);
type ListKey = (KindTag, ExampleId);

#[derive(Debug, Default)]
struct Tables {
    rows: HashMap<RowKey, StoredRecord>,
    by_example: HashMap<ListKey, BTreeSet<ItemId>>,
    by_delta_parent: HashMap<RowKey, BTreeSet<ItemId>>,
    versions: HashMap<ListKey, ListVersion>,
}

impl Tables {
    fn version(&self, key: ListKey) -> ListVersion {
        self.versions.get(&key).copied().unwrap_or(0)
    }

    fn unindex(&mut self, record: &StoredRecord) {
        let list = (record.kind, record.example_id);
        if let Some(ids) = self.by_example.get_mut(&list) {
            ids.remove(&record.id);
            if ids.is_empty() {
                self.by_example.remove(&list);
            }
        }
        if let Some(parent) = record.delta_parent_id {
            let key = (record.kind, parent);
            if let Some(ids) = self.by_delta_parent.get_mut(&key) {
                ids.remove(&record.id);
                if ids.is_empty() {
                    self.by_delta_parent.remove(&key);
                }
            }
        }
    }

    fn index(&mut self, record: &StoredRecord) {
        self.by_example
            .entry((record.kind, record.example_id))
            .or_default()
            .insert(record.id);
        if let Some(parent) = record.delta_parent_id {
            self.by_delta_parent
                .entry((record.kind, parent))
                .or_default()
                .insert(record.id);
        }
    }

    fn check(&self, batch: &RecordBatch) -> StoreResult<()> {
        let kind = batch.kind();
        for pre in batch.preconditions() {
            match *pre {
                Precondition::ListVersion { example, version } => {
                    let actual = self.version((kind, example));
                    if actual != version {
                        return Err(StoreError::Conflict {
                            kind,
                            example,
                            expected: version,
                            actual,
                        });
                    }
                }
                Precondition::Exists(id) => {
                    if !self.rows.contains_key(&(kind, id)) {
                        return Err(StoreError::MissingRow { kind, id });
                    }
                }
                Precondition::Absent(id) => {
                    if self.rows.contains_key(&(kind, id)) {
                        return Err(StoreError::RowExists { kind, id });
                    }
                }
            }
        }

        for mutation in batch.mutations() {
            let Mutation::Put(record) = mutation else {
                continue;
            };
            if record.kind != kind {
                return Err(StoreError::KindMismatch {
                    id: record.id,
                    expected: kind,
                    actual: record.kind,
                });
            }
            let own = Some(record.id);
            if record.prev == own || record.next == own || record.delta_parent_id == own {
                return Err(StoreError::Invariant(format!(
                    "{kind} row {} references itself",
                    record.id
                )));
            }
            if let Some(existing) = self.rows.get(&(kind, record.id)) {
                if existing.example_id != record.example_id {
                    return Err(StoreError::Invariant(format!(
                        "{kind} row {} cannot move from example {} to {}",
                        record.id, existing.example_id, record.example_id
                    )));
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, batch: RecordBatch) {
        let kind = batch.kind();
        let mut touched: HashSet<ExampleId> = HashSet::new();

        for mutation in batch.mutations() {
            match mutation {
                Mutation::Put(record) => {
                    if let Some(old) = self.rows.remove(&(kind, record.id)) {
                        self.unindex(&old);
                    }
                    self.index(record);
                    touched.insert(record.example_id);
                    self.rows.insert((kind, record.id), record.clone());
                }
                Mutation::Delete(id) => {
                    if let Some(old) = self.rows.remove(&(kind, *id)) {
                        self.unindex(&old);
                        touched.insert(old.example_id);
                    }
                }
            }
        }

        for example in touched {
            *self.versions.entry((kind, example)).or_insert(0) += 1;
        }
    }
}

/// In-memory [`RecordStore`]
///
/// Also supports failure injection: commits writing a row registered with
/// [`MemoryStore::fail_writes_to`] are rejected with a backend error.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    failing: DashSet<ItemId>,
    commits: AtomicU64,
}

impl MemoryStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every future commit that writes `id`
    pub fn fail_writes_to(&self, id: ItemId) {
        self.failing.insert(id);
    }

    /// Stop injecting failures
    pub fn clear_failures(&self) {
        self.failing.clear();
    }

    /// Number of successfully committed batches
    #[inline]
    #[must_use]
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Total rows of `kind`
    #[must_use]
    pub fn row_count(&self, kind: KindTag) -> usize {
        self.tables
            .read()
            .rows
            .keys()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    fn commit_sync(&self, batch: RecordBatch) -> StoreResult<()> {
        if let Some(id) = batch
            .mutations()
            .iter()
            .map(Mutation::id)
            .find(|id| self.failing.contains(id))
        {
            return Err(StoreError::Backend(format!("injected write failure for row {id}")));
        }

        let mut tables = self.tables.write();
        tables.check(&batch)?;
        tracing::trace!(
            kind = %batch.kind(),
            mutations = batch.mutations().len(),
            "committing batch"
        );
        tables.apply(batch);
        self.commits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryStore {
    async fn get(&self, kind: KindTag, id: ItemId) -> StoreResult<Option<StoredRecord>> {
        Ok(self.tables.read().rows.get(&(kind, id)).cloned())
    }

    async fn scan_example(&self, kind: KindTag, example: ExampleId) -> StoreResult<ExampleScan> {
        let tables = self.tables.read();
        let records = tables
            .by_example
            .get(&(kind, example))
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| tables.rows.get(&(kind, *id)).cloned())
                    .collect()
            })
            .unwrap_or_default();
        Ok(ExampleScan {
            records,
            version: tables.version((kind, example)),
        })
    }

    async fn scan_delta_children(
        &self,
        kind: KindTag,
        parent: ItemId,
    ) -> StoreResult<Vec<StoredRecord>> {
        let tables = self.tables.read();
        Ok(tables
            .by_delta_parent
            .get(&(kind, parent))
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| tables.rows.get(&(kind, *id)).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn commit(&self, batch: RecordBatch) -> StoreResult<()> {
        self.commit_sync(batch)
    }
}
