//! Typed repository over a [`RecordStore`]
//!
//! [`ItemRepo<K>`] turns kind-agnostic records into [`OverlayItem<K>`] and
//! back, so engine code never touches the record layout.

use crate::batch::{ListVersion, RecordBatch};
use crate::error::StoreResult;
use crate::store::RecordStore;
use ovl_model::{decode, decode_all, encode, ExampleId, ItemId, ItemKind, OverlayItem};
use std::marker::PhantomData;
use std::sync::Arc;

/// Typed rows of one example list plus their read version
#[derive(Debug, Clone)]
pub struct ItemScan<K: ItemKind> {
    pub items: Vec<OverlayItem<K>>,
    pub version: ListVersion,
}

/// Typed batch builder, encoded into a [`RecordBatch`] on commit
#[derive(Debug, Clone)]
pub struct ItemBatch<K: ItemKind> {
    guards: Vec<(ExampleId, ListVersion)>,
    exists: Vec<ItemId>,
    absent: Vec<ItemId>,
    puts: Vec<OverlayItem<K>>,
    deletes: Vec<ItemId>,
}

impl<K: ItemKind> Default for ItemBatch<K> {
    fn default() -> Self {
        Self {
            guards: Vec::new(),
            exists: Vec::new(),
            absent: Vec::new(),
            puts: Vec::new(),
            deletes: Vec::new(),
        }
    }
}

impl<K: ItemKind> ItemBatch<K> {
    /// Create empty batch
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require list version
    #[inline]
    #[must_use]
    pub fn expect_version(mut self, example: ExampleId, version: ListVersion) -> Self {
        self.guards.push((example, version));
        self
    }

    /// Require row to exist
    #[inline]
    #[must_use]
    pub fn expect_exists(mut self, id: ItemId) -> Self {
        self.exists.push(id);
        self
    }

    /// Require row to be absent
    #[inline]
    #[must_use]
    pub fn expect_absent(mut self, id: ItemId) -> Self {
        self.absent.push(id);
        self
    }

    /// Insert/replace row
    #[inline]
    #[must_use]
    pub fn put(mut self, item: OverlayItem<K>) -> Self {
        self.puts.push(item);
        self
    }

    /// Insert/replace several rows
    #[inline]
    #[must_use]
    pub fn put_all(mut self, items: impl IntoIterator<Item = OverlayItem<K>>) -> Self {
        self.puts.extend(items);
        self
    }

    /// Delete row
    #[inline]
    #[must_use]
    pub fn delete(mut self, id: ItemId) -> Self {
        self.deletes.push(id);
        self
    }

    /// Whether the batch writes nothing
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.puts.is_empty() && self.deletes.is_empty()
    }

    /// Encode into a record batch
    ///
    /// # Errors
    /// Returns error if a payload fails to serialize
    pub fn into_record_batch(self) -> StoreResult<RecordBatch> {
        let mut batch = RecordBatch::new(K::TAG);
        for (example, version) in self.guards {
            batch = batch.expect_version(example, version);
        }
        for id in self.exists {
            batch = batch.expect_exists(id);
        }
        for id in self.absent {
            batch = batch.expect_absent(id);
        }
        for item in &self.puts {
            batch = batch.put(encode(item)?);
        }
        for id in self.deletes {
            batch = batch.delete(id);
        }
        Ok(batch)
    }
}

/// Typed access to one kind table
#[derive(Debug)]
pub struct ItemRepo<K: ItemKind> {
    store: Arc<dyn RecordStore>,
    _kind: PhantomData<K>,
}

impl<K: ItemKind> Clone for ItemRepo<K> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _kind: PhantomData,
        }
    }
}

impl<K: ItemKind> ItemRepo<K> {
    /// Wrap a store
    #[inline]
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            _kind: PhantomData,
        }
    }

    /// Underlying store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Point lookup
    ///
    /// # Errors
    /// Returns error on backend or decode failure
    pub async fn get(&self, id: ItemId) -> StoreResult<Option<OverlayItem<K>>> {
        match self.store.get(K::TAG, id).await? {
            Some(record) => Ok(Some(decode(record)?)),
            None => Ok(None),
        }
    }

    /// Unordered rows of one example
    ///
    /// # Errors
    /// Returns error on backend or decode failure
    pub async fn scan_example(&self, example: ExampleId) -> StoreResult<ItemScan<K>> {
        let scan = self.store.scan_example(K::TAG, example).await?;
        Ok(ItemScan {
            items: decode_all(scan.records)?,
            version: scan.version,
        })
    }

    /// Rows derived from `parent`, across all examples
    ///
    /// # Errors
    /// Returns error on backend or decode failure
    pub async fn delta_children(&self, parent: ItemId) -> StoreResult<Vec<OverlayItem<K>>> {
        let records = self.store.scan_delta_children(K::TAG, parent).await?;
        Ok(decode_all(records)?)
    }

    /// Commit a typed batch atomically
    ///
    /// # Errors
    /// Returns error if a precondition fails or the backend rejects the batch
    pub async fn commit(&self, batch: ItemBatch<K>) -> StoreResult<()> {
        let batch = batch.into_record_batch()?;
        self.store.commit(batch).await
    }
}
