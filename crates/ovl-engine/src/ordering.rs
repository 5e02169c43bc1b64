//! Ordered doubly-linked lists
//!
//! Rows of one example are stored unordered; order lives in their
//! `prev`/`next` links. [`OrderedList`] rebuilds that order from a scan
//! into an arena (a `Vec` in walk order plus an id index) and rejects any
//! list that is not a single well-formed chain.
//!
//! Mutations are *planned* here, not executed: every `plan_*` method returns
//! a [`Splice`] holding exactly the rows whose links change. The caller
//! commits the splice under the scan's list version, so a concurrent writer
//! turns into a conflict instead of a torn list.

use crate::error::OverlayError;
use ovl_model::{ExampleId, ItemId, ItemKind, OverlayItem};
use ovl_store::{ItemBatch, ItemScan, ListVersion};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};

/// Side of the move target to land on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Before,
    After,
}

/// Ways a stored list can fail to be a single chain
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListCorruption {
    #[error("row {id} belongs to example {actual}")]
    ForeignRow { id: ItemId, actual: ExampleId },

    #[error("no head among {count} rows")]
    NoHead { count: usize },

    #[error("{count} heads")]
    MultipleHeads { count: usize },

    #[error("row {0} visited twice")]
    Cycle(ItemId),

    #[error("row {from} links to missing row {to}")]
    Dangling { from: ItemId, to: ItemId },

    #[error("row {from} links forward to {to}, but {to} links back to {back:?}")]
    BrokenBacklink {
        from: ItemId,
        to: ItemId,
        back: Option<ItemId>,
    },

    #[error("walk reached {reached} of {total} rows")]
    Unreached { reached: usize, total: usize },
}

/// Summary of a verified list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderReport {
    pub example: ExampleId,
    pub count: usize,
    pub head: Option<ItemId>,
    pub tail: Option<ItemId>,
    pub version: ListVersion,
}

/// Rows to write and remove for one list mutation
#[derive(Debug, Clone, PartialEq)]
pub struct Splice<K: ItemKind> {
    pub puts: SmallVec<[OverlayItem<K>; 4]>,
    pub deletes: SmallVec<[ItemId; 1]>,
}

impl<K: ItemKind> Default for Splice<K> {
    fn default() -> Self {
        Self {
            puts: SmallVec::new(),
            deletes: SmallVec::new(),
        }
    }
}

impl<K: ItemKind> Splice<K> {
    /// Nothing to write
    #[inline]
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.puts.is_empty() && self.deletes.is_empty()
    }

    /// Turn into a batch guarded by the list version the plan was made at
    #[must_use]
    pub fn into_batch(self, example: ExampleId, version: ListVersion) -> ItemBatch<K> {
        let mut batch = ItemBatch::new()
            .expect_version(example, version)
            .put_all(self.puts);
        for id in self.deletes {
            batch = batch.expect_exists(id).delete(id);
        }
        batch
    }
}

/// Arena of one example's rows in list order
#[derive(Debug, Clone)]
pub struct OrderedList<K: ItemKind> {
    example: ExampleId,
    slots: Vec<OverlayItem<K>>,
    index: HashMap<ItemId, usize>,
    version: ListVersion,
}

impl<K: ItemKind> OrderedList<K> {
    /// Empty list at version 0
    #[must_use]
    pub fn empty(example: ExampleId) -> Self {
        Self {
            example,
            slots: Vec::new(),
            index: HashMap::new(),
            version: 0,
        }
    }

    /// Order a scan by walking its links from the unique head
    ///
    /// # Errors
    /// Returns [`ListCorruption`] unless the rows form exactly one chain
    /// covering every row
    pub fn from_scan(example: ExampleId, scan: ItemScan<K>) -> Result<Self, ListCorruption> {
        let ItemScan { items, version } = scan;
        let total = items.len();

        if let Some(foreign) = items.iter().find(|item| item.example_id != example) {
            return Err(ListCorruption::ForeignRow {
                id: foreign.id,
                actual: foreign.example_id,
            });
        }

        let mut by_id: HashMap<ItemId, OverlayItem<K>> =
            items.into_iter().map(|item| (item.id, item)).collect();
        if by_id.is_empty() {
            return Ok(Self {
                version,
                ..Self::empty(example)
            });
        }

        let heads: SmallVec<[ItemId; 2]> = by_id
            .values()
            .filter(|item| item.is_head())
            .map(|item| item.id)
            .collect();
        let mut cursor = match heads.as_slice() {
            [] => return Err(ListCorruption::NoHead { count: total }),
            [head] => Some(*head),
            many => return Err(ListCorruption::MultipleHeads { count: many.len() }),
        };

        let mut slots = Vec::with_capacity(total);
        let mut index = HashMap::with_capacity(total);
        let mut visited = HashSet::with_capacity(total);
        let mut expected_prev = None;

        while let Some(id) = cursor {
            if !visited.insert(id) {
                return Err(ListCorruption::Cycle(id));
            }
            let Some(item) = by_id.remove(&id) else {
                // Only reachable through a `next` link; the head always exists.
                let from = expected_prev.unwrap_or(id);
                return Err(ListCorruption::Dangling { from, to: id });
            };
            if item.prev != expected_prev {
                return Err(ListCorruption::BrokenBacklink {
                    from: expected_prev.unwrap_or(id),
                    to: id,
                    back: item.prev,
                });
            }
            expected_prev = Some(id);
            cursor = item.next;
            index.insert(id, slots.len());
            slots.push(item);
        }

        if slots.len() != total {
            return Err(ListCorruption::Unreached {
                reached: slots.len(),
                total,
            });
        }

        Ok(Self {
            example,
            slots,
            index,
            version,
        })
    }

    #[inline]
    #[must_use]
    pub fn example(&self) -> ExampleId {
        self.example
    }

    /// Version the scan was read at
    #[inline]
    #[must_use]
    pub fn version(&self) -> ListVersion {
        self.version
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Rows in list order
    #[inline]
    #[must_use]
    pub fn items(&self) -> &[OverlayItem<K>] {
        &self.slots
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &OverlayItem<K>> {
        self.slots.iter()
    }

    #[must_use]
    pub fn into_items(self) -> Vec<OverlayItem<K>> {
        self.slots
    }

    #[inline]
    #[must_use]
    pub fn get(&self, id: ItemId) -> Option<&OverlayItem<K>> {
        self.index.get(&id).map(|&slot| &self.slots[slot])
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, id: ItemId) -> bool {
        self.index.contains_key(&id)
    }

    /// Zero-based position in list order
    #[inline]
    #[must_use]
    pub fn position(&self, id: ItemId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    #[inline]
    #[must_use]
    pub fn head(&self) -> Option<&OverlayItem<K>> {
        self.slots.first()
    }

    #[inline]
    #[must_use]
    pub fn tail(&self) -> Option<&OverlayItem<K>> {
        self.slots.last()
    }

    #[must_use]
    pub fn report(&self) -> OrderReport {
        OrderReport {
            example: self.example,
            count: self.len(),
            head: self.head().map(|item| item.id),
            tail: self.tail().map(|item| item.id),
            version: self.version,
        }
    }

    /// Link `items` after the current tail, in the given order
    ///
    /// The new rows must belong to this list's example.
    #[must_use]
    pub fn plan_append_all(&self, items: impl IntoIterator<Item = OverlayItem<K>>) -> Splice<K> {
        let mut splice = Splice::default();
        let mut fresh: Vec<OverlayItem<K>> = items.into_iter().collect();
        if fresh.is_empty() {
            return splice;
        }

        let mut prev = self.tail().map(|tail| tail.id);
        if let (Some(tail), Some(first)) = (self.tail(), fresh.first()) {
            let mut relinked = tail.clone();
            relinked.next = Some(first.id);
            splice.puts.push(relinked);
        }

        let ids: Vec<ItemId> = fresh.iter().map(|item| item.id).collect();
        for (i, item) in fresh.iter_mut().enumerate() {
            debug_assert_eq!(item.example_id, self.example);
            item.prev = prev;
            item.next = ids.get(i + 1).copied();
            prev = Some(item.id);
        }
        splice.puts.extend(fresh);
        splice
    }

    /// Link one row after the current tail
    #[inline]
    #[must_use]
    pub fn plan_append(&self, item: OverlayItem<K>) -> Splice<K> {
        self.plan_append_all([item])
    }

    /// Unlink and delete `id`, bridging its neighbours
    ///
    /// Returns `None` if the row is not in this list.
    #[must_use]
    pub fn plan_remove(&self, id: ItemId) -> Option<Splice<K>> {
        let slot = self.position(id)?;
        let prev = slot.checked_sub(1).map(|p| &self.slots[p]);
        let next = self.slots.get(slot + 1);

        let mut splice = Splice::default();
        if let Some(prev) = prev {
            let mut relinked = prev.clone();
            relinked.next = next.map(|n| n.id);
            splice.puts.push(relinked);
        }
        if let Some(next) = next {
            let mut relinked = next.clone();
            relinked.prev = prev.map(|p| p.id);
            splice.puts.push(relinked);
        }
        splice.deletes.push(id);
        Some(splice)
    }

    /// Move `id` directly before or after `target`
    ///
    /// Only rows whose links change end up in the splice; moving a row to
    /// where it already is yields an empty splice.
    ///
    /// # Errors
    /// - [`OverlayError::SelfReferentialMove`] if `id == target`
    /// - [`OverlayError::InvalidTarget`] if `target` is not in this list
    /// - [`OverlayError::ExampleMismatch`] if `id` is not in this list
    pub fn plan_move(
        &self,
        id: ItemId,
        target: ItemId,
        position: Position,
    ) -> Result<Splice<K>, OverlayError> {
        if id == target {
            return Err(OverlayError::SelfReferentialMove(id));
        }
        let Some(moving) = self.position(id) else {
            return Err(OverlayError::ExampleMismatch {
                kind: K::TAG,
                id,
                example: self.example,
            });
        };
        if !self.contains(target) {
            return Err(OverlayError::InvalidTarget {
                target,
                example: self.example,
            });
        }

        let mut order: Vec<usize> = (0..self.slots.len()).filter(|&s| s != moving).collect();
        let anchor = order
            .iter()
            .position(|&s| self.slots[s].id == target)
            .ok_or(OverlayError::InvalidTarget {
                target,
                example: self.example,
            })?;
        let at = match position {
            Position::Before => anchor,
            Position::After => anchor + 1,
        };
        order.insert(at, moving);

        Ok(self.relink(&order))
    }

    // Rows whose links differ from what `order` implies
    fn relink(&self, order: &[usize]) -> Splice<K> {
        let mut splice = Splice::default();
        for (i, &slot) in order.iter().enumerate() {
            let prev = i.checked_sub(1).map(|p| self.slots[order[p]].id);
            let next = order.get(i + 1).map(|&n| self.slots[n].id);
            let item = &self.slots[slot];
            if item.prev != prev || item.next != next {
                let mut relinked = item.clone();
                relinked.prev = prev;
                relinked.next = next;
                splice.puts.push(relinked);
            }
        }
        splice
    }
}
