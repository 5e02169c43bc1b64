//! Store-backed ordered collection manager
//!
//! Every mutation follows the same loop: scan the example's list, plan a
//! [`Splice`] against it, commit the splice guarded by the scan's version.
//! A version conflict means someone else changed the list in between, so
//! the loop re-scans and re-plans, up to the configured retry limit.

use crate::error::{OverlayError, OverlayResult};
use crate::ordering::{OrderedList, Position, Splice};
use ovl_model::{ExampleId, ItemId, ItemKind, OverlayItem};
use ovl_store::{ItemBatch, ItemRepo, RecordStore};
use std::future::Future;
use std::sync::Arc;

/// Ordered list operations for one item kind
#[derive(Debug)]
pub struct ListManager<K: ItemKind> {
    repo: ItemRepo<K>,
    max_retries: u32,
}

impl<K: ItemKind> Clone for ListManager<K> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            max_retries: self.max_retries,
        }
    }
}

impl<K: ItemKind> ListManager<K> {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, max_retries: u32) -> Self {
        Self {
            repo: ItemRepo::new(store),
            max_retries: max_retries.max(1),
        }
    }

    #[inline]
    #[must_use]
    pub fn repo(&self) -> &ItemRepo<K> {
        &self.repo
    }

    /// Fetch one row
    ///
    /// # Errors
    /// Returns `NotFound` if the row does not exist
    pub async fn get(&self, id: ItemId) -> OverlayResult<OverlayItem<K>> {
        self.repo
            .get(id)
            .await?
            .ok_or_else(|| OverlayError::not_found(K::TAG, id))
    }

    /// Rows of `example` in list order
    ///
    /// # Errors
    /// Returns `CorruptList` if the stored links do not form one chain
    pub async fn scan_ordered(&self, example: ExampleId) -> OverlayResult<OrderedList<K>> {
        let scan = self.repo.scan_example(example).await?;
        OrderedList::from_scan(example, scan).map_err(|source| {
            tracing::error!(kind = %K::TAG, %example, error = %source, "corrupted list");
            OverlayError::CorruptList {
                kind: K::TAG,
                example,
                source,
            }
        })
    }

    /// Commit a planned splice under the version it was planned at
    pub(crate) async fn commit_splice(
        &self,
        list: &OrderedList<K>,
        splice: Splice<K>,
    ) -> OverlayResult<()> {
        tracing::debug!(
            kind = %K::TAG,
            example = %list.example(),
            version = list.version(),
            puts = splice.puts.len(),
            deletes = splice.deletes.len(),
            "committing splice"
        );
        self.repo
            .commit(splice.into_batch(list.example(), list.version()))
            .await?;
        Ok(())
    }

    /// Run `attempt` until it stops failing with a version conflict
    pub(crate) async fn retry<T, F, Fut>(
        &self,
        operation: &'static str,
        mut attempt: F,
    ) -> OverlayResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = OverlayResult<T>>,
    {
        for round in 1..=self.max_retries {
            match attempt().await {
                Err(e) if e.is_conflict() => {
                    metrics::counter!("ovl_commit_conflicts_total", "kind" => K::TAG.as_str())
                        .increment(1);
                    tracing::debug!(
                        kind = %K::TAG,
                        operation,
                        round,
                        error = %e,
                        "re-planning after conflict"
                    );
                }
                other => return other,
            }
        }
        tracing::warn!(
            kind = %K::TAG,
            operation,
            attempts = self.max_retries,
            "giving up after repeated conflicts"
        );
        Err(OverlayError::RetriesExhausted {
            operation,
            attempts: self.max_retries,
        })
    }

    /// Link `item` after the tail of its example's list
    ///
    /// # Errors
    /// Returns error if the list is corrupted or the store rejects the write
    pub async fn append(&self, item: OverlayItem<K>) -> OverlayResult<OverlayItem<K>> {
        let example = item.example_id;
        let item = &item;
        self.retry("append", move || async move {
            let list = self.scan_ordered(example).await?;
            let splice = list.plan_append(item.clone());
            let linked = splice
                .puts
                .iter()
                .find(|row| row.id == item.id)
                .cloned()
                .unwrap_or_else(|| item.clone());
            self.commit_splice(&list, splice).await?;
            Ok(linked)
        })
        .await
    }

    /// Unlink and delete a row, bridging its neighbours
    ///
    /// # Errors
    /// Returns `NotFound` if the row does not exist
    pub async fn remove(&self, id: ItemId) -> OverlayResult<OverlayItem<K>> {
        self.retry("remove", move || async move {
            let item = self.get(id).await?;
            let list = self.scan_ordered(item.example_id).await?;
            let splice = list
                .plan_remove(id)
                .ok_or_else(|| OverlayError::not_found(K::TAG, id))?;
            self.commit_splice(&list, splice).await?;
            Ok(item)
        })
        .await
    }

    /// Move `id` before or after `target` within `example`
    ///
    /// Returns `false` when the row was already in place and nothing was
    /// written.
    ///
    /// # Errors
    /// - `SelfReferentialMove` if `id == target`
    /// - `NotFound` if `id` does not exist
    /// - `ExampleMismatch` if `id` is not part of `example`
    /// - `InvalidTarget` if `target` is not part of `example`
    pub async fn move_relative(
        &self,
        example: ExampleId,
        id: ItemId,
        target: ItemId,
        position: Position,
    ) -> OverlayResult<bool> {
        if id == target {
            return Err(OverlayError::SelfReferentialMove(id));
        }
        self.retry("move", move || async move {
            let list = self.scan_ordered(example).await?;
            if !list.contains(id) {
                // Distinguish a missing row from a row of another example
                self.get(id).await?;
                return Err(OverlayError::ExampleMismatch {
                    kind: K::TAG,
                    id,
                    example,
                });
            }
            let splice = list.plan_move(id, target, position)?;
            if splice.is_noop() {
                return Ok(false);
            }
            self.commit_splice(&list, splice).await?;
            Ok(true)
        })
        .await
    }

    /// Rewrite one row in place, keeping its links
    ///
    /// `edit` returns whether it changed anything; unchanged rows are not
    /// written. Returns the row as stored afterwards.
    ///
    /// # Errors
    /// Returns `NotFound` if the row does not exist, or whatever `edit` returns
    pub async fn rewrite<F>(&self, id: ItemId, edit: F) -> OverlayResult<OverlayItem<K>>
    where
        F: Fn(&mut OverlayItem<K>) -> OverlayResult<bool> + Sync,
    {
        let edit = &edit;
        self.retry("rewrite", move || async move {
            let current = self.get(id).await?;
            let list = self.scan_ordered(current.example_id).await?;
            let mut item = list
                .get(id)
                .cloned()
                .ok_or_else(|| OverlayError::not_found(K::TAG, id))?;
            if !edit(&mut item)? {
                return Ok(item);
            }
            let batch = ItemBatch::new()
                .expect_version(list.example(), list.version())
                .expect_exists(id)
                .put(item.clone());
            self.repo.commit(batch).await?;
            Ok(item)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovl_model::{Header, KeyValueFields};
    use ovl_store::MemoryStore;

    fn manager(store: &Arc<MemoryStore>) -> ListManager<Header> {
        ListManager::new(Arc::clone(store) as Arc<dyn RecordStore>, 4)
    }

    async fn seed(lists: &ListManager<Header>, example: ExampleId, keys: &[&str]) -> Vec<ItemId> {
        let mut ids = Vec::new();
        for key in keys {
            let item = OverlayItem::new(example, KeyValueFields::new(*key, "v"));
            ids.push(lists.append(item).await.unwrap().id);
        }
        ids
    }

    async fn keys(lists: &ListManager<Header>, example: ExampleId) -> Vec<String> {
        lists
            .scan_ordered(example)
            .await
            .unwrap()
            .iter()
            .map(|i| i.fields.key.clone())
            .collect()
    }

    #[tokio::test]
    async fn append_builds_list_in_call_order() {
        let store = Arc::new(MemoryStore::new());
        let lists = manager(&store);
        let example = ExampleId::new();
        seed(&lists, example, &["a", "b", "c"]).await;

        assert_eq!(keys(&lists, example).await, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn remove_head_and_tail() {
        let store = Arc::new(MemoryStore::new());
        let lists = manager(&store);
        let example = ExampleId::new();
        let ids = seed(&lists, example, &["a", "b", "c"]).await;

        lists.remove(ids[0]).await.unwrap();
        lists.remove(ids[2]).await.unwrap();
        assert_eq!(keys(&lists, example).await, vec!["b"]);

        let err = lists.remove(ids[0]).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn noop_move_issues_no_commit() {
        let store = Arc::new(MemoryStore::new());
        let lists = manager(&store);
        let example = ExampleId::new();
        let ids = seed(&lists, example, &["a", "b"]).await;
        let commits = store.commit_count();

        assert!(!lists
            .move_relative(example, ids[1], ids[0], Position::After)
            .await
            .unwrap());
        assert_eq!(store.commit_count(), commits);
    }

    #[tokio::test]
    async fn move_across_examples_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let lists = manager(&store);
        let (left, right) = (ExampleId::new(), ExampleId::new());
        let l = seed(&lists, left, &["a", "b"]).await;
        let r = seed(&lists, right, &["c"]).await;

        let err = lists
            .move_relative(left, l[0], r[0], Position::After)
            .await
            .unwrap_err();
        assert!(matches!(err, OverlayError::InvalidTarget { .. }));

        let err = lists
            .move_relative(left, r[0], l[0], Position::After)
            .await
            .unwrap_err();
        assert!(matches!(err, OverlayError::ExampleMismatch { .. }));
    }

    #[tokio::test]
    async fn rewrite_keeps_links() {
        let store = Arc::new(MemoryStore::new());
        let lists = manager(&store);
        let example = ExampleId::new();
        let ids = seed(&lists, example, &["a", "b"]).await;

        let updated = lists
            .rewrite(ids[0], |item| {
                item.fields.value = "changed".into();
                Ok(true)
            })
            .await
            .unwrap();
        assert_eq!(updated.next, Some(ids[1]));
        assert_eq!(keys(&lists, example).await, vec!["a", "b"]);
        assert_eq!(lists.get(ids[0]).await.unwrap().fields.value, "changed");
    }

    #[tokio::test]
    async fn unchanged_rewrite_skips_commit() {
        let store = Arc::new(MemoryStore::new());
        let lists = manager(&store);
        let ids = seed(&lists, ExampleId::new(), &["a"]).await;
        let commits = store.commit_count();

        lists.rewrite(ids[0], |_| Ok(false)).await.unwrap();
        assert_eq!(store.commit_count(), commits);
    }

    #[tokio::test]
    async fn retry_gives_up_after_limit() {
        let store = Arc::new(MemoryStore::new());
        let lists = manager(&store);
        let example = ExampleId::new();
        let mut rounds = 0;

        let err = lists
            .retry("test", || {
                rounds += 1;
                async move {
                    Err::<(), _>(OverlayError::Store(ovl_store::StoreError::Conflict {
                        kind: Header::TAG,
                        example,
                        expected: 0,
                        actual: 1,
                    }))
                }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, OverlayError::RetriesExhausted { attempts: 4, .. }));
        assert_eq!(rounds, 4);
    }
}
