//! Overlay view builder
//!
//! A delta example sees the origin example's rows through counterparts:
//! rows in the delta example whose `delta_parent_id` points at an origin
//! row. Counterparts are materialized lazily, the first time the overlay is
//! read, and from then on live in the delta example's own list, so the
//! delta example can reorder or customize them without touching the origin.

use crate::classify::{resolve_source, Source};
use crate::error::{OverlayError, OverlayResult};
use crate::lists::ListManager;
use crate::ordering::OrderedList;
use crate::resolver::ExampleResolver;
use ovl_model::{ExampleId, ItemId, ItemKind, OverlayItem};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// One row of a delta example's overlay
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(bound(serialize = "K::Fields: Serialize"))]
pub struct OverlayRow<K: ItemKind> {
    pub id: ItemId,
    pub delta_parent_id: Option<ItemId>,

    /// Values in effect for the delta example
    pub fields: K::Fields,

    /// Ancestor's current values, for customized or delta-native linked rows
    pub origin: Option<K::Fields>,

    pub source: Source,
}

/// Origin rows with no counterpart in `delta`, cloned into it in origin order
#[must_use]
pub fn missing_counterparts<K: ItemKind>(
    origin: &OrderedList<K>,
    delta: &OrderedList<K>,
) -> Vec<OverlayItem<K>> {
    let covered: HashSet<ItemId> = delta.iter().filter_map(|row| row.delta_parent_id).collect();
    origin
        .iter()
        .filter(|row| !covered.contains(&row.id))
        .map(|row| OverlayItem::counterpart_of(row, delta.example()))
        .collect()
}

/// Classify `delta`'s rows against `origin` in delta order
///
/// When several rows share an ancestor, pristine ones are hidden behind the
/// customized ones, and only the first pristine one is kept otherwise.
#[must_use]
pub fn compose_rows<K: ItemKind>(
    origin: &OrderedList<K>,
    delta: &OrderedList<K>,
    delta_is_version: bool,
) -> Vec<OverlayRow<K>> {
    let ancestor_of = |row: &OverlayItem<K>| row.delta_parent_id.and_then(|id| origin.get(id));

    let classified: Vec<(&OverlayItem<K>, Source)> = delta
        .iter()
        .map(|row| (row, resolve_source(row, ancestor_of(row), delta_is_version)))
        .collect();

    let customized: HashSet<ItemId> = classified
        .iter()
        .filter(|(_, source)| !source.is_pristine())
        .filter_map(|(row, _)| row.delta_parent_id)
        .collect();

    let mut shown_pristine = HashSet::new();
    let mut rows = Vec::with_capacity(classified.len());
    for (row, source) in classified {
        let ancestor = ancestor_of(row);
        if source.is_pristine() {
            let Some(parent) = row.delta_parent_id else {
                continue;
            };
            if customized.contains(&parent) || !shown_pristine.insert(parent) {
                tracing::debug!(kind = %K::TAG, id = %row.id, %parent, "suppressing superseded counterpart");
                continue;
            }
        } else if row.delta_parent_id.is_some() && ancestor.is_none() {
            tracing::warn!(
                kind = %K::TAG,
                id = %row.id,
                origin = %origin.example(),
                "linked row has no ancestor in the origin example"
            );
        }

        rows.push(OverlayRow {
            id: row.id,
            delta_parent_id: row.delta_parent_id,
            fields: row.fields.clone(),
            origin: match source {
                Source::Origin => None,
                Source::Mixed | Source::Delta => ancestor.map(|a| a.fields.clone()),
            },
            source,
        });
    }
    rows
}

/// Builds overlay views, materializing missing counterparts on the way
#[derive(Debug)]
pub struct OverlayBuilder<K: ItemKind> {
    lists: ListManager<K>,
    resolver: Arc<dyn ExampleResolver>,
}

impl<K: ItemKind> Clone for OverlayBuilder<K> {
    fn clone(&self) -> Self {
        Self {
            lists: self.lists.clone(),
            resolver: Arc::clone(&self.resolver),
        }
    }
}

impl<K: ItemKind> OverlayBuilder<K> {
    #[must_use]
    pub fn new(lists: ListManager<K>, resolver: Arc<dyn ExampleResolver>) -> Self {
        Self { lists, resolver }
    }

    /// Overlay of `origin` as seen from `delta`
    ///
    /// # Errors
    /// Returns `InvalidArgument` if both ids are the same example, or any
    /// list/store error
    pub async fn build(
        &self,
        delta: ExampleId,
        origin: ExampleId,
    ) -> OverlayResult<Vec<OverlayRow<K>>> {
        if delta == origin {
            return Err(OverlayError::invalid(format!(
                "example {delta} cannot be its own origin"
            )));
        }
        let origin_list = self.lists.scan_ordered(origin).await?;
        let delta_list = self.materialize(&origin_list, delta).await?;
        let delta_is_version = self.resolver.is_versioned(delta).await?;
        Ok(compose_rows(&origin_list, &delta_list, delta_is_version))
    }

    /// Append one counterpart for every origin row `delta` does not cover yet
    ///
    /// All clones go in one batch under the delta list's version, so a
    /// concurrent materialization of the same overlay conflicts and re-scans
    /// instead of duplicating rows.
    ///
    /// # Errors
    /// Returns error if a list is corrupted or the store fails
    pub async fn materialize(
        &self,
        origin: &OrderedList<K>,
        delta: ExampleId,
    ) -> OverlayResult<OrderedList<K>> {
        let lists = &self.lists;
        lists
            .retry("materialize", move || async move {
                let current = lists.scan_ordered(delta).await?;
                let missing = missing_counterparts(origin, &current);
                if missing.is_empty() {
                    return Ok(current);
                }

                let count = missing.len();
                let splice = current.plan_append_all(missing);
                lists.commit_splice(&current, splice).await?;

                metrics::counter!("ovl_materialized_rows_total", "kind" => K::TAG.as_str())
                    .increment(count as u64);
                tracing::info!(
                    kind = %K::TAG,
                    %delta,
                    origin = %origin.example(),
                    count,
                    "materialized counterparts"
                );
                lists.scan_ordered(delta).await
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovl_model::{Header, KeyValueFields};
    use ovl_store::ItemScan;
    use pretty_assertions::assert_eq;

    fn linked(items: &mut [OverlayItem<Header>]) {
        let ids: Vec<_> = items.iter().map(|i| i.id).collect();
        for (i, item) in items.iter_mut().enumerate() {
            item.prev = i.checked_sub(1).map(|p| ids[p]);
            item.next = ids.get(i + 1).copied();
        }
    }

    fn list(example: ExampleId, mut items: Vec<OverlayItem<Header>>) -> OrderedList<Header> {
        linked(&mut items);
        OrderedList::from_scan(example, ItemScan { items, version: 1 }).unwrap()
    }

    fn origin_list(keys: &[&str]) -> OrderedList<Header> {
        let example = ExampleId::new();
        list(
            example,
            keys.iter()
                .map(|k| OverlayItem::new(example, KeyValueFields::new(*k, "o")))
                .collect(),
        )
    }

    #[test]
    fn missing_counterparts_follow_origin_order() {
        let origin = origin_list(&["a", "b", "c"]);
        let delta_example = ExampleId::new();
        let covered = OverlayItem::counterpart_of(&origin.items()[1], delta_example);
        let delta = list(delta_example, vec![covered]);

        let missing = missing_counterparts(&origin, &delta);
        let keys: Vec<_> = missing.iter().map(|m| m.fields.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "c"]);
        assert!(missing.iter().all(|m| m.example_id == delta_example));
    }

    #[test]
    fn rows_follow_delta_order_and_classify() {
        let origin = origin_list(&["a", "b"]);
        let delta_example = ExampleId::new();
        let pristine = OverlayItem::counterpart_of(&origin.items()[0], delta_example);
        let mut custom = OverlayItem::counterpart_of(&origin.items()[1], delta_example).overridden();
        custom.fields.value = "d".into();
        let native = OverlayItem::<Header>::new(delta_example, KeyValueFields::new("z", "n"));
        let delta = list(delta_example, vec![native, custom, pristine]);

        let rows = compose_rows(&origin, &delta, false);
        let summary: Vec<_> = rows
            .iter()
            .map(|r| (r.fields.key.as_str(), r.source))
            .collect();
        assert_eq!(
            summary,
            vec![("z", Source::Delta), ("b", Source::Mixed), ("a", Source::Origin)]
        );
        assert_eq!(rows[1].origin.as_ref().map(|f| f.value.as_str()), Some("o"));
        assert_eq!(rows[2].origin, None);
        assert_eq!(rows[0].origin, None);
    }

    #[test]
    fn customized_row_supersedes_pristine_sibling() {
        let origin = origin_list(&["a"]);
        let delta_example = ExampleId::new();
        let pristine = OverlayItem::counterpart_of(&origin.items()[0], delta_example);
        let mut custom = OverlayItem::counterpart_of(&origin.items()[0], delta_example).overridden();
        custom.fields.value = "d".into();
        let custom_id = custom.id;
        let delta = list(delta_example, vec![pristine, custom]);

        let rows = compose_rows(&origin, &delta, false);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, custom_id);
    }

    #[test]
    fn duplicate_pristine_rows_collapse() {
        let origin = origin_list(&["a"]);
        let delta_example = ExampleId::new();
        let first = OverlayItem::counterpart_of(&origin.items()[0], delta_example);
        let second = OverlayItem::counterpart_of(&origin.items()[0], delta_example);
        let first_id = first.id;
        let delta = list(delta_example, vec![first, second]);

        let rows = compose_rows(&origin, &delta, false);
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![first_id]);
    }

    #[test]
    fn versioned_delta_reports_delta_with_snapshot() {
        let origin = origin_list(&["a"]);
        let delta_example = ExampleId::new();
        let copy = OverlayItem::counterpart_of(&origin.items()[0], delta_example);
        let delta = list(delta_example, vec![copy]);

        let rows = compose_rows(&origin, &delta, true);
        assert_eq!(rows[0].source, Source::Delta);
        assert_eq!(rows[0].origin, Some(origin.items()[0].fields.clone()));
    }

    #[test]
    fn rows_serialize_with_uppercase_source() {
        let origin = origin_list(&["a"]);
        let delta_example = ExampleId::new();
        let copy = OverlayItem::counterpart_of(&origin.items()[0], delta_example);
        let rows = compose_rows(&origin, &list(delta_example, vec![copy]), false);

        let json = serde_json::to_value(&rows[0]).unwrap();
        assert_eq!(json["source"], "ORIGIN");
        assert_eq!(json["fields"]["key"], "a");
    }
}
