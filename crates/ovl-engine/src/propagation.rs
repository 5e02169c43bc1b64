//! Propagation and cascade engine
//!
//! Origin edits fan out to every counterpart of the edited row:
//!
//! | event         | counterpart                 | effect                        |
//! |---------------|-----------------------------|-------------------------------|
//! | origin update | not overridden (ORIGIN)     | fields overwritten            |
//! | origin update | MIXED or DELTA              | untouched                     |
//! | origin delete | ORIGIN or MIXED             | removed from its own list     |
//! | origin delete | DELTA (versioned example)   | link detached, row kept       |
//!
//! Each counterpart is written in its own batch, several at a time. One
//! counterpart failing does not roll back the others; failures are
//! collected in a [`CascadeReport`].

use crate::classify::{resolve_source, Source};
use crate::error::{OverlayError, OverlayResult};
use crate::lists::ListManager;
use crate::resolver::ExampleResolver;
use futures::stream::{self, StreamExt};
use indexmap::IndexMap;
use ovl_model::{ExampleId, ItemId, ItemKind, OverlayItem};
use serde::Serialize;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// What happened to one counterpart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CascadeOutcome {
    /// Fields replaced with the origin's
    Updated,
    /// Removed from its own list
    Deleted,
    /// Ancestor link cleared, row kept
    Detached,
    /// Customized, versioned, or already gone
    Skipped,
}

impl CascadeOutcome {
    fn as_str(self) -> &'static str {
        match self {
            Self::Updated => "updated",
            Self::Deleted => "deleted",
            Self::Detached => "detached",
            Self::Skipped => "skipped",
        }
    }
}

/// A counterpart the cascade could not write
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CascadeFailure {
    pub id: ItemId,
    pub example: ExampleId,
    pub error: String,
}

/// Per-row results of one cascade
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub updated: Vec<ItemId>,
    pub deleted: Vec<ItemId>,
    pub detached: Vec<ItemId>,
    pub skipped: Vec<ItemId>,
    pub failed: Vec<CascadeFailure>,
}

impl CascadeReport {
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Counterparts visited
    #[must_use]
    pub fn total(&self) -> usize {
        self.updated.len()
            + self.deleted.len()
            + self.detached.len()
            + self.skipped.len()
            + self.failed.len()
    }

    fn record(&mut self, id: ItemId, outcome: CascadeOutcome) {
        match outcome {
            CascadeOutcome::Updated => self.updated.push(id),
            CascadeOutcome::Deleted => self.deleted.push(id),
            CascadeOutcome::Detached => self.detached.push(id),
            CascadeOutcome::Skipped => self.skipped.push(id),
        }
    }

    /// Surface failures as [`OverlayError::CascadeIncomplete`]
    ///
    /// # Errors
    /// Returns error if any counterpart failed
    pub fn into_result(self) -> OverlayResult<Self> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(OverlayError::CascadeIncomplete(self))
        }
    }
}

impl Display for CascadeReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} updated, {} deleted, {} detached, {} skipped, {} failed",
            self.updated.len(),
            self.deleted.len(),
            self.detached.len(),
            self.skipped.len(),
            self.failed.len()
        )?;
        if let Some(first) = self.failed.first() {
            write!(f, " (first: {} in {}: {})", first.id, first.example, first.error)?;
        }
        Ok(())
    }
}

/// Applies origin changes to counterparts
#[derive(Debug)]
pub struct Propagator<K: ItemKind> {
    lists: ListManager<K>,
    resolver: Arc<dyn ExampleResolver>,
    concurrency: usize,
}

impl<K: ItemKind> Clone for Propagator<K> {
    fn clone(&self) -> Self {
        Self {
            lists: self.lists.clone(),
            resolver: Arc::clone(&self.resolver),
            concurrency: self.concurrency,
        }
    }
}

impl<K: ItemKind> Propagator<K> {
    #[must_use]
    pub fn new(
        lists: ListManager<K>,
        resolver: Arc<dyn ExampleResolver>,
        concurrency: usize,
    ) -> Self {
        Self {
            lists,
            resolver,
            concurrency: concurrency.max(1),
        }
    }

    /// Push the origin row's new fields to every counterpart still tracking it
    ///
    /// Counterparts are chosen by their override marker, not by comparing
    /// values, so a row left stale by an earlier failed or overlapping
    /// cascade is still brought up to date.
    ///
    /// # Errors
    /// Returns error only if the counterparts cannot be looked up; per-row
    /// failures land in the report
    pub async fn propagate_update(
        &self,
        before: &OverlayItem<K>,
        after: &OverlayItem<K>,
    ) -> OverlayResult<CascadeReport> {
        let children = self.lists.repo().delta_children(before.id).await?;
        let versioned = self.versioned_examples(&children).await?;

        let outcomes = stream::iter(children)
            .map(|child| {
                let is_version = versioned.get(&child.example_id).copied().unwrap_or(false);
                async move {
                    let result = self.update_one(&child, before, after, is_version).await;
                    (child.id, child.example_id, result)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        Ok(self.summarize("update", before.id, outcomes))
    }

    /// Remove or detach every counterpart of the deleted `origin` row
    ///
    /// # Errors
    /// Returns error only if the counterparts cannot be looked up
    pub async fn propagate_delete(&self, origin: &OverlayItem<K>) -> OverlayResult<CascadeReport> {
        let children = self.lists.repo().delta_children(origin.id).await?;
        let versioned = self.versioned_examples(&children).await?;

        let outcomes = stream::iter(children)
            .map(|child| {
                let is_version = versioned.get(&child.example_id).copied().unwrap_or(false);
                async move {
                    let result = self.delete_one(&child, origin, is_version).await;
                    (child.id, child.example_id, result)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        Ok(self.summarize("delete", origin.id, outcomes))
    }

    /// Restore a delta row from its ancestor, or clear it if standalone
    ///
    /// The row keeps its id, links and position, and its override marker is
    /// cleared so origin updates reach it again.
    ///
    /// # Errors
    /// Returns `NotFound` if the row or its declared ancestor does not exist
    pub async fn reset(&self, id: ItemId) -> OverlayResult<OverlayItem<K>> {
        let row = self.lists.get(id).await?;
        let restored = match row.delta_parent_id {
            Some(parent) => self.lists.get(parent).await?.fields,
            None => K::Fields::default(),
        };

        let restored = &restored;
        let item = self
            .lists
            .rewrite(id, move |item| {
                if item.fields == *restored && !item.overridden {
                    return Ok(false);
                }
                item.fields = restored.clone();
                item.overridden = false;
                Ok(true)
            })
            .await?;
        tracing::info!(
            kind = %K::TAG,
            %id,
            linked = item.has_delta_parent(),
            "reset delta row"
        );
        Ok(item)
    }

    async fn update_one(
        &self,
        child: &OverlayItem<K>,
        before: &OverlayItem<K>,
        after: &OverlayItem<K>,
        is_version: bool,
    ) -> OverlayResult<CascadeOutcome> {
        if resolve_source(child, Some(before), is_version) != Source::Origin {
            return Ok(CascadeOutcome::Skipped);
        }

        // Copy the origin's latest values: an overlapping update may have
        // landed after `after` was read.
        let latest = match self.lists.get(before.id).await {
            Ok(origin) => origin.fields,
            Err(e) if e.is_not_found() => after.fields.clone(),
            Err(e) => return Err(e),
        };
        let latest = &latest;

        // Re-check against the stored row: it may have been customized since
        // the children were listed.
        let row = self
            .lists
            .rewrite(child.id, |row| {
                if row.delta_parent_id != Some(before.id) || row.overridden {
                    return Ok(false);
                }
                if row.fields == *latest {
                    return Ok(false);
                }
                row.fields = latest.clone();
                Ok(true)
            })
            .await?;

        Ok(if row.delta_parent_id == Some(before.id) && !row.overridden {
            CascadeOutcome::Updated
        } else {
            CascadeOutcome::Skipped
        })
    }

    async fn delete_one(
        &self,
        child: &OverlayItem<K>,
        origin: &OverlayItem<K>,
        is_version: bool,
    ) -> OverlayResult<CascadeOutcome> {
        match resolve_source(child, Some(origin), is_version) {
            Source::Delta => {
                self.lists
                    .rewrite(child.id, |row| {
                        if row.delta_parent_id != Some(origin.id) {
                            return Ok(false);
                        }
                        row.delta_parent_id = None;
                        Ok(true)
                    })
                    .await?;
                Ok(CascadeOutcome::Detached)
            }
            Source::Origin | Source::Mixed => {
                self.lists.remove(child.id).await?;
                Ok(CascadeOutcome::Deleted)
            }
        }
    }

    async fn versioned_examples(
        &self,
        children: &[OverlayItem<K>],
    ) -> OverlayResult<IndexMap<ExampleId, bool>> {
        let mut versioned = IndexMap::new();
        for child in children {
            if !versioned.contains_key(&child.example_id) {
                let is_version = self.resolver.is_versioned(child.example_id).await?;
                versioned.insert(child.example_id, is_version);
            }
        }
        Ok(versioned)
    }

    fn summarize(
        &self,
        event: &'static str,
        origin: ItemId,
        outcomes: Vec<(ItemId, ExampleId, OverlayResult<CascadeOutcome>)>,
    ) -> CascadeReport {
        let mut report = CascadeReport::default();
        for (id, example, result) in outcomes {
            let outcome = match result {
                Ok(outcome) => outcome,
                // Removed concurrently; nothing left to propagate to
                Err(e) if e.is_not_found() => CascadeOutcome::Skipped,
                Err(e) => {
                    tracing::warn!(
                        kind = %K::TAG,
                        event,
                        %origin,
                        %id,
                        %example,
                        error = %e,
                        "cascade write failed"
                    );
                    metrics::counter!(
                        "ovl_cascade_rows_total",
                        "kind" => K::TAG.as_str(),
                        "outcome" => "failed"
                    )
                    .increment(1);
                    report.failed.push(CascadeFailure {
                        id,
                        example,
                        error: e.to_string(),
                    });
                    continue;
                }
            };
            metrics::counter!(
                "ovl_cascade_rows_total",
                "kind" => K::TAG.as_str(),
                "outcome" => outcome.as_str()
            )
            .increment(1);
            report.record(id, outcome);
        }

        tracing::info!(kind = %K::TAG, event, %origin, summary = %report, "cascade finished");
        report
    }
}
