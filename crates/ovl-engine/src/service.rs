//! Per-kind overlay services
//!
//! [`OverlayService<K>`] is the public surface: origin-side CRUD with
//! propagation, the delta-side overlay operations and moves. It is written
//! once and instantiated as [`HeaderService`], [`QueryService`] and
//! [`AssertionService`]; [`OverlayEngine`] bundles all three over one store.

use crate::config::EngineConfig;
use crate::error::{OverlayError, OverlayResult};
use crate::lists::ListManager;
use crate::ordering::{OrderReport, Position};
use crate::overlay::{OverlayBuilder, OverlayRow};
use crate::propagation::{CascadeReport, Propagator};
use crate::resolver::ExampleResolver;
use ovl_model::{Assertion, ExampleId, Header, ItemId, ItemKind, OverlayItem, Query};
use ovl_store::RecordStore;
use std::sync::Arc;
use tracing::instrument;

pub type HeaderService = OverlayService<Header>;
pub type QueryService = OverlayService<Query>;
pub type AssertionService = OverlayService<Assertion>;

/// Overlay operations for one item kind
#[derive(Debug)]
pub struct OverlayService<K: ItemKind> {
    lists: ListManager<K>,
    overlay: OverlayBuilder<K>,
    propagator: Propagator<K>,
}

impl<K: ItemKind> Clone for OverlayService<K> {
    fn clone(&self) -> Self {
        Self {
            lists: self.lists.clone(),
            overlay: self.overlay.clone(),
            propagator: self.propagator.clone(),
        }
    }
}

impl<K: ItemKind> OverlayService<K> {
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        resolver: Arc<dyn ExampleResolver>,
        config: &EngineConfig,
    ) -> Self {
        let lists = ListManager::new(store, config.max_commit_retries);
        Self {
            overlay: OverlayBuilder::new(lists.clone(), Arc::clone(&resolver)),
            propagator: Propagator::new(lists.clone(), resolver, config.cascade_concurrency),
            lists,
        }
    }

    /// Fetch one row
    ///
    /// # Errors
    /// Returns `NotFound` if the row does not exist
    pub async fn get(&self, id: ItemId) -> OverlayResult<OverlayItem<K>> {
        self.lists.get(id).await
    }

    /// Rows of `example` in list order
    ///
    /// # Errors
    /// Returns `Internal` if the stored list is corrupted
    pub async fn list(&self, example: ExampleId) -> OverlayResult<Vec<OverlayItem<K>>> {
        Ok(self.lists.scan_ordered(example).await?.into_items())
    }

    /// Append a new row to `example`
    ///
    /// # Errors
    /// Returns `InvalidArgument` if the fields fail validation
    #[instrument(skip(self, fields), fields(kind = %K::TAG))]
    pub async fn create(&self, example: ExampleId, fields: K::Fields) -> OverlayResult<ItemId> {
        K::validate_fields(&fields)?;
        let item = self.lists.append(OverlayItem::new(example, fields)).await?;
        tracing::info!(id = %item.id, "created");
        Ok(item.id)
    }

    /// Patch an origin row and push the change to its pristine counterparts
    ///
    /// # Errors
    /// - `NotFound` if the row does not exist
    /// - `InvalidArgument` if the patched fields fail validation
    /// - `Internal` (`CascadeIncomplete`) if some counterparts could not be
    ///   updated; the origin row itself is updated regardless
    #[instrument(skip(self, patch), fields(kind = %K::TAG))]
    pub async fn update(&self, id: ItemId, patch: K::Patch) -> OverlayResult<CascadeReport> {
        let before = self.lists.get(id).await?;
        let after = self.apply_patch(id, patch, false).await?;
        if after.fields == before.fields {
            return Ok(CascadeReport::default());
        }
        tracing::info!("updated");
        self.propagator
            .propagate_update(&before, &after)
            .await?
            .into_result()
    }

    /// Delete an origin row and cascade to its counterparts
    ///
    /// # Errors
    /// - `NotFound` if the row does not exist
    /// - `Internal` (`CascadeIncomplete`) if some counterparts could not be
    ///   removed or detached
    #[instrument(skip(self), fields(kind = %K::TAG))]
    pub async fn delete(&self, id: ItemId) -> OverlayResult<CascadeReport> {
        let removed = self.lists.remove(id).await?;
        tracing::info!("deleted");
        self.propagator
            .propagate_delete(&removed)
            .await?
            .into_result()
    }

    /// Overlay of `origin` as seen from `delta`, materializing counterparts
    ///
    /// # Errors
    /// Returns `InvalidArgument` if `delta == origin`
    #[instrument(skip(self), fields(kind = %K::TAG))]
    pub async fn delta_list(
        &self,
        delta: ExampleId,
        origin: ExampleId,
    ) -> OverlayResult<Vec<OverlayRow<K>>> {
        self.overlay.build(delta, origin).await
    }

    /// Append a row to a delta example, optionally linked to an origin row
    ///
    /// A linked row carries caller-supplied values and starts out overridden.
    ///
    /// # Errors
    /// - `InvalidArgument` if a parent is given without an origin example,
    ///   the parent belongs to another example, or the fields are invalid
    /// - `NotFound` if the parent does not exist
    #[instrument(skip(self, fields), fields(kind = %K::TAG))]
    pub async fn delta_create(
        &self,
        delta: ExampleId,
        origin: Option<ExampleId>,
        parent: Option<ItemId>,
        fields: K::Fields,
    ) -> OverlayResult<ItemId> {
        K::validate_fields(&fields)?;
        let mut item = OverlayItem::new(delta, fields);

        if let Some(parent) = parent {
            let Some(origin) = origin else {
                return Err(OverlayError::invalid(
                    "origin example is required when a parent item is given",
                ));
            };
            if origin == delta {
                return Err(OverlayError::invalid(format!(
                    "example {delta} cannot be its own origin"
                )));
            }
            let ancestor = self.lists.get(parent).await?;
            if ancestor.example_id != origin {
                return Err(OverlayError::ParentMismatch {
                    parent,
                    example: origin,
                });
            }
            item = item.with_delta_parent(parent).overridden();
        }

        let item = self.lists.append(item).await?;
        tracing::info!(id = %item.id, linked = item.has_delta_parent(), "delta row created");
        Ok(item.id)
    }

    /// Patch a delta row in place; its ancestor link is kept
    ///
    /// A linked row is marked overridden even when the patch leaves its
    /// values equal to the origin's, so later origin updates skip it.
    ///
    /// # Errors
    /// Returns `NotFound` or `InvalidArgument` as for [`Self::update`]
    #[instrument(skip(self, patch), fields(kind = %K::TAG))]
    pub async fn delta_update(&self, id: ItemId, patch: K::Patch) -> OverlayResult<OverlayItem<K>> {
        let item = self.apply_patch(id, patch, true).await?;
        tracing::info!("delta row updated");
        Ok(item)
    }

    /// Remove a delta row
    ///
    /// A removed auto-materialized counterpart comes back on the next
    /// [`Self::delta_list`] while its origin row exists.
    ///
    /// # Errors
    /// Returns `NotFound` if the row does not exist
    #[instrument(skip(self), fields(kind = %K::TAG))]
    pub async fn delta_delete(&self, id: ItemId) -> OverlayResult<()> {
        self.lists.remove(id).await?;
        tracing::info!("delta row deleted");
        Ok(())
    }

    /// Restore a delta row from its ancestor, or clear it if standalone
    ///
    /// # Errors
    /// Returns `NotFound` if the row or its declared ancestor does not exist
    #[instrument(skip(self), fields(kind = %K::TAG))]
    pub async fn delta_reset(&self, id: ItemId) -> OverlayResult<OverlayItem<K>> {
        self.propagator.reset(id).await
    }

    /// Move `id` before or after `target` within `example`
    ///
    /// Returns `false` if the row was already in place.
    ///
    /// # Errors
    /// - `InvalidArgument` for self moves or rows of another example
    /// - `NotFound` if `id` does not exist
    #[instrument(skip(self), fields(kind = %K::TAG))]
    pub async fn move_item(
        &self,
        example: ExampleId,
        id: ItemId,
        target: ItemId,
        position: Position,
    ) -> OverlayResult<bool> {
        let moved = self
            .lists
            .move_relative(example, id, target, position)
            .await?;
        if moved {
            tracing::info!("moved");
        }
        Ok(moved)
    }

    /// Move within a delta example's own list
    ///
    /// Same semantics as [`Self::move_item`]; the origin order is never
    /// affected.
    ///
    /// # Errors
    /// As for [`Self::move_item`]
    pub async fn delta_move(
        &self,
        delta: ExampleId,
        id: ItemId,
        target: ItemId,
        position: Position,
    ) -> OverlayResult<bool> {
        self.move_item(delta, id, target, position).await
    }

    /// Walk `example`'s list and summarize it
    ///
    /// # Errors
    /// Returns `Internal` if the list is corrupted
    pub async fn verify_example(&self, example: ExampleId) -> OverlayResult<OrderReport> {
        Ok(self.lists.scan_ordered(example).await?.report())
    }

    async fn apply_patch(
        &self,
        id: ItemId,
        patch: K::Patch,
        customize: bool,
    ) -> OverlayResult<OverlayItem<K>> {
        K::validate_patch(&patch)?;
        let patch = &patch;
        self.lists
            .rewrite(id, move |item| {
                let mut fields = item.fields.clone();
                K::apply_patch(&mut fields, patch.clone());
                let mark = customize && item.has_delta_parent() && !item.overridden;
                if fields == item.fields && !mark {
                    return Ok(false);
                }
                item.fields = fields;
                item.overridden |= mark;
                Ok(true)
            })
            .await
    }
}

/// Header, query and assertion services over one store
#[derive(Debug, Clone)]
pub struct OverlayEngine {
    pub headers: HeaderService,
    pub queries: QueryService,
    pub assertions: AssertionService,
}

impl OverlayEngine {
    #[must_use]
    pub fn new(
        store: Arc<dyn RecordStore>,
        resolver: Arc<dyn ExampleResolver>,
        config: &EngineConfig,
    ) -> Self {
        tracing::debug!(
            max_commit_retries = config.max_commit_retries,
            cascade_concurrency = config.cascade_concurrency,
            "overlay engine ready"
        );
        Self {
            headers: OverlayService::new(Arc::clone(&store), Arc::clone(&resolver), config),
            queries: OverlayService::new(Arc::clone(&store), Arc::clone(&resolver), config),
            assertions: OverlayService::new(store, resolver, config),
        }
    }
}
