//! Overlay items
//!
//! [`OverlayItem`] is one stored header, query or assertion row together with
//! its ordering links and optional delta ancestor.

use crate::id::{ExampleId, ItemId};
use crate::kind::ItemKind;

/// One row of an example's header/query/assertion list
///
/// # Invariants
/// - `prev`/`next` only ever reference items with the same `example_id`
/// - no item references itself through `prev`, `next` or `delta_parent_id`
/// - `delta_parent_id` references an item of the same kind `K`
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayItem<K: ItemKind> {
    /// Immutable row id
    pub id: ItemId,

    /// Example this row physically belongs to
    pub example_id: ExampleId,

    /// Origin row this row overrides or was copied from
    pub delta_parent_id: Option<ItemId>,

    /// Predecessor in the example's list (`None` for the head)
    pub prev: Option<ItemId>,

    /// Successor in the example's list (`None` for the tail)
    pub next: Option<ItemId>,

    /// Kind-specific payload
    pub fields: K::Fields,

    /// Set once the delta example customizes a linked row; origin updates
    /// no longer reach it until it is reset
    pub overridden: bool,
}

impl<K: ItemKind> OverlayItem<K> {
    /// Create an unlinked row with a fresh id
    #[must_use]
    pub fn new(example_id: ExampleId, fields: K::Fields) -> Self {
        Self {
            id: ItemId::new(),
            example_id,
            delta_parent_id: None,
            prev: None,
            next: None,
            fields,
            overridden: false,
        }
    }

    /// Clone `ancestor` into `example_id` as a linked counterpart
    #[must_use]
    pub fn counterpart_of(ancestor: &OverlayItem<K>, example_id: ExampleId) -> Self {
        Self::new(example_id, ancestor.fields.clone()).with_delta_parent(ancestor.id)
    }

    /// With delta ancestor
    #[inline]
    #[must_use]
    pub fn with_delta_parent(mut self, parent: ItemId) -> Self {
        self.delta_parent_id = Some(parent);
        self
    }

    /// First row of its list
    #[inline]
    #[must_use]
    pub fn is_head(&self) -> bool {
        self.prev.is_none()
    }

    /// Last row of its list
    #[inline]
    #[must_use]
    pub fn is_tail(&self) -> bool {
        self.next.is_none()
    }

    /// Whether this row carries a delta ancestor link
    #[inline]
    #[must_use]
    pub fn has_delta_parent(&self) -> bool {
        self.delta_parent_id.is_some()
    }

    /// With the customization marker set
    #[inline]
    #[must_use]
    pub fn overridden(mut self) -> Self {
        self.overridden = true;
        self
    }

    /// Linked to `ancestor` and never customized
    #[inline]
    #[must_use]
    pub fn tracks(&self, ancestor: &OverlayItem<K>) -> bool {
        self.delta_parent_id == Some(ancestor.id) && !self.overridden
    }
}
