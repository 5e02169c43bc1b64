//! Source classification
//!
//! Each row is tagged with where its values come from. The base rule only
//! looks at two facts:
//!
//! | has delta parent | example is a version | source |
//! |------------------|----------------------|--------|
//! | no               | no                   | ORIGIN |
//! | no               | yes                  | DELTA  |
//! | yes              | yes                  | DELTA  |
//! | yes              | no                   | MIXED  |
//!
//! Inside an overlay view two refinements apply (see [`resolve_source`]):
//! a linked row that was never customized (no override marker) is a
//! counterpart still tracking its ancestor and reports ORIGIN, and an
//! unlinked row was created in the delta example itself and reports DELTA.
//! Field values are never compared: a customized row whose values happen to
//! equal the origin's stays MIXED.

use ovl_model::{ItemKind, OverlayItem};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Where an overlay row's values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Source {
    /// Inherited unchanged from the origin example
    Origin,
    /// Linked to an origin row and customized
    Mixed,
    /// Owned by the delta example
    Delta,
}

impl Source {
    /// Upper-case wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Origin => "ORIGIN",
            Self::Mixed => "MIXED",
            Self::Delta => "DELTA",
        }
    }

    /// Still tracking the origin row
    #[inline]
    #[must_use]
    pub fn is_pristine(self) -> bool {
        self == Self::Origin
    }
}

impl Display for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Base classification rule
#[inline]
#[must_use]
pub fn classify(has_delta_parent: bool, example_is_version: bool) -> Source {
    match (has_delta_parent, example_is_version) {
        (false, false) => Source::Origin,
        (true, false) => Source::Mixed,
        (_, true) => Source::Delta,
    }
}

/// Classify a row of a delta example against its ancestor (when known)
///
/// A linked row whose ancestor is missing stays MIXED.
#[must_use]
pub fn resolve_source<K: ItemKind>(
    item: &OverlayItem<K>,
    ancestor: Option<&OverlayItem<K>>,
    example_is_version: bool,
) -> Source {
    match classify(item.has_delta_parent(), example_is_version) {
        Source::Mixed if ancestor.is_some_and(|a| item.tracks(a)) => Source::Origin,
        Source::Origin => Source::Delta,
        source => source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ovl_model::{ExampleId, Header, KeyValueFields};

    #[test]
    fn base_rule_table() {
        assert_eq!(classify(false, false), Source::Origin);
        assert_eq!(classify(false, true), Source::Delta);
        assert_eq!(classify(true, true), Source::Delta);
        assert_eq!(classify(true, false), Source::Mixed);
    }

    #[test]
    fn untouched_counterpart_is_origin() {
        let origin = OverlayItem::<Header>::new(ExampleId::new(), KeyValueFields::new("a", "1"));
        let copy = OverlayItem::counterpart_of(&origin, ExampleId::new());
        assert_eq!(resolve_source(&copy, Some(&origin), false), Source::Origin);
    }

    #[test]
    fn customized_counterpart_is_mixed() {
        let origin = OverlayItem::<Header>::new(ExampleId::new(), KeyValueFields::new("a", "1"));
        let mut copy = OverlayItem::counterpart_of(&origin, ExampleId::new()).overridden();
        copy.fields.value = "2".into();
        assert_eq!(resolve_source(&copy, Some(&origin), false), Source::Mixed);
        assert_eq!(resolve_source(&copy, None, false), Source::Mixed);
    }

    #[test]
    fn customization_equal_to_origin_is_still_mixed() {
        let origin = OverlayItem::<Header>::new(ExampleId::new(), KeyValueFields::new("a", "1"));
        let copy = OverlayItem::counterpart_of(&origin, ExampleId::new()).overridden();
        assert_eq!(resolve_source(&copy, Some(&origin), false), Source::Mixed);
    }

    #[test]
    fn stale_untouched_counterpart_is_origin() {
        let origin = OverlayItem::<Header>::new(ExampleId::new(), KeyValueFields::new("a", "1"));
        let mut copy = OverlayItem::counterpart_of(&origin, ExampleId::new());
        copy.fields.value = "older".into();
        assert_eq!(resolve_source(&copy, Some(&origin), false), Source::Origin);
    }

    #[test]
    fn versioned_examples_only_hold_delta_rows() {
        let origin = OverlayItem::<Header>::new(ExampleId::new(), KeyValueFields::new("a", "1"));
        let copy = OverlayItem::counterpart_of(&origin, ExampleId::new());
        assert_eq!(resolve_source(&copy, Some(&origin), true), Source::Delta);
    }

    #[test]
    fn standalone_row_is_delta() {
        let item = OverlayItem::<Header>::new(ExampleId::new(), KeyValueFields::new("a", "1"));
        assert_eq!(resolve_source(&item, None, false), Source::Delta);
        assert_eq!(Source::Delta.to_string(), "DELTA");
    }
}
