//! OVL Model
//!
//! Typed rows for request example headers, query parameters and assertions.
//!
//! # Core Concepts
//!
//! - [`ItemKind`]: Sealed trait implemented by [`Header`], [`Query`] and [`Assertion`]
//! - [`OverlayItem<K>`]: One stored row with its list links and delta ancestor
//! - [`StoredRecord`]: Kind-agnostic persisted layout, see [`encode`]/[`decode`]
//! - [`ItemId`]/[`ExampleId`]: 128-bit sortable identifiers
//!
//! # Example
//!
//! ```rust
//! use ovl_model::{encode, decode, ExampleId, Header, KeyValueFields, OverlayItem};
//!
//! let item = OverlayItem::<Header>::new(ExampleId::new(), KeyValueFields::new("Accept", "*/*"));
//! let record = encode(&item).unwrap();
//! assert_eq!(decode::<Header>(record).unwrap(), item);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod id;
mod item;
mod kind;
mod record;

pub use id::{ExampleId, IdError, ItemId, ID_LEN};
pub use item::OverlayItem;
pub use kind::{
    Assertion, AssertionFields, AssertionPatch, ComparisonKind, Condition, FieldError, Header,
    ItemKind, KeyValueFields, KeyValuePatch, KindTag, Query,
};
pub use record::{decode, decode_all, encode, RecordError, StoredRecord};

/// Sealed trait support.
#[doc(hidden)]
pub mod __private {
    pub use super::kind::private::Sealed;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn key_value() -> impl Strategy<Value = KeyValueFields> {
        ("[A-Za-z-]{1,16}", ".{0,24}", any::<bool>(), ".{0,24}").prop_map(
            |(key, value, enabled, description)| KeyValueFields {
                key,
                value,
                enabled,
                description,
            },
        )
    }

    proptest! {
        #[test]
        fn prop_full_patch_replaces_every_field(before in key_value(), after in key_value()) {
            let mut fields = before;
            let patch = KeyValuePatch {
                key: Some(after.key.clone()),
                value: Some(after.value.clone()),
                enabled: Some(after.enabled),
                description: Some(after.description.clone()),
            };
            Header::apply_patch(&mut fields, patch);
            prop_assert_eq!(fields, after);
        }

        #[test]
        fn prop_value_patch_keeps_identity(before in key_value(), value in ".{0,24}") {
            let mut fields = before.clone();
            Query::apply_patch(&mut fields, KeyValuePatch::value(value.clone()));
            prop_assert_eq!(&fields.key, &before.key);
            prop_assert_eq!(fields.enabled, before.enabled);
            prop_assert_eq!(fields.value, value);
        }
    }
}
