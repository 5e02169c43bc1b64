//! Sortable 128-bit identifiers
//!
//! Provides [`ItemId`] and [`ExampleId`], ULID-backed identifiers that
//! accept either the canonical 26-character string or 16 raw bytes.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use ulid::Ulid;

/// Width of an identifier in raw bytes
pub const ID_LEN: usize = 16;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        pub struct $name(pub Ulid);

        impl $name {
            /// Generate a new identifier
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }

            /// Parse from raw bytes
            ///
            /// # Errors
            /// Returns error if slice length is not exactly 16 bytes
            pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdError> {
                let arr: [u8; ID_LEN] = bytes.try_into().map_err(|_| IdError::InvalidLength {
                    expected: ID_LEN,
                    actual: bytes.len(),
                })?;
                Ok(Self(Ulid::from_bytes(arr)))
            }

            /// Raw big-endian bytes
            #[inline]
            #[must_use]
            pub fn to_bytes(self) -> [u8; ID_LEN] {
                self.0.to_bytes()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ulid::from_string(s)
                    .map(Self)
                    .map_err(|e| IdError::Malformed(format!("{s}: {e}")))
            }
        }

        impl From<Ulid> for $name {
            fn from(ulid: Ulid) -> Self {
                Self(ulid)
            }
        }
    };
}

define_id!(
    /// Identifier of a single header, query or assertion row
    ItemId
);

define_id!(
    /// Identifier of an example (the storage scope of a list of items)
    ExampleId
);

/// Errors parsing identifiers
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// Wrong number of raw bytes
    #[error("invalid id length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Not a valid ULID string
    #[error("malformed id: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_id_bytes_roundtrip() {
        let id = ItemId::new();
        let parsed = ItemId::from_bytes(&id.to_bytes()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn from_bytes_rejects_wrong_length() {
        let err = ExampleId::from_bytes(&[0u8; 15]).unwrap_err();
        assert_eq!(
            err,
            IdError::InvalidLength {
                expected: 16,
                actual: 15
            }
        );
    }

    #[test]
    fn from_str_rejects_garbage() {
        let err = ItemId::from_str("not-a-ulid").unwrap_err();
        assert!(matches!(err, IdError::Malformed(_)));
    }

    #[test]
    fn display_parses_back() {
        let id = ExampleId::new();
        assert_eq!(ExampleId::from_str(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn ids_sort_by_creation() {
        let a = ItemId(Ulid::from_parts(1, 0));
        let b = ItemId(Ulid::from_parts(2, 0));
        assert!(a < b);
    }
}
