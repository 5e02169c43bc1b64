//! Error types for the overlay engine
//!
//! Every [`OverlayError`] maps onto one of four caller-facing
//! [`StatusCode`]s:
//! - `InvalidArgument`: malformed ids or fields, self moves, example mismatches
//! - `NotFound`: the target row or its declared parent does not exist
//! - `PermissionDenied`: raised by the ownership collaborator, never by the engine itself
//! - `Internal`: store failures, list corruption, incomplete cascades

use crate::ordering::ListCorruption;
use crate::propagation::CascadeReport;
use ovl_model::{ExampleId, FieldError, IdError, ItemId, KindTag};
use ovl_store::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Caller-facing status classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    InvalidArgument,
    NotFound,
    PermissionDenied,
    Internal,
}

impl StatusCode {
    /// Standard RPC status name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::NotFound => "NOT_FOUND",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::Internal => "INTERNAL",
        }
    }
}

impl Display for StatusCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    /// Generic invalid request
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Identifier could not be parsed
    #[error("invalid id: {0}")]
    InvalidId(#[from] IdError),

    /// Fields failed validation
    #[error("invalid fields: {0}")]
    InvalidFields(#[from] FieldError),

    /// Item moved relative to itself
    #[error("cannot move {0} relative to itself")]
    SelfReferentialMove(ItemId),

    /// Move target outside the item's example
    #[error("move target {target} does not belong to example {example}")]
    InvalidTarget { target: ItemId, example: ExampleId },

    /// Item addressed through the wrong example
    #[error("{kind} {id} does not belong to example {example}")]
    ExampleMismatch {
        kind: KindTag,
        id: ItemId,
        example: ExampleId,
    },

    /// Delta parent outside the declared origin example
    #[error("parent {parent} does not belong to the specified example {example}")]
    ParentMismatch { parent: ItemId, example: ExampleId },

    /// Row does not exist
    #[error("{kind} {id} not found")]
    NotFound { kind: KindTag, id: ItemId },

    /// Ownership check failed
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Linked list walk failed
    #[error("{kind} list of example {example} is corrupted: {source}")]
    CorruptList {
        kind: KindTag,
        example: ExampleId,
        #[source]
        source: ListCorruption,
    },

    /// Some counterparts could not be propagated
    #[error("cascade incomplete: {0}")]
    CascadeIncomplete(CascadeReport),

    /// Optimistic commit kept conflicting
    #[error("{operation} gave up after {attempts} conflicting commits")]
    RetriesExhausted {
        operation: &'static str,
        attempts: u32,
    },

    /// Record store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl OverlayError {
    /// Row not found
    #[inline]
    pub fn not_found(kind: KindTag, id: ItemId) -> Self {
        Self::NotFound { kind, id }
    }

    /// Generic invalid argument
    #[inline]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Status class of this error
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_)
            | Self::InvalidId(_)
            | Self::InvalidFields(_)
            | Self::SelfReferentialMove(_)
            | Self::InvalidTarget { .. }
            | Self::ExampleMismatch { .. }
            | Self::ParentMismatch { .. } => StatusCode::InvalidArgument,
            Self::NotFound { .. } | Self::Store(StoreError::MissingRow { .. }) => {
                StatusCode::NotFound
            }
            Self::PermissionDenied(_) => StatusCode::PermissionDenied,
            Self::CorruptList { .. }
            | Self::CascadeIncomplete(_)
            | Self::RetriesExhausted { .. }
            | Self::Store(_) => StatusCode::Internal,
        }
    }

    /// Check if the operation may succeed when re-planned
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_conflict())
    }

    /// Check if the error is `NotFound`
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == StatusCode::NotFound
    }
}

/// Result type alias for engine operations
pub type OverlayResult<T> = Result<T, OverlayError>;
