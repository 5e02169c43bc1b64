//! OVL Engine
//!
//! Overlay/delta resolution for request examples: a delta example sees an
//! origin example's headers, queries and assertions, may reorder and
//! customize them, and keeps receiving origin edits until it does.
//!
//! # Core Concepts
//!
//! - [`OrderedList`]: An example's rows in `prev`/`next` order, with splice planning
//! - [`Source`]: ORIGIN / MIXED / DELTA classification of overlay rows
//! - [`OverlayBuilder`]: Lazy materialization of counterparts plus the merged view
//! - [`Propagator`]: Origin update/delete cascades and delta resets
//! - [`OverlayService`]: The per-kind operation surface
//!
//! # Example
//!
//! ```rust,ignore
//! use ovl_engine::prelude::*;
//! use std::sync::Arc;
//!
//! let registry = Arc::new(ExampleRegistry::new());
//! let engine = OverlayEngine::new(Arc::new(MemoryStore::new()), registry.clone(), &EngineConfig::default());
//!
//! let origin = registry.create_example();
//! let delta = registry.create_example();
//! engine.headers.create(origin, KeyValueFields::new("Accept", "*/*")).await?;
//!
//! let rows = engine.headers.delta_list(delta, origin).await?;
//! assert_eq!(rows[0].source, Source::Origin);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod classify;
pub mod config;
pub mod error;
pub mod lists;
pub mod ordering;
pub mod overlay;
pub mod propagation;
pub mod resolver;
pub mod service;
pub mod telemetry;

pub use classify::{classify, resolve_source, Source};
pub use config::{ConfigError, EngineConfig, LogConfig, LogFormat};
pub use error::{OverlayError, OverlayResult, StatusCode};
pub use lists::ListManager;
pub use ordering::{ListCorruption, OrderReport, OrderedList, Position, Splice};
pub use overlay::{compose_rows, missing_counterparts, OverlayBuilder, OverlayRow};
pub use propagation::{CascadeFailure, CascadeOutcome, CascadeReport, Propagator};
pub use resolver::{ExampleRegistry, ExampleResolver};
pub use service::{AssertionService, HeaderService, OverlayEngine, OverlayService, QueryService};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
pub mod prelude {
    pub use crate::{
        CascadeReport, EngineConfig, ExampleRegistry, ExampleResolver, OverlayEngine,
        OverlayError, OverlayResult, OverlayRow, OverlayService, Position, Source, StatusCode,
    };
    pub use ovl_model::{
        Assertion, AssertionFields, AssertionPatch, ComparisonKind, Condition, ExampleId,
        Header, ItemId, ItemKind, KeyValueFields, KeyValuePatch, OverlayItem, Query,
    };
    pub use ovl_store::{MemoryStore, RecordStore};
}
