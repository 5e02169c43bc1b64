//! OVL Store
//!
//! Persistence contract for overlay items.
//!
//! # Core Concepts
//!
//! - [`RecordStore`]: Point lookups, scans by example or delta ancestor, atomic commits
//! - [`RecordBatch`]: All-or-nothing write with optimistic [`Precondition`]s
//! - [`MemoryStore`]: In-memory backend used by tests, the CLI and embedders
//! - [`ItemRepo<K>`]: Typed facade over a store for one item kind
//!
//! # Example
//!
//! ```rust,ignore
//! use ovl_store::{ItemBatch, ItemRepo, MemoryStore};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! let headers = ItemRepo::<Header>::new(store);
//! let scan = headers.scan_example(example).await?;
//! headers
//!     .commit(ItemBatch::new().expect_version(example, scan.version).put(item))
//!     .await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod batch;
mod error;
mod memory;
mod repo;
mod store;

pub use batch::{ListVersion, Mutation, Precondition, RecordBatch};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use repo::{ItemBatch, ItemRepo, ItemScan};
pub use store::{ExampleScan, RecordStore};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
