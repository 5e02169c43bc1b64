//! Example metadata lookup
//!
//! Examples themselves are managed elsewhere; the engine only needs to know
//! whether an example is a version of another one, because that decides
//! how its linked rows are classified and cascaded.

use crate::error::OverlayResult;
use dashmap::DashMap;
use ovl_model::ExampleId;
use std::fmt::Debug;

/// Read-only view of example metadata
#[async_trait::async_trait]
pub trait ExampleResolver: Send + Sync + Debug {
    /// The example `example` is a version of, if any
    async fn version_parent(&self, example: ExampleId) -> OverlayResult<Option<ExampleId>>;

    /// Whether `example` is a version of another example
    async fn is_versioned(&self, example: ExampleId) -> OverlayResult<bool> {
        Ok(self.version_parent(example).await?.is_some())
    }
}

/// In-memory [`ExampleResolver`]
///
/// Unknown examples resolve as plain (unversioned) examples.
#[derive(Debug, Default)]
pub struct ExampleRegistry {
    parents: DashMap<ExampleId, Option<ExampleId>>,
}

impl ExampleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plain example
    pub fn register(&self, example: ExampleId) {
        self.parents.entry(example).or_insert(None);
    }

    /// Register `example` as a version of `parent`
    pub fn register_version(&self, example: ExampleId, parent: ExampleId) {
        self.parents.insert(example, Some(parent));
    }

    /// Mint and register a plain example
    #[must_use]
    pub fn create_example(&self) -> ExampleId {
        let id = ExampleId::new();
        self.register(id);
        id
    }

    /// Mint and register a version of `parent`
    #[must_use]
    pub fn create_version(&self, parent: ExampleId) -> ExampleId {
        let id = ExampleId::new();
        self.register_version(id, parent);
        id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

#[async_trait::async_trait]
impl ExampleResolver for ExampleRegistry {
    async fn version_parent(&self, example: ExampleId) -> OverlayResult<Option<ExampleId>> {
        Ok(self.parents.get(&example).and_then(|entry| *entry.value()))
    }
}
