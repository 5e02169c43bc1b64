//! Testing utilities for OVL workspace
//!
//! Shared fixtures: a store + registry + engine harness and field builders.

#![allow(missing_docs)]

use ovl_engine::{EngineConfig, ExampleRegistry, ExampleResolver, OverlayEngine, OverlayRow, Source};
use ovl_model::{
    AssertionFields, ComparisonKind, Condition, ExampleId, ItemId, ItemKind, KeyValueFields,
};
use ovl_store::{MemoryStore, RecordStore};
use std::sync::Arc;

/// In-memory engine with direct access to its store and registry
#[derive(Debug, Clone)]
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub registry: Arc<ExampleRegistry>,
    pub engine: OverlayEngine,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(&EngineConfig::default())
    }

    pub fn with_config(config: &EngineConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let registry = Arc::new(ExampleRegistry::new());
        let engine = OverlayEngine::new(
            Arc::clone(&store) as Arc<dyn RecordStore>,
            Arc::clone(&registry) as Arc<dyn ExampleResolver>,
            config,
        );
        Self {
            store,
            registry,
            engine,
        }
    }

    /// Plain example, usable as origin or delta
    pub fn example(&self) -> ExampleId {
        self.registry.create_example()
    }

    /// Example registered as a version of `parent`
    pub fn version_of(&self, parent: ExampleId) -> ExampleId {
        self.registry.create_version(parent)
    }

    /// Create one header per key (value `"v-<key>"`) in order
    pub async fn seed_headers(&self, example: ExampleId, keys: &[&str]) -> Vec<ItemId> {
        let mut ids = Vec::with_capacity(keys.len());
        for key in keys {
            ids.push(
                self.engine
                    .headers
                    .create(example, header(key, &format!("v-{key}")))
                    .await
                    .unwrap(),
            );
        }
        ids
    }

    /// Header keys of `example` in list order
    pub async fn header_keys(&self, example: ExampleId) -> Vec<String> {
        self.engine
            .headers
            .list(example)
            .await
            .unwrap()
            .into_iter()
            .map(|item| item.fields.key)
            .collect()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

pub fn header(key: &str, value: &str) -> KeyValueFields {
    KeyValueFields::new(key, value)
}

pub fn query(key: &str, value: &str) -> KeyValueFields {
    KeyValueFields::new(key, value)
}

pub fn assertion(path: &str, value: &str) -> AssertionFields {
    AssertionFields::new(Condition::new(ComparisonKind::Equal, path, value))
}

/// `(key, source)` pairs of header/query overlay rows
pub fn key_sources<K>(rows: &[OverlayRow<K>]) -> Vec<(String, Source)>
where
    K: ItemKind<Fields = KeyValueFields>,
{
    rows.iter()
        .map(|row| (row.fields.key.clone(), row.source))
        .collect()
}
