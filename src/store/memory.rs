//! In-memory document store.
//!
//! Backs the engine tests: documents live in nested maps, commits apply
//! merge semantics like the real backend, and a failure counter lets tests
//! exercise the retry paths.

use super::{DocumentStore, Fields, WriteOp, MAX_BATCH_OPS};
use ahash::AHashMap;
use anyhow::{bail, Result};
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<AHashMap<String, BTreeMap<String, Fields>>>,
    fail_commits: Mutex<u32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` commits fail with a simulated transport error.
    pub fn fail_next_commits(&self, n: u32) {
        *self.fail_commits.lock().expect("store poisoned") = n;
    }

    pub fn document(&self, collection: &str, key: &str) -> Option<Fields> {
        self.collections
            .lock()
            .expect("store poisoned")
            .get(collection)
            .and_then(|docs| docs.get(key))
            .cloned()
    }

    /// Keys of a collection in sorted order.
    pub fn collection_keys(&self, collection: &str) -> Vec<String> {
        self.collections
            .lock()
            .expect("store poisoned")
            .get(collection)
            .map(|docs| docs.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Full clone of every collection, for whole-store comparisons.
    pub fn snapshot(&self) -> AHashMap<String, BTreeMap<String, Fields>> {
        self.collections.lock().expect("store poisoned").clone()
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, collection: &str, key: &str) -> Result<Option<Fields>> {
        Ok(self.document(collection, key))
    }

    fn list(&self, collection: &str) -> Result<Vec<(String, Fields)>> {
        Ok(self
            .collections
            .lock()
            .expect("store poisoned")
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(key, fields)| (key.clone(), fields.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn commit(&self, ops: &[WriteOp]) -> Result<()> {
        if ops.len() > MAX_BATCH_OPS {
            bail!("batch of {} ops exceeds the {MAX_BATCH_OPS} op limit", ops.len());
        }

        {
            let mut remaining = self.fail_commits.lock().expect("store poisoned");
            if *remaining > 0 {
                *remaining -= 1;
                bail!("simulated commit failure");
            }
        }

        let mut collections = self.collections.lock().expect("store poisoned");
        for op in ops {
            let docs = collections.entry(op.collection.clone()).or_default();
            let doc = docs.entry(op.key.clone()).or_default();
            for (field, value) in &op.fields {
                doc.insert(field.clone(), value.clone());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, serde_json::Value)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn commit_merges_into_existing_documents() {
        let store = MemoryStore::new();
        store
            .commit(&[WriteOp::new(
                "t",
                "1",
                fields(&[("a", 1.into()), ("b", 2.into())]),
            )])
            .unwrap();
        store
            .commit(&[WriteOp::new("t", "1", fields(&[("b", 9.into())]))])
            .unwrap();

        let doc = store.document("t", "1").unwrap();
        assert_eq!(doc.get("a"), Some(&serde_json::Value::from(1)));
        assert_eq!(doc.get("b"), Some(&serde_json::Value::from(9)));
    }

    #[test]
    fn missing_documents_read_as_none() {
        let store = MemoryStore::new();
        assert!(store.get("t", "nope").unwrap().is_none());
        assert!(store.list("t").unwrap().is_empty());
    }

    #[test]
    fn oversized_batches_are_rejected() {
        let store = MemoryStore::new();
        let ops: Vec<WriteOp> = (0..=MAX_BATCH_OPS)
            .map(|i| WriteOp::new("t", i.to_string(), Fields::new()))
            .collect();
        assert!(store.commit(&ops).is_err());
    }
}
