//! Document store abstraction.
//!
//! The sync engine only needs three operations: fetch one document, list a
//! bookkeeping collection, and commit a bounded batch of merge upserts.
//! Inside the engine documents are plain JSON maps; whatever tagged wire
//! format a backend speaks stays inside that backend.

pub mod firestore;
pub mod memory;

use anyhow::Result;

pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Upper bound on operations per `commit` call.
pub const MAX_BATCH_OPS: usize = 400;

/// One merge upsert: fields are merged into the existing document, absent
/// fields are left untouched. Re-applying the same op is a no-op change.
#[derive(Debug, Clone)]
pub struct WriteOp {
    pub collection: String,
    pub key: String,
    pub fields: Fields,
}

impl WriteOp {
    pub fn new(collection: impl Into<String>, key: impl Into<String>, fields: Fields) -> Self {
        Self {
            collection: collection.into(),
            key: key.into(),
            fields,
        }
    }
}

pub trait DocumentStore {
    /// Fetches one document by key. `Ok(None)` means the document does not
    /// exist, which is distinct from a transport failure.
    fn get(&self, collection: &str, key: &str) -> Result<Option<Fields>>;

    /// Lists every document in a collection as `(key, fields)` pairs.
    fn list(&self, collection: &str) -> Result<Vec<(String, Fields)>>;

    /// Commits a batch of merge upserts atomically. Callers keep batches at
    /// or under [`MAX_BATCH_OPS`].
    fn commit(&self, ops: &[WriteOp]) -> Result<()>;
}
