//! Bounded write batching with retry.
//!
//! Row upserts are accumulated into one open batch and committed once the
//! batch reaches the store's operation limit, or on a final flush. Commits
//! are issued one at a time in file order; a commit is retried before its
//! failure aborts the run, and batches committed earlier stay committed.

use crate::logging::RunLogger;
use crate::store::{DocumentStore, WriteOp, MAX_BATCH_OPS};
use anyhow::{Context, Result};
use std::time::Duration;

const COMMIT_ATTEMPTS: u32 = 3;
const COMMIT_BACKOFF: Duration = Duration::from_millis(600);

pub struct WriteBatcher<'a> {
    store: &'a dyn DocumentStore,
    logger: &'a dyn RunLogger,
    pending: Vec<WriteOp>,
    backoff: Duration,
    committed_rows: u64,
    commit_count: u64,
}

impl<'a> WriteBatcher<'a> {
    pub fn new(store: &'a dyn DocumentStore, logger: &'a dyn RunLogger) -> Self {
        Self {
            store,
            logger,
            pending: Vec::with_capacity(MAX_BATCH_OPS),
            backoff: COMMIT_BACKOFF,
            committed_rows: 0,
            commit_count: 0,
        }
    }

    /// Overrides the base retry backoff (the n-th retry waits n times this).
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Queues one merge upsert, committing the open batch when it is full.
    pub fn push(&mut self, op: WriteOp) -> Result<()> {
        self.pending.push(op);
        if self.pending.len() >= MAX_BATCH_OPS {
            self.flush()?;
        }
        Ok(())
    }

    /// Commits whatever is pending. A no-op on an empty batch.
    pub fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let mut attempt = 1;
        loop {
            match self.store.commit(&self.pending) {
                Ok(()) => {
                    self.committed_rows += self.pending.len() as u64;
                    self.commit_count += 1;
                    self.pending.clear();
                    return Ok(());
                }
                Err(err) if attempt < COMMIT_ATTEMPTS => {
                    self.logger
                        .warn(&format!("Batch commit retry {attempt} failed: {err}"));
                    std::thread::sleep(self.backoff * attempt);
                    attempt += 1;
                }
                Err(err) => {
                    return Err(err).context("batch commit failed after retries");
                }
            }
        }
    }

    pub fn pending_ops(&self) -> usize {
        self.pending.len()
    }

    pub fn committed_rows(&self) -> u64 {
        self.committed_rows
    }

    pub fn commit_count(&self) -> u64 {
        self.commit_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemoryLogger;
    use crate::store::memory::MemoryStore;
    use crate::store::Fields;

    fn op(key: &str) -> WriteOp {
        let mut fields = Fields::new();
        fields.insert("id".into(), serde_json::Value::from(1));
        WriteOp::new("tbl_x", key, fields)
    }

    #[test]
    fn flush_on_empty_batch_is_a_noop() {
        let store = MemoryStore::new();
        let logger = MemoryLogger::new();
        let mut batcher = WriteBatcher::new(&store, &logger);

        batcher.flush().unwrap();
        assert_eq!(batcher.commit_count(), 0);
    }

    #[test]
    fn commits_when_batch_limit_is_reached() {
        let store = MemoryStore::new();
        let logger = MemoryLogger::new();
        let mut batcher = WriteBatcher::new(&store, &logger);

        for i in 0..MAX_BATCH_OPS {
            batcher.push(op(&i.to_string())).unwrap();
        }
        assert_eq!(batcher.pending_ops(), 0);
        assert_eq!(batcher.commit_count(), 1);
        assert_eq!(batcher.committed_rows(), MAX_BATCH_OPS as u64);
        assert_eq!(store.collection_keys("tbl_x").len(), MAX_BATCH_OPS);
    }

    #[test]
    fn retries_failed_commit_then_succeeds() {
        let store = MemoryStore::new();
        store.fail_next_commits(1);
        let logger = MemoryLogger::new();
        let mut batcher =
            WriteBatcher::new(&store, &logger).with_backoff(Duration::from_millis(1));

        batcher.push(op("1")).unwrap();
        batcher.flush().unwrap();

        assert_eq!(batcher.committed_rows(), 1);
        assert_eq!(logger.warnings().len(), 1);
        assert_eq!(store.collection_keys("tbl_x"), vec!["1".to_string()]);
    }

    #[test]
    fn exhausted_retries_propagate_the_error() {
        let store = MemoryStore::new();
        store.fail_next_commits(3);
        let logger = MemoryLogger::new();
        let mut batcher =
            WriteBatcher::new(&store, &logger).with_backoff(Duration::from_millis(1));

        batcher.push(op("1")).unwrap();
        assert!(batcher.flush().is_err());
        assert_eq!(logger.warnings().len(), 2);
        assert!(store.collection_keys("tbl_x").is_empty());
    }
}
