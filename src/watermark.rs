//! Persisted per-table watermark bookkeeping.
//!
//! One document per table in a fixed collection records the highest row id
//! ever synced plus run audit fields. Reads degrade to 0 on failure (a low
//! watermark only causes redundant idempotent rewrites, never data loss);
//! writes are merge upserts retried a few times before the run fails.

use crate::dump::DumpMeta;
use crate::logging::RunLogger;
use crate::parser::statement::normalize_table_name;
use crate::store::{DocumentStore, Fields, WriteOp, MAX_BATCH_OPS};
use crate::sync::TableSummary;
use ahash::AHashMap;
use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use std::time::Duration;

/// Collection holding one bookkeeping document per table.
pub const SYNC_STATE_COLLECTION: &str = "sys_sync_state";

const STATE_WRITE_ATTEMPTS: u32 = 3;
const STATE_WRITE_BACKOFF: Duration = Duration::from_millis(400);
const BASELINE_COMMIT_BACKOFF: Duration = Duration::from_millis(500);

pub struct BaselineStats {
    pub written: usize,
    pub without_numeric_id: usize,
}

pub struct WatermarkStore<'a> {
    store: &'a dyn DocumentStore,
    logger: &'a dyn RunLogger,
    state_backoff: Duration,
    batch_backoff: Duration,
}

impl<'a> WatermarkStore<'a> {
    pub fn new(store: &'a dyn DocumentStore, logger: &'a dyn RunLogger) -> Self {
        Self {
            store,
            logger,
            state_backoff: STATE_WRITE_BACKOFF,
            batch_backoff: BASELINE_COMMIT_BACKOFF,
        }
    }

    /// Overrides the base retry backoffs (the n-th retry waits n times this).
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.state_backoff = backoff;
        self.batch_backoff = backoff;
        self
    }

    /// Last synced id for one table. Missing document and read failure both
    /// map to 0; the failure is warned, not escalated.
    pub fn read_one(&self, table: &str) -> i64 {
        match self.store.get(SYNC_STATE_COLLECTION, table) {
            Ok(Some(fields)) => last_id_of(&fields),
            Ok(None) => 0,
            Err(err) => {
                self.logger
                    .warn(&format!("Failed reading watermark for {table}: {err}"));
                0
            }
        }
    }

    pub fn read_many(&self, tables: &[String]) -> AHashMap<String, i64> {
        tables
            .iter()
            .map(|table| (table.clone(), self.read_one(table)))
            .collect()
    }

    /// Bulk preload of every stored watermark. Degrades to an empty map with
    /// a warning on failure.
    pub fn read_all(&self) -> AHashMap<String, i64> {
        match self.store.list(SYNC_STATE_COLLECTION) {
            Ok(docs) => docs
                .into_iter()
                .map(|(key, fields)| (normalize_table_name(&key), last_id_of(&fields)))
                .collect(),
            Err(err) => {
                self.logger
                    .warn(&format!("Failed preloading watermarks: {err}"));
                AHashMap::new()
            }
        }
    }

    /// Persists the outcome of a write run. Only tables that actually gained
    /// rows (and have a known max id) are touched; the merge upsert keeps any
    /// baseline fields already on the document.
    pub fn record_run<'s, I>(&self, summaries: I, meta: &DumpMeta, note: &str) -> Result<()>
    where
        I: IntoIterator<Item = &'s TableSummary>,
    {
        for summary in summaries {
            let Some(max_id) = summary.max_id_in_file else {
                continue;
            };
            if summary.new_rows == 0 {
                continue;
            }

            let payload = json!({
                "table": summary.table,
                "last_id": max_id,
                "id_column": summary.id_column.clone().unwrap_or_else(|| "id".to_string()),
                "rows_seen": summary.rows_seen,
                "new_rows": summary.new_rows,
                "skipped_rows": summary.skipped_rows,
                "max_id_in_file": max_id,
                "last_file_name": meta.name,
                "last_file_size": meta.size,
                "last_note": note,
                "updated_at": chrono::Utc::now().to_rfc3339(),
            });
            self.write_with_retry(&summary.table, payload)?;
        }
        Ok(())
    }

    /// Seeds one watermark document per discovered table from a baseline
    /// scan, including tables without a resolvable numeric id.
    pub fn write_baseline<'s, I>(
        &self,
        summaries: I,
        meta: &DumpMeta,
        note: &str,
    ) -> Result<BaselineStats>
    where
        I: IntoIterator<Item = &'s TableSummary>,
    {
        let summaries: Vec<&TableSummary> = summaries.into_iter().collect();
        if summaries.is_empty() {
            bail!("no tables discovered while parsing baseline file");
        }

        let now = chrono::Utc::now().to_rfc3339();
        let mut batch: Vec<WriteOp> = Vec::new();
        let mut stats = BaselineStats {
            written: 0,
            without_numeric_id: 0,
        };

        for summary in summaries {
            let has_numeric_id = summary.max_id_in_file.is_some();
            if !has_numeric_id {
                stats.without_numeric_id += 1;
            }

            let payload = json!({
                "table": summary.table,
                "last_id": summary.max_id_in_file.unwrap_or(0),
                "id_column": summary.id_column.clone().unwrap_or_default(),
                "has_numeric_id": has_numeric_id,
                "rows_seen_in_baseline": summary.rows_seen,
                "baseline_file_name": meta.name,
                "baseline_file_size": meta.size,
                "baseline_note": note,
                "baseline_initialized_at": now,
                "updated_at": now,
            });
            batch.push(WriteOp::new(
                SYNC_STATE_COLLECTION,
                summary.table.clone(),
                as_fields(payload),
            ));
            stats.written += 1;

            if batch.len() >= MAX_BATCH_OPS {
                self.commit_with_retry(&batch)?;
                batch.clear();
            }
        }

        if !batch.is_empty() {
            self.commit_with_retry(&batch)?;
        }
        Ok(stats)
    }

    fn write_with_retry(&self, table: &str, payload: Value) -> Result<()> {
        let op = WriteOp::new(SYNC_STATE_COLLECTION, table, as_fields(payload));
        let mut attempt = 1;
        loop {
            match self.store.commit(std::slice::from_ref(&op)) {
                Ok(()) => return Ok(()),
                Err(err) if attempt < STATE_WRITE_ATTEMPTS => {
                    self.logger
                        .warn(&format!("State update retry {attempt} failed for {table}: {err}"));
                    std::thread::sleep(self.state_backoff * attempt);
                    attempt += 1;
                }
                Err(err) => {
                    return Err(err).with_context(|| format!("state update failed for {table}"));
                }
            }
        }
    }

    fn commit_with_retry(&self, ops: &[WriteOp]) -> Result<()> {
        let mut attempt = 1;
        loop {
            match self.store.commit(ops) {
                Ok(()) => return Ok(()),
                Err(err) if attempt < STATE_WRITE_ATTEMPTS => {
                    self.logger
                        .warn(&format!("State batch retry {attempt} failed: {err}"));
                    std::thread::sleep(self.batch_backoff * attempt);
                    attempt += 1;
                }
                Err(err) => return Err(err).context("baseline state batch failed"),
            }
        }
    }
}

/// `last_id` as a truncated integer; anything unreadable counts as 0.
fn last_id_of(fields: &Fields) -> i64 {
    match fields.get("last_id") {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f.trunc() as i64)
            .unwrap_or(0),
        _ => 0,
    }
}

fn as_fields(payload: Value) -> Fields {
    payload.as_object().cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::MemoryLogger;
    use crate::store::memory::MemoryStore;

    fn meta() -> DumpMeta {
        DumpMeta {
            name: "dump.sql".to_string(),
            size: 1234,
        }
    }

    fn summary(table: &str, new_rows: u64, max_id: Option<i64>) -> TableSummary {
        let mut s = TableSummary::new_for_tests(table);
        s.new_rows = new_rows;
        s.rows_seen = new_rows;
        s.max_id_in_file = max_id;
        s.id_column = Some("id".to_string());
        s
    }

    #[test]
    fn missing_watermark_reads_as_zero() {
        let store = MemoryStore::new();
        let logger = MemoryLogger::new();
        let wm = WatermarkStore::new(&store, &logger);
        assert_eq!(wm.read_one("tbl_x"), 0);
        assert!(logger.warnings().is_empty());
    }

    #[test]
    fn record_run_skips_tables_without_new_rows() {
        let store = MemoryStore::new();
        let logger = MemoryLogger::new();
        let wm = WatermarkStore::new(&store, &logger);

        let summaries = [
            summary("tbl_a", 3, Some(30)),
            summary("tbl_b", 0, Some(10)),
            summary("tbl_c", 2, None),
        ];
        wm.record_run(summaries.iter(), &meta(), "nightly").unwrap();

        assert_eq!(wm.read_one("tbl_a"), 30);
        assert!(store.document(SYNC_STATE_COLLECTION, "tbl_b").is_none());
        assert!(store.document(SYNC_STATE_COLLECTION, "tbl_c").is_none());

        let doc = store.document(SYNC_STATE_COLLECTION, "tbl_a").unwrap();
        assert_eq!(doc.get("last_note"), Some(&Value::from("nightly")));
        assert_eq!(doc.get("last_file_size"), Some(&Value::from(1234)));
    }

    #[test]
    fn state_write_retries_then_succeeds() {
        let store = MemoryStore::new();
        store.fail_next_commits(1);
        let logger = MemoryLogger::new();
        let wm = WatermarkStore::new(&store, &logger).with_backoff(Duration::from_millis(1));

        wm.record_run([summary("tbl_a", 1, Some(5))].iter(), &meta(), "")
            .unwrap();
        assert_eq!(wm.read_one("tbl_a"), 5);
        assert_eq!(logger.warnings().len(), 1);
    }

    #[test]
    fn baseline_records_id_less_tables() {
        let store = MemoryStore::new();
        let logger = MemoryLogger::new();
        let wm = WatermarkStore::new(&store, &logger);

        let mut no_id = TableSummary::new_for_tests("tbl_noid");
        no_id.rows_seen = 4;

        let stats = wm
            .write_baseline(
                [summary("tbl_a", 7, Some(7)), no_id].iter(),
                &meta(),
                "initial load",
            )
            .unwrap();
        assert_eq!(stats.written, 2);
        assert_eq!(stats.without_numeric_id, 1);

        let doc = store.document(SYNC_STATE_COLLECTION, "tbl_noid").unwrap();
        assert_eq!(doc.get("has_numeric_id"), Some(&Value::from(false)));
        assert_eq!(doc.get("last_id"), Some(&Value::from(0)));
        assert_eq!(doc.get("rows_seen_in_baseline"), Some(&Value::from(4)));
    }

    #[test]
    fn baseline_with_no_tables_is_an_error() {
        let store = MemoryStore::new();
        let logger = MemoryLogger::new();
        let wm = WatermarkStore::new(&store, &logger);
        assert!(wm.write_baseline([].iter(), &meta(), "").is_err());
    }

    #[test]
    fn read_all_maps_tables_to_last_ids() {
        let store = MemoryStore::new();
        let logger = MemoryLogger::new();
        let wm = WatermarkStore::new(&store, &logger);

        wm.record_run(
            [summary("tbl_a", 1, Some(11)), summary("tbl_b", 1, Some(22))].iter(),
            &meta(),
            "",
        )
        .unwrap();

        let all = wm.read_all();
        assert_eq!(all.get("tbl_a"), Some(&11));
        assert_eq!(all.get("tbl_b"), Some(&22));
    }
}
