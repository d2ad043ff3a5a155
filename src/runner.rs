//! Run orchestration.
//!
//! Wires the statement stream, sync session, write batcher, and watermark
//! store into the supported run modes: single-pass (explicit selection or
//! every table in the dump), two-pass smart scope, and baseline watermark
//! initialization. One `Runner` allows one run at a time; a failed run
//! releases the guard so it can simply be retried.

use crate::dump::{self, DumpMeta};
use crate::logging::RunLogger;
use crate::parser::statement::normalize_table_name;
use crate::parser::StatementStream;
use crate::presets;
use crate::progress;
use crate::store::DocumentStore;
use crate::sync::batcher::WriteBatcher;
use crate::sync::{ParseStats, SyncSession, TableSummary};
use crate::watermark::WatermarkStore;
use anyhow::{bail, Result};
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Explicit table selection; ignored in all-tables and smart-scope modes.
    pub tables: Vec<String>,
    pub all_tables: bool,
    pub smart_scope: bool,
    pub dry_run: bool,
    pub reset_watermark: bool,
    /// Free-text audit note persisted into the watermark records.
    pub note: String,
}

/// Outcome of a smart-scope discovery pass.
#[derive(Debug, Clone, Serialize)]
pub struct Discovery {
    pub changed_tables: Vec<String>,
    pub tables: Vec<String>,
    pub modules: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub file: String,
    pub dry_run: bool,
    pub tables: Vec<TableSummary>,
    pub parse_stats: ParseStats,
    pub committed_rows: u64,
    pub commit_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discovery: Option<Discovery>,
}

#[derive(Debug, Serialize)]
pub struct BaselineReport {
    pub file: String,
    pub tables: Vec<TableSummary>,
    pub parse_stats: ParseStats,
    pub written: usize,
    pub without_numeric_id: usize,
}

pub struct Runner<'a> {
    store: &'a dyn DocumentStore,
    logger: &'a dyn RunLogger,
    running: AtomicBool,
    progress_fn: Option<Box<dyn Fn(u64, u64, u64) + 'a>>,
    retry_backoff: Option<Duration>,
}

impl<'a> Runner<'a> {
    pub fn new(store: &'a dyn DocumentStore, logger: &'a dyn RunLogger) -> Self {
        Self {
            store,
            logger,
            running: AtomicBool::new(false),
            progress_fn: None,
            retry_backoff: None,
        }
    }

    /// Progress callback receiving `(percent, bytes_read, total_bytes)`
    /// after each buffer refill.
    pub fn with_progress<F: Fn(u64, u64, u64) + 'a>(mut self, f: F) -> Self {
        self.progress_fn = Some(Box::new(f));
        self
    }

    /// Overrides the commit/state-write retry backoff base.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = Some(backoff);
        self
    }

    /// Runs a sync in the mode selected by `options`.
    pub fn run(&self, path: &Path, options: &RunOptions) -> Result<RunReport> {
        let _guard = self.acquire()?;
        let meta = dump::stat(path)?;

        self.logger.info(&format!(
            "File selected: {} ({:.2} MB)",
            meta.name,
            mb(meta.size)
        ));
        self.logger.info(&format!(
            "Mode: {} | Reset watermark: {}",
            if options.dry_run { "DRY RUN" } else { "WRITE" },
            if options.reset_watermark { "Yes" } else { "No" }
        ));

        if options.smart_scope {
            return self.run_smart_scope(path, &meta, options);
        }
        self.run_single_pass(path, &meta, options)
    }

    fn run_single_pass(
        &self,
        path: &Path,
        meta: &DumpMeta,
        options: &RunOptions,
    ) -> Result<RunReport> {
        let watermark_store = self.watermark_store();
        let mut session = SyncSession::new(self.logger, Some(&watermark_store), options.reset_watermark);

        let selected: Vec<String> = options
            .tables
            .iter()
            .map(|t| normalize_table_name(t))
            .collect();

        if options.all_tables {
            self.logger.info("Table scope: all tables from dump (auto-discover)");
            if !options.reset_watermark {
                session.set_watermarks(watermark_store.read_all());
            }
        } else {
            if selected.is_empty() {
                bail!("no tables selected; pass an explicit selection or enable all-tables mode");
            }
            self.logger
                .info(&format!("Table scope: {} selected table(s)", selected.len()));
            self.logger.info(&format!("Tables: {}", selected.join(", ")));
            session.set_watermarks(watermark_store.read_many(&selected));
            session.select_tables(&selected);
        }

        let mut batcher = self.batcher();
        {
            let sink = if options.dry_run { None } else { Some(&mut batcher) };
            self.scan(path, meta, &mut session, sink)?;
        }

        if !options.dry_run {
            batcher.flush()?;
            watermark_store.record_run(session.summaries(), meta, &options.note)?;
        }

        self.summarize(&session, options.dry_run, options.all_tables, &batcher);
        Ok(self.report(meta, options.dry_run, session, &batcher, None))
    }

    fn run_smart_scope(
        &self,
        path: &Path,
        meta: &DumpMeta,
        options: &RunOptions,
    ) -> Result<RunReport> {
        let watermark_store = self.watermark_store();

        self.logger.info(
            "Smart scope scan started. Scanning full dump and checking all tables for new rows...",
        );
        let mut discovery_session =
            SyncSession::new(self.logger, Some(&watermark_store), options.reset_watermark);
        if !options.reset_watermark {
            discovery_session.set_watermarks(watermark_store.read_all());
        }
        self.scan(path, meta, &mut discovery_session, None)?;

        let changed_tables: Vec<String> = discovery_session
            .summaries()
            .filter(|s| s.new_rows > 0)
            .map(|s| s.table.clone())
            .collect();
        let scope = presets::expand_to_module_scope(&changed_tables);
        let modules = presets::modules_for_tables(&scope);

        self.logger.info(&format!(
            "Smart scan checked {} table(s) in dump.",
            discovery_session.summaries().count()
        ));
        self.logger.info(&format!(
            "Smart scope selected {} changed table(s) for sync.",
            scope.len()
        ));
        if !modules.is_empty() {
            self.logger
                .info(&format!("Module impact: {}", modules.join(", ")));
        }

        let discovery = Discovery {
            changed_tables,
            tables: scope.clone(),
            modules,
        };

        if scope.is_empty() {
            self.logger
                .info("No changed operational tables detected. Nothing to sync.");
            discovery_session.retain_tables(&scope);
            let batcher = self.batcher();
            return Ok(self.report(
                meta,
                options.dry_run,
                discovery_session,
                &batcher,
                Some(discovery),
            ));
        }

        if options.dry_run {
            discovery_session.retain_tables(&scope);
            let batcher = self.batcher();
            self.summarize(&discovery_session, true, false, &batcher);
            return Ok(self.report(meta, true, discovery_session, &batcher, Some(discovery)));
        }

        // Write pass over exactly the discovered scope, with fresh state.
        self.logger.info("Re-reading dump for smart scope write pass...");
        let mut session =
            SyncSession::new(self.logger, Some(&watermark_store), options.reset_watermark);
        session.set_watermarks(watermark_store.read_many(&scope));
        session.select_tables(&scope);

        let mut batcher = self.batcher();
        self.scan(path, meta, &mut session, Some(&mut batcher))?;
        batcher.flush()?;
        watermark_store.record_run(session.summaries(), meta, &options.note)?;

        self.summarize(&session, false, false, &batcher);
        Ok(self.report(meta, false, session, &batcher, Some(discovery)))
    }

    /// Scans the whole dump once and seeds one watermark document per table
    /// found, without writing any row data.
    pub fn baseline(&self, path: &Path, note: &str) -> Result<BaselineReport> {
        let _guard = self.acquire()?;
        let meta = dump::stat(path)?;

        self.logger.info(&format!(
            "Baseline file: {} ({:.2} MB)",
            meta.name,
            mb(meta.size)
        ));
        self.logger
            .info("Mode: WATERMARK INITIALIZATION (state only, no data upload)");

        // No watermark lookups: every table is classified from 0 so the
        // baseline captures the full id range present in the file.
        let mut session = SyncSession::new(self.logger, None, true);
        self.scan(path, &meta, &mut session, None)?;

        let watermark_store = self.watermark_store();
        let stats = watermark_store.write_baseline(session.summaries(), &meta, note)?;

        self.logger.info(&format!(
            "Initialization complete. State docs written: {}. Tables without numeric ID: {}.",
            stats.written, stats.without_numeric_id
        ));
        let parse_stats = session.parse_stats();
        self.logger.info(&format!(
            "Statements parsed: {} (CREATE: {}, INSERT: {})",
            parse_stats.statements, parse_stats.create_statements, parse_stats.insert_statements
        ));

        Ok(BaselineReport {
            file: meta.name,
            tables: session.summaries().cloned().collect(),
            parse_stats,
            written: stats.written,
            without_numeric_id: stats.without_numeric_id,
        })
    }

    fn scan(
        &self,
        path: &Path,
        meta: &DumpMeta,
        session: &mut SyncSession,
        mut batcher: Option<&mut WriteBatcher>,
    ) -> Result<()> {
        let total = meta.size;
        let reader = dump::open(path, |bytes| {
            if let Some(cb) = &self.progress_fn {
                cb(progress::percent(bytes, total), bytes, total);
            }
        })?;

        let mut stream = StatementStream::new(reader);
        while let Some(stmt) = stream.read_statement()? {
            session.process_statement(&stmt, batcher.as_deref_mut())?;
        }
        Ok(())
    }

    fn summarize(
        &self,
        session: &SyncSession,
        dry_run: bool,
        all_tables: bool,
        batcher: &WriteBatcher,
    ) {
        let mut rows_seen = 0u64;
        let mut new_rows = 0u64;
        let mut skipped = 0u64;
        for summary in session.summaries() {
            rows_seen += summary.rows_seen;
            new_rows += summary.new_rows;
            skipped += summary.skipped_rows;
            self.logger.info(&format!(
                "{}: watermark={} rows_seen={} new={} skipped={} max_id={}",
                summary.table,
                summary.effective_last_id,
                summary.rows_seen,
                summary.new_rows,
                summary.skipped_rows,
                summary
                    .max_id_in_file
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".to_string())
            ));
        }

        self.logger.info(&format!(
            "{}. Tables: {}, Rows seen: {}, New rows: {}, Skipped: {}",
            if dry_run { "Dry run complete" } else { "Sync complete" },
            session.summaries().count(),
            rows_seen,
            new_rows,
            skipped
        ));

        let stats = session.parse_stats();
        self.logger.info(&format!(
            "Statements parsed: {} (CREATE: {}, INSERT: {})",
            stats.statements, stats.create_statements, stats.insert_statements
        ));

        if !dry_run {
            self.logger.info(&format!(
                "Writes committed: {} in {} batch(es)",
                batcher.committed_rows(),
                batcher.commit_count()
            ));
        }

        if !all_tables {
            let not_found: Vec<&str> = session
                .summaries()
                .filter(|s| !s.found_in_file)
                .map(|s| s.table.as_str())
                .collect();
            if !not_found.is_empty() {
                self.logger.warn(&format!(
                    "Selected tables not found in dump: {}",
                    not_found.join(", ")
                ));
            }
        }
    }

    fn report(
        &self,
        meta: &DumpMeta,
        dry_run: bool,
        session: SyncSession,
        batcher: &WriteBatcher,
        discovery: Option<Discovery>,
    ) -> RunReport {
        RunReport {
            file: meta.name.clone(),
            dry_run,
            tables: session.summaries().cloned().collect(),
            parse_stats: session.parse_stats(),
            committed_rows: batcher.committed_rows(),
            commit_count: batcher.commit_count(),
            discovery,
        }
    }

    fn watermark_store(&self) -> WatermarkStore<'_> {
        let store = WatermarkStore::new(self.store, self.logger);
        match self.retry_backoff {
            Some(backoff) => store.with_backoff(backoff),
            None => store,
        }
    }

    fn batcher(&self) -> WriteBatcher<'_> {
        let batcher = WriteBatcher::new(self.store, self.logger);
        match self.retry_backoff {
            Some(backoff) => batcher.with_backoff(backoff),
            None => batcher,
        }
    }

    fn acquire(&self) -> Result<RunGuard<'_>> {
        if self.running.swap(true, Ordering::SeqCst) {
            bail!("a sync run is already in progress");
        }
        Ok(RunGuard(&self.running))
    }
}

/// Clears the running flag when a run ends, on success and failure alike.
struct RunGuard<'r>(&'r AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}
