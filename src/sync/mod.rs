//! Per-run sync state and row classification.
//!
//! A [`SyncSession`] is created for one pass over one dump file and discarded
//! afterwards. It owns all mutable run state: discovered schemas, per-table
//! summaries, the watermark cache, parse counters, and the deduplicated
//! warning set. Statements are fed in file order; rows that clear their
//! table's watermark are handed to the [`WriteBatcher`].

pub mod batcher;

use crate::logging::RunLogger;
use crate::parser::statement::{self, Insert, Statement};
use crate::parser::values::split_value_tuples;
use crate::resolver::IdResolver;
use crate::schema::SchemaCatalog;
use crate::store::{Fields, WriteOp};
use crate::sync::batcher::WriteBatcher;
use crate::value::{self, SqlValue};
use crate::watermark::WatermarkStore;
use ahash::{AHashMap, AHashSet};
use anyhow::Result;
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-table, per-run sync bookkeeping.
#[derive(Debug, Clone, Serialize)]
pub struct TableSummary {
    pub table: String,
    /// Persisted watermark at run start.
    pub watermark: i64,
    /// Watermark actually applied to row classification: 0 on a reset run.
    pub effective_last_id: i64,
    pub watermark_reset: bool,
    pub id_column: Option<String>,
    pub found_in_file: bool,
    pub rows_seen: u64,
    pub new_rows: u64,
    pub skipped_rows: u64,
    pub missing_id_rows: u64,
    pub max_id_in_file: Option<i64>,
}

impl TableSummary {
    fn new(table: &str, watermark: i64, reset: bool) -> Self {
        Self {
            table: table.to_string(),
            watermark,
            effective_last_id: if reset { 0 } else { watermark },
            watermark_reset: reset,
            id_column: None,
            found_in_file: false,
            rows_seen: 0,
            new_rows: 0,
            skipped_rows: 0,
            missing_id_rows: 0,
            max_id_in_file: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn new_for_tests(table: &str) -> Self {
        Self::new(table, 0, false)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ParseStats {
    pub statements: u64,
    pub create_statements: u64,
    pub insert_statements: u64,
}

pub struct SyncSession<'a> {
    logger: &'a dyn RunLogger,
    /// Lazy watermark lookups fall back to this; `None` forces 0 (baseline).
    source: Option<&'a WatermarkStore<'a>>,
    reset_watermark: bool,
    resolver: IdResolver,
    schemas: SchemaCatalog,
    summaries: BTreeMap<String, TableSummary>,
    watermarks: AHashMap<String, i64>,
    selected: Option<AHashSet<String>>,
    warned: AHashSet<String>,
    parse_stats: ParseStats,
}

impl<'a> SyncSession<'a> {
    pub fn new(
        logger: &'a dyn RunLogger,
        source: Option<&'a WatermarkStore<'a>>,
        reset_watermark: bool,
    ) -> Self {
        Self {
            logger,
            source,
            reset_watermark,
            resolver: IdResolver::new(),
            schemas: SchemaCatalog::new(),
            summaries: BTreeMap::new(),
            watermarks: AHashMap::new(),
            selected: None,
            warned: AHashSet::new(),
            parse_stats: ParseStats::default(),
        }
    }

    pub fn with_resolver(mut self, resolver: IdResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Seeds the watermark cache. Call before [`Self::select_tables`] so the
    /// seeded summaries pick up the preloaded values.
    pub fn set_watermarks(&mut self, watermarks: AHashMap<String, i64>) {
        self.watermarks = watermarks;
    }

    /// Restricts processing to the given tables and creates a summary entry
    /// for each, so tables absent from the dump still show up in the report.
    pub fn select_tables(&mut self, tables: &[String]) {
        let normalized: Vec<String> = tables
            .iter()
            .map(|t| statement::normalize_table_name(t))
            .collect();
        for table in &normalized {
            self.ensure_summary(table);
        }
        self.selected = Some(normalized.into_iter().collect());
    }

    /// Feeds one lexed statement through classification and, for inserts,
    /// row-level watermark gating. New rows go to `batcher` when present;
    /// passing `None` makes this a dry pass.
    pub fn process_statement(
        &mut self,
        raw: &str,
        mut batcher: Option<&mut WriteBatcher>,
    ) -> Result<()> {
        let sql = statement::strip_leading_comments(raw);
        if sql.is_empty() {
            return Ok(());
        }
        self.parse_stats.statements += 1;

        match statement::classify(sql) {
            Some(Statement::CreateTable(ct)) => {
                self.parse_stats.create_statements += 1;
                if self.is_excluded(&ct.table) {
                    return Ok(());
                }
                self.schemas.record(&ct);
                self.ensure_summary(&ct.table);
                let summary = self.summaries.get_mut(&ct.table).expect("just ensured");
                summary.found_in_file = true;
                if summary.id_column.is_none() {
                    summary.id_column = ct.auto_increment_column.clone();
                }
                Ok(())
            }
            Some(Statement::Insert(ins)) => {
                self.parse_stats.insert_statements += 1;
                if self.is_excluded(&ins.table) {
                    return Ok(());
                }
                self.process_insert(&ins, batcher.as_deref_mut())
            }
            None => Ok(()),
        }
    }

    fn process_insert(
        &mut self,
        ins: &Insert,
        mut batcher: Option<&mut WriteBatcher>,
    ) -> Result<()> {
        // The summary exists before any column check, so tables seen only
        // through unreadable inserts still appear in baseline records.
        self.ensure_summary(&ins.table);
        self.summaries
            .get_mut(&ins.table)
            .expect("just ensured")
            .found_in_file = true;

        let columns: Vec<String> = match &ins.columns {
            Some(cols) if !cols.is_empty() => cols.clone(),
            _ => match self.schemas.get(&ins.table) {
                Some(schema) if !schema.columns.is_empty() => schema.columns.clone(),
                _ => {
                    self.warn_once(
                        &format!("missing-columns-{}", ins.table),
                        &format!(
                            "{}: INSERT without column list and no CREATE TABLE schema found. Statement skipped.",
                            ins.table
                        ),
                    );
                    return Ok(());
                }
            },
        };

        let auto_increment = self
            .schemas
            .get(&ins.table)
            .and_then(|s| s.auto_increment_column.clone());

        let id_column = {
            let summary = self.summaries.get_mut(&ins.table).expect("just ensured");
            if summary.id_column.is_none() {
                summary.id_column =
                    self.resolver
                        .resolve(&ins.table, &columns, auto_increment.as_deref());
            }
            summary.id_column.clone()
        };

        let id_index = id_column
            .as_deref()
            .and_then(|id| columns.iter().position(|c| c == id));
        let Some(id_index) = id_index else {
            self.warn_once(
                &format!("missing-id-column-{}", ins.table),
                &format!("{}: could not detect ID column. Table skipped.", ins.table),
            );
            return Ok(());
        };

        let rows = split_value_tuples(&ins.values);
        let summary = self.summaries.get_mut(&ins.table).expect("just ensured");

        for raw_values in rows {
            summary.rows_seen += 1;

            // A short tuple reads missing fields as empty strings, matching
            // the column-positional record shape of the dump.
            let decoded: Vec<SqlValue> = (0..columns.len())
                .map(|i| value::decode(raw_values.get(i).map(String::as_str).unwrap_or("")))
                .collect();

            let Some(id) = decoded[id_index].as_numeric_id() else {
                summary.skipped_rows += 1;
                summary.missing_id_rows += 1;
                continue;
            };

            summary.max_id_in_file = Some(match summary.max_id_in_file {
                Some(max) => max.max(id),
                None => id,
            });

            if id <= summary.effective_last_id {
                summary.skipped_rows += 1;
                continue;
            }

            summary.new_rows += 1;

            if let Some(batcher) = batcher.as_deref_mut() {
                let fields: Fields = columns
                    .iter()
                    .zip(&decoded)
                    .map(|(col, val)| (col.clone(), val.to_json()))
                    .collect();
                batcher.push(WriteOp::new(ins.table.clone(), id.to_string(), fields))?;
            }
        }

        Ok(())
    }

    fn is_excluded(&self, table: &str) -> bool {
        self.selected
            .as_ref()
            .is_some_and(|set| !set.contains(table))
    }

    fn ensure_summary(&mut self, table: &str) {
        if self.summaries.contains_key(table) {
            return;
        }
        let watermark = self.watermark_for(table);
        self.summaries.insert(
            table.to_string(),
            TableSummary::new(table, watermark, self.reset_watermark),
        );
    }

    fn watermark_for(&mut self, table: &str) -> i64 {
        if let Some(watermark) = self.watermarks.get(table) {
            return *watermark;
        }
        let watermark = match self.source {
            Some(source) => source.read_one(table),
            None => 0,
        };
        self.watermarks.insert(table.to_string(), watermark);
        watermark
    }

    fn warn_once(&mut self, key: &str, message: &str) {
        if self.warned.insert(key.to_string()) {
            self.logger.warn(message);
        }
    }

    /// Summaries in table-name order.
    pub fn summaries(&self) -> impl Iterator<Item = &TableSummary> {
        self.summaries.values()
    }

    pub fn summary(&self, table: &str) -> Option<&TableSummary> {
        self.summaries.get(table)
    }

    /// Drops summaries for tables outside the given set.
    pub fn retain_tables(&mut self, tables: &[String]) {
        let allowed: AHashSet<String> = tables
            .iter()
            .map(|t| statement::normalize_table_name(t))
            .collect();
        self.summaries.retain(|table, _| allowed.contains(table));
    }

    pub fn parse_stats(&self) -> ParseStats {
        self.parse_stats
    }
}
