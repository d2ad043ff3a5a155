use crate::logging::ConsoleLogger;
use crate::presets;
use crate::runner::{RunOptions, RunReport, Runner};
use anyhow::bail;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use super::StoreArgs;

#[allow(clippy::too_many_arguments)]
pub fn run(
    file: PathBuf,
    tables: Option<String>,
    preset: Option<String>,
    all_tables: bool,
    smart_scope: bool,
    dry_run: bool,
    reset_watermark: bool,
    note: String,
    store_args: StoreArgs,
    progress: bool,
    json: bool,
) -> anyhow::Result<()> {
    if !file.exists() {
        bail!("input file does not exist: {}", file.display());
    }

    let selected = resolve_selection(tables, preset)?;
    if selected.is_empty() && !all_tables && !smart_scope {
        bail!("no tables selected; pass --tables/--preset, or use --all-tables or --smart-scope");
    }

    let options = RunOptions {
        tables: selected,
        all_tables,
        smart_scope,
        dry_run,
        reset_watermark,
        note,
    };

    let store = store_args.connect()?;
    let logger = ConsoleLogger;
    let runner = Runner::new(&store, &logger);

    let report = if progress && !json {
        let file_size = std::fs::metadata(&file)?.len();
        let pb = ProgressBar::new(file_size);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {msg}",
            )
            .unwrap()
            .progress_chars("█▓▒░  ")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        let pb_clone = pb.clone();
        let runner = runner.with_progress(move |_percent, bytes, _total| {
            pb_clone.set_position(bytes);
        });

        let report = runner.run(&file, &options)?;
        pb.finish_with_message("done");
        report
    } else {
        runner.run(&file, &options)?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn resolve_selection(
    tables: Option<String>,
    preset: Option<String>,
) -> anyhow::Result<Vec<String>> {
    let mut selected: Vec<String> = tables
        .map(|t| t.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_default();

    if let Some(keys) = preset {
        for key in keys.split(',').map(str::trim).filter(|k| !k.is_empty()) {
            let Some(preset) = presets::find(key) else {
                let known: Vec<&str> = presets::PRESETS.iter().map(|p| p.key).collect();
                bail!("unknown preset '{key}' (known presets: {})", known.join(", "));
            };
            selected.extend(preset.tables.iter().map(|t| t.to_string()));
        }
    }

    selected.retain(|t| !t.is_empty());
    selected.sort();
    selected.dedup();
    Ok(selected)
}

fn print_report(report: &RunReport) {
    if let Some(discovery) = &report.discovery {
        println!(
            "Smart scope: {} changed table(s), {} in scope",
            discovery.changed_tables.len(),
            discovery.tables.len()
        );
        if !discovery.modules.is_empty() {
            println!("Module impact: {}", discovery.modules.join(", "));
        }
        println!();
    }

    println!(
        "{:<28} {:>12} {:>10} {:>8} {:>9} {:>12}",
        "table", "watermark", "rows_seen", "new", "skipped", "max_id"
    );
    let mut rows_seen = 0u64;
    let mut new_rows = 0u64;
    let mut skipped = 0u64;
    for table in &report.tables {
        rows_seen += table.rows_seen;
        new_rows += table.new_rows;
        skipped += table.skipped_rows;
        println!(
            "{:<28} {:>12} {:>10} {:>8} {:>9} {:>12}",
            table.table,
            table.effective_last_id,
            table.rows_seen,
            table.new_rows,
            table.skipped_rows,
            table
                .max_id_in_file
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }

    println!();
    println!(
        "{}: {} table(s), {} rows seen, {} new, {} skipped",
        if report.dry_run { "Dry run complete" } else { "Sync complete" },
        report.tables.len(),
        rows_seen,
        new_rows,
        skipped
    );
    println!(
        "Statements parsed: {} (CREATE: {}, INSERT: {})",
        report.parse_stats.statements,
        report.parse_stats.create_statements,
        report.parse_stats.insert_statements
    );
    if !report.dry_run {
        println!(
            "Writes committed: {} in {} batch(es)",
            report.committed_rows, report.commit_count
        );
    }
}
