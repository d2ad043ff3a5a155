use crate::logging::ConsoleLogger;
use crate::runner::Runner;
use anyhow::bail;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use super::StoreArgs;

pub fn run(
    file: PathBuf,
    note: String,
    store_args: StoreArgs,
    progress: bool,
    json: bool,
) -> anyhow::Result<()> {
    if !file.exists() {
        bail!("input file does not exist: {}", file.display());
    }

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

        let report = runner.baseline(&file, &note)?;
        pb.finish_with_message("done");
        report
    } else {
        runner.baseline(&file, &note)?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Baseline initialized from {}: {} state doc(s) written, {} table(s) without a numeric id",
            report.file, report.written, report.without_numeric_id
        );
        for table in &report.tables {
            println!(
                "{:<28} rows_seen={:<8} last_id={}",
                table.table,
                table.rows_seen,
                table
                    .max_id_in_file
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".to_string())
            );
        }
    }
    Ok(())
}
