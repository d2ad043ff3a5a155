mod baseline;
mod presets;
mod sync;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dumpsync")]
#[command(version)]
#[command(about = "Incrementally sync MySQL dump files into a Firestore-style document store", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Connection arguments shared by the store-facing subcommands.
#[derive(clap::Args)]
pub struct StoreArgs {
    /// Firestore project id
    #[arg(long, env = "DUMPSYNC_PROJECT")]
    pub project: String,

    /// Endpoint override, e.g. a local emulator (http://localhost:8080)
    #[arg(long, env = "DUMPSYNC_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Bearer token sent with every request
    #[arg(long, env = "DUMPSYNC_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

impl StoreArgs {
    pub fn connect(&self) -> anyhow::Result<crate::store::firestore::FirestoreStore> {
        let store = match &self.endpoint {
            Some(endpoint) => {
                crate::store::firestore::FirestoreStore::with_endpoint(endpoint, &self.project)?
            }
            None => crate::store::firestore::FirestoreStore::new(&self.project)?,
        };
        Ok(match &self.token {
            Some(token) => store.with_token(token),
            None => store,
        })
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sync new rows from a SQL dump into the document store
    Sync {
        /// Input SQL dump file (supports .gz compression)
        file: PathBuf,

        /// Only sync specific tables (comma-separated)
        #[arg(short, long)]
        tables: Option<String>,

        /// Sync named table presets (comma-separated, see `presets`)
        #[arg(long)]
        preset: Option<String>,

        /// Sync every table found in the dump
        #[arg(long, conflicts_with_all = ["tables", "preset", "smart_scope"])]
        all_tables: bool,

        /// Two-pass mode: discover changed tables first, then write only those
        #[arg(long, conflicts_with_all = ["tables", "preset"])]
        smart_scope: bool,

        /// Parse and classify without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Ignore stored watermarks and treat every row as new
        #[arg(long)]
        reset_watermark: bool,

        /// Free-text note persisted into the watermark records
        #[arg(long, default_value = "")]
        note: String,

        #[command(flatten)]
        store: StoreArgs,

        /// Show progress during the scan
        #[arg(short, long)]
        progress: bool,

        /// Output the run report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Seed per-table watermarks from a full export without writing row data
    Baseline {
        /// Baseline SQL dump file (supports .gz compression)
        file: PathBuf,

        /// Free-text note persisted into the watermark records
        #[arg(long, default_value = "")]
        note: String,

        #[command(flatten)]
        store: StoreArgs,

        /// Show progress during the scan
        #[arg(short, long)]
        progress: bool,

        /// Output the baseline report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the built-in table presets
    Presets {
        /// Output the presets as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Sync {
            file,
            tables,
            preset,
            all_tables,
            smart_scope,
            dry_run,
            reset_watermark,
            note,
            store,
            progress,
            json,
        } => sync::run(
            file,
            tables,
            preset,
            all_tables,
            smart_scope,
            dry_run,
            reset_watermark,
            note,
            store,
            progress,
            json,
        ),
        Commands::Baseline {
            file,
            note,
            store,
            progress,
            json,
        } => baseline::run(file, note, store, progress, json),
        Commands::Presets { json } => presets::run(json),
    }
}
