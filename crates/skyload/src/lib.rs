//! ✈️ skyload: stream BTS on-time flight records (CSV, gzip, zip) into date-partitioned
//! Elasticsearch indices through the `_bulk` API.
//!
//! 🧠 Knowledge graph, leaves first:
//! - [`sources`]: plain / gzip / zip-entry byte streams, CSV rows, line counts, file selection
//! - [`lookups`]: airport coordinates and cancellation reasons, loaded once
//! - [`transforms`]: row → typed [`document::Document`]
//! - [`routing`]: filename hints and row dates → index name
//! - [`batching`] + [`provisioner`] + [`flusher`]: buffers, fresh indices, bulk calls
//! - [`progress`]: the running `loaded of total` counter and the final table
//! - [`importer`]: the loop that strings all of the above together
//! - [`backends`]: the store seam (Elasticsearch over HTTP, or in-memory)
//!
//! 🦆

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

pub mod app_config;
pub mod backends;
pub mod batching;
pub mod document;
pub mod errors;
pub mod flusher;
pub mod importer;
pub mod lookups;
pub mod progress;
pub mod provisioner;
pub mod routing;
pub mod sources;
pub mod transforms;

use crate::app_config::{AppConfig, StoreConfig};
use crate::backends::{DocumentStore, ElasticsearchStore, InMemoryStore, StoreBackend};
use crate::importer::Importer;
use crate::lookups::LookupTables;
use crate::progress::summary_table;
use crate::sources::discovery::files_to_process;

pub use crate::sources::FileSelection;

/// 🌐 The pattern a delete-everything run sweeps, whatever the configured prefix.
pub const DEFAULT_INDEX_PATTERN: &str = "flights-*";

/// 🎛️ What the caller wants done this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 🛫 Load the selected files.
    Import(FileSelection),
    /// 🔬 Print the first document of the first selected file, with its index. No writes.
    Sample(FileSelection),
    /// 🩺 Cluster health, then exit.
    Status,
    /// 🗑️ Delete every index matching the pattern.
    DeleteIndices { pattern: String },
}

/// 🏭 Build the configured store.
pub fn build_store(config: &StoreConfig) -> Result<StoreBackend> {
    match config {
        StoreConfig::Elasticsearch(es) => {
            info!("📡 Using Elasticsearch at '{}'", es.url);
            Ok(StoreBackend::Elasticsearch(ElasticsearchStore::new(es.clone())?))
        }
        StoreConfig::InMemory => {
            warn!("🧪 Using the in-memory store. Nothing will be written anywhere.");
            Ok(StoreBackend::InMemory(InMemoryStore::new()))
        }
    }
}

/// 🗑️ `flights` → `flights-*`; a prefix that already ends in `*` is used as is.
pub fn index_pattern_for(prefix: &str) -> String {
    if prefix.ends_with('*') {
        prefix.to_string()
    } else {
        format!("{}-*", prefix)
    }
}

/// 🚀 Run one command against the configured store.
pub async fn run(app_config: AppConfig, command: Command) -> Result<()> {
    let store = Arc::new(build_store(&app_config.store)?);
    run_with_store(app_config, command, store).await
}

/// 🚀 Same as [`run`], with the store supplied by the caller.
pub async fn run_with_store(
    app_config: AppConfig,
    command: Command,
    store: Arc<StoreBackend>,
) -> Result<()> {
    match command {
        Command::Status => {
            let the_health = store
                .cluster_health()
                .await
                .context("💀 Could not fetch cluster health")?;
            println!("Cluster: {}", the_health.cluster_name.as_deref().unwrap_or("(unnamed)"));
            println!("Status: {}", the_health.status);
            println!("Active shards: {}", the_health.active_shards);
            println!("Nodes: {}", the_health.number_of_nodes);
            Ok(())
        }
        Command::DeleteIndices { pattern } => {
            let the_names = store
                .list_indices(&pattern)
                .await
                .with_context(|| format!("💀 Could not list indices matching '{}'", pattern))?;
            if the_names.is_empty() {
                info!("🤷 No indices match '{}'. Nothing to delete.", pattern);
                return Ok(());
            }
            for name in &the_names {
                store
                    .delete_index(name)
                    .await
                    .with_context(|| format!("💀 Could not delete index '{}'", name))?;
                info!("🗑️ Deleted index '{}'", name);
            }
            println!("Deleted {} index(es): {}", the_names.len(), the_names.join(", "));
            Ok(())
        }
        Command::Sample(selection) => {
            let files = files_to_process(&selection, &app_config.loader.data_dir)?;
            let Some(first) = files.first() else {
                bail!("💀 No files selected to sample");
            };
            let importer = build_importer(&app_config, store)?;
            match importer.sample_document(first)? {
                Some(sample) => println!(
                    "{}",
                    serde_json::to_string_pretty(&sample).context("💀 Could not pretty-print the sample")?
                ),
                None => warn!("⚠️ '{}' has a header and no rows. Nothing to sample.", first.display()),
            }
            Ok(())
        }
        Command::Import(selection) => {
            let files: Vec<PathBuf> = files_to_process(&selection, &app_config.loader.data_dir)?;
            let importer = build_importer(&app_config, store)?;
            let the_report = importer.import_files(&files).await?;
            println!("{}", summary_table(&the_report.files, the_report.elapsed));
            Ok(())
        }
    }
}

fn build_importer(app_config: &AppConfig, store: Arc<StoreBackend>) -> Result<Importer> {
    let lookups = LookupTables::load(&app_config.lookups.geo_file, &app_config.lookups.reason_file)?;
    let mapping = provisioner::load_mapping(app_config.loader.mapping_file.as_deref())?;
    Ok(Importer::new(
        store,
        Arc::new(lookups),
        mapping,
        &app_config.loader.index_prefix,
        app_config.loader.batch_size,
        app_config.loader.refresh,
    )
    .with_progress_bar(std::io::stderr().is_terminal()))
}
