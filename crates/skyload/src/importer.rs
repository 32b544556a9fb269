//! 🛫 The importer: where a pile of files becomes a pile of indexed flights.
//!
//! 🎬 COLD OPEN — INT. HANGAR 7 — NIGHT
//!
//! Forty zip files sit on the tarmac. Each one holds a month of flights, a readme nobody
//! reads, and at least one row where `FlightDate` is the string `"N/A"`. The importer walks
//! in, counts every line (roughly), and starts unloading.
//!
//! ```text
//!   file ─▶ SourceHandle ─▶ RowStream ─▶ RowTransformer ─▶ PartitionRouter
//!                                                              │
//!                       ProgressTracker ◀─ BulkFlusher ◀─ BatchAccumulator ◀─ ensure(index)
//! ```
//!
//! 🧠 Rules of the road:
//! - Files go one at a time; rows go strictly in source order.
//! - A row with nowhere to go is dropped with a warning. The import carries on.
//! - An index is provisioned right before its first document is queued.
//! - A rejected bulk item stops everything. No partial loads, no retries.
//! - A broken container skips the file when there are others to import, and ends the run
//!   when it was the only one.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::backends::StoreBackend;
use crate::batching::{Batch, BatchAccumulator};
use crate::errors::IngestError;
use crate::flusher::BulkFlusher;
use crate::lookups::LookupTables;
use crate::progress::{FileReport, ProgressTracker, format_number};
use crate::provisioner::{ImportRun, PartitionProvisioner};
use crate::routing::{FileHints, PartitionRouter, parse_leading_date};
use crate::sources::SourceHandle;
use crate::sources::line_count::count_total_records;
use crate::sources::rows::{ColumnIndex, RowStream};
use crate::transforms::RowTransformer;

// -- 👀 how many header names the "where's the date?" warning shows
const HEADER_PREVIEW: usize = 10;

/// 📄 Per-file tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileSummary {
    pub rows_processed: u64,
    pub documents_indexed: u64,
}

/// 🧾 How the whole run went.
#[derive(Debug, Clone)]
pub struct ImportReport {
    pub files: Vec<FileReport>,
    pub loaded: u64,
    pub total: u64,
    pub partitions: Vec<String>,
    pub elapsed: Duration,
}

/// 🛫 Owns the pipeline stages. Cheap to share; all state per run lives in [`ImportRun`].
#[derive(Debug, Clone)]
pub struct Importer {
    transformer: RowTransformer,
    router: PartitionRouter,
    provisioner: PartitionProvisioner,
    flusher: BulkFlusher,
    batch_size: usize,
    show_progress: bool,
}

impl Importer {
    pub fn new(
        store: Arc<StoreBackend>,
        lookups: Arc<LookupTables>,
        mapping: Value,
        index_prefix: &str,
        batch_size: usize,
        refresh: bool,
    ) -> Self {
        Self {
            transformer: RowTransformer::new(lookups),
            router: PartitionRouter::new(index_prefix),
            provisioner: PartitionProvisioner::new(Arc::clone(&store), mapping),
            flusher: BulkFlusher::new(store, refresh),
            batch_size,
            show_progress: true,
        }
    }

    /// 🙈 Turn the terminal progress bar off (tests, piped output). Logging is unaffected.
    pub fn with_progress_bar(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// 🚀 Count, then import every file in order.
    pub async fn import_files(&self, files: &[PathBuf]) -> Result<ImportReport> {
        info!("📏 Counting records in {} file(s) for progress tracking...", files.len());
        let the_total = count_total_records(files);
        info!("📊 Total records to import: {}", format_number(the_total));

        let the_tracker = if self.show_progress {
            ProgressTracker::new(the_total)
        } else {
            ProgressTracker::hidden(the_total)
        };
        let run = ImportRun::new(the_tracker);

        let mut reports = Vec::with_capacity(files.len());
        for path in files {
            // -- 🧮 filled in as rows go by, so a file abandoned halfway still reports what it loaded
            let mut summary = FileSummary::default();
            match self.import_file_into(&run, path, &mut summary).await {
                Ok(()) => reports.push(FileReport {
                    path: path.clone(),
                    rows_processed: summary.rows_processed,
                    documents_indexed: summary.documents_indexed,
                    failure: None,
                }),
                Err(e) if files.len() > 1 && IngestError::is_container_failure(&e) => {
                    error!(
                        "💀 Skipping the rest of '{}' after {} indexed document(s): {:#}",
                        path.display(),
                        summary.documents_indexed,
                        e
                    );
                    reports.push(FileReport {
                        path: path.clone(),
                        rows_processed: summary.rows_processed,
                        documents_indexed: summary.documents_indexed,
                        failure: Some(e.to_string()),
                    });
                }
                Err(e) => {
                    run.progress().finish();
                    return Err(e.context(format!("💀 Import of '{}' failed", path.display())));
                }
            }
        }

        run.progress().finish();
        let the_snapshot = run.progress().snapshot();
        info!(
            "🎉 Import complete: {} of {} records loaded",
            format_number(the_snapshot.loaded),
            format_number(the_snapshot.total)
        );
        Ok(ImportReport {
            files: reports,
            loaded: the_snapshot.loaded,
            total: the_snapshot.total,
            partitions: run.ensured_partitions(),
            elapsed: run.progress().elapsed(),
        })
    }

    /// 📂 One file, start to finish, including the final drain of every buffer.
    pub async fn import_file(&self, run: &ImportRun, path: &Path) -> Result<FileSummary> {
        let mut summary = FileSummary::default();
        self.import_file_into(run, path, &mut summary).await?;
        Ok(summary)
    }

    /// 📂 Same as [`Importer::import_file`], tallying into `summary` as it goes. On error,
    /// `summary` holds whatever was processed and flushed before things went wrong.
    async fn import_file_into(&self, run: &ImportRun, path: &Path, summary: &mut FileSummary) -> Result<()> {
        if !path.is_file() {
            warn!("⚠️ Skipping '{}' (not a regular file)", path.display());
            return Ok(());
        }

        let the_hints = FileHints::from_path(path);
        info!("📂 Importing '{}'", path.display());
        if the_hints.is_empty() {
            debug!("🧭 '{}' has no date in its name; routing by each row's date", path.display());
        }

        let mut handle = SourceHandle::open(path)?;
        let reader = handle.reader().map_err(|e| container_failure(path, e))?;
        let rows = RowStream::new(reader).map_err(|e| container_failure(path, e))?;

        self.import_rows(run, path, rows, &the_hints, summary).await?;
        info!(
            "✅ Finished '{}' (rows processed: {}, documents indexed: {})",
            path.display(),
            summary.rows_processed,
            summary.documents_indexed
        );
        Ok(())
    }

    async fn import_rows<R: Read>(
        &self,
        run: &ImportRun,
        path: &Path,
        mut rows: RowStream<R>,
        hints: &FileHints,
        summary: &mut FileSummary,
    ) -> Result<()> {
        let the_missing_date_warning = missing_date_warning(rows.columns());
        let mut accumulator = BatchAccumulator::new(self.batch_size);

        loop {
            let Some(row) = rows.next_row().map_err(|e| container_failure(path, e))? else {
                break;
            };
            summary.rows_processed += 1;
            if summary.rows_processed == 1 {
                if let Some(warning) = &the_missing_date_warning {
                    warn!("{}", warning);
                }
            }

            let document = self.transformer.transform(&row);
            let Some(partition) = self.router.route(document.timestamp.as_deref(), hints) else {
                let the_raw = row.get("@timestamp").or_else(|| row.get("FlightDate"));
                warn!(
                    "⚠️ Skipping row {} of '{}': missing or invalid timestamp (raw: {:?}, parsed: {:?}). Origin={:?}, Dest={:?}, Airline={:?}",
                    summary.rows_processed,
                    path.display(),
                    the_raw.unwrap_or_default(),
                    document.timestamp.as_deref().and_then(parse_leading_date),
                    row.get("Origin"),
                    row.get("Dest"),
                    row.get("Reporting_Airline"),
                );
                continue;
            };
            if document.is_empty() {
                continue;
            }

            self.provisioner.ensure(run, &partition).await?;
            if let Some(batch) = accumulator.append(&partition, &document)? {
                summary.documents_indexed += self.flush(run, batch).await?;
            }
        }

        debug!("🧹 End of '{}': draining {} pending document(s)", path.display(), accumulator.pending());
        for batch in accumulator.drain() {
            summary.documents_indexed += self.flush(run, batch).await?;
        }
        Ok(())
    }

    async fn flush(&self, run: &ImportRun, batch: Batch) -> Result<u64> {
        let the_flushed = self.flusher.flush(batch).await? as u64;
        run.progress().record(the_flushed);
        Ok(the_flushed)
    }

    /// 🔬 The first row of `path`, transformed and routed, with the index under `__index`.
    /// Nothing is written anywhere. `Ok(None)` for a file with a header and no rows.
    pub fn sample_document(&self, path: &Path) -> Result<Option<Value>> {
        let the_hints = FileHints::from_path(path);
        let mut handle = SourceHandle::open(path)?;
        let reader = handle.reader().map_err(|e| container_failure(path, e))?;
        let mut rows = RowStream::new(reader).map_err(|e| container_failure(path, e))?;

        let Some(row) = rows.next_row().map_err(|e| container_failure(path, e))? else {
            return Ok(None);
        };
        let document = self.transformer.transform(&row);
        let the_partition = self.router.route(document.timestamp.as_deref(), &the_hints);

        let mut the_sample =
            serde_json::to_value(&document).context("💀 Could not serialise the sample document")?;
        if let Value::Object(fields) = &mut the_sample {
            fields.insert(
                "__index".to_string(),
                the_partition.map(Value::String).unwrap_or(Value::Null),
            );
        }
        Ok(Some(the_sample))
    }
}

/// 🏷️ Keep typed errors as they are; anything else from the read path is the container's fault.
fn container_failure(path: &Path, e: anyhow::Error) -> anyhow::Error {
    if e.downcast_ref::<IngestError>().is_some() {
        return e;
    }
    IngestError::ContainerFormat {
        path: path.to_path_buf(),
        reason: format!("{:#}", e),
    }
    .into()
}

fn missing_date_warning(columns: &ColumnIndex) -> Option<String> {
    if columns.contains("@timestamp") || columns.contains("FlightDate") {
        return None;
    }
    let the_preview: Vec<&str> = columns
        .names()
        .iter()
        .take(HEADER_PREVIEW)
        .map(String::as_str)
        .collect();
    Some(format!(
        "⚠️ CSV headers don't include '@timestamp' or 'FlightDate'. Available headers: {}",
        the_preview.join(", ")
    ))
}
