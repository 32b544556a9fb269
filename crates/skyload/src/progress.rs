//! 📊 progress.rs: "Are we there yet?" Every import, every time, forever.
//!
//! 🚀 Two jobs:
//! - [`ProgressTracker`]: a running `loaded of total` counter, bumped after every successful
//!   flush, shared across files behind a mutex, drawn as an indicatif bar.
//! - [`summary_table`]: the comfy-table at the end, one row per file, so you can see which
//!   file ate your afternoon.
//!
//! ⚠️ The total comes from a line-count pre-pass, so quoted newlines can push the
//! percentage past 100%. Watching the bar will not make it go faster. Science says no.
//!
//! 🦆 The duck has nothing to do with this module. It's just vibing.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

/// 🔢 Formats a number with commas for the 3 people in the audience who like readability.
/// "1000000 docs" → "1,000,000 docs", you're welcome, eyes.
pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    // -- 🧵 pre-allocate like we know what we're doing (we do, we read the book)
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ Formats a Duration into MM:SS or HH:MM:SS.
/// If it shows HH:MM:SS, you should probably call your mom. It's been a while.
pub(crate) fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// 📸 One reading of the counter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub loaded: u64,
    pub total: u64,
    pub percent: f64,
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} records loaded ({:.1}%)",
            format_number(self.loaded),
            format_number(self.total),
            self.percent
        )
    }
}

/// 📊 The shared import counter. `&self` everywhere; the mutex does the rest.
pub struct ProgressTracker {
    total: u64,
    loaded: Mutex<u64>,
    progress_bar: ProgressBar,
    start_time: Instant,
}

impl fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // -- 🎭 ProgressBar is a diva and doesn't derive Debug
        f.debug_struct("ProgressTracker")
            .field("total", &self.total)
            .field("loaded", &self.snapshot().loaded)
            .finish()
    }
}

impl ProgressTracker {
    /// 🚀 A tracker with a visible bar. `total` is the advisory pre-pass count.
    pub fn new(total: u64) -> Self {
        let progress_bar = ProgressBar::new(total);
        // -- 🎨 cyan because it's classy, blue because it's calm
        let style = ProgressStyle::default_bar()
            .template("{msg}\n| [{bar:40.cyan/blue}] {elapsed_precise}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        progress_bar.set_style(style);
        Self::with_bar(total, progress_bar)
    }

    /// 🙈 Same counter, no drawing. Tests and `--sample` use this.
    pub fn hidden(total: u64) -> Self {
        Self::with_bar(total, ProgressBar::hidden())
    }

    fn with_bar(total: u64, progress_bar: ProgressBar) -> Self {
        Self {
            total,
            loaded: Mutex::new(0),
            progress_bar,
            start_time: Instant::now(),
        }
    }

    /// ➕ Add `flushed` documents to the running total and report where we are.
    pub fn record(&self, flushed: u64) -> ProgressSnapshot {
        let the_snapshot = {
            // -- 🔒 a poisoned counter is still a perfectly good number
            let mut loaded = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
            *loaded += flushed;
            self.snapshot_of(*loaded)
        };
        self.progress_bar.set_position(the_snapshot.loaded);
        self.progress_bar.set_message(the_snapshot.to_string());
        self.progress_bar.suspend(|| info!("📊 {}", the_snapshot));
        the_snapshot
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let loaded = *self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
        self.snapshot_of(loaded)
    }

    fn snapshot_of(&self, loaded: u64) -> ProgressSnapshot {
        let percent = if self.total > 0 {
            (loaded as f64 / self.total as f64) * 100.0
        } else {
            0.0
        };
        ProgressSnapshot {
            loaded,
            total: self.total,
            percent,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// ✅ Ring the bell. We made it. (Or we hit EOF. Same energy.)
    pub fn finish(&self) {
        self.progress_bar.finish_and_clear();
    }
}

/// 📄 How one file went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub path: PathBuf,
    pub rows_processed: u64,
    pub documents_indexed: u64,
    /// `None` for success, the error text for a file that was abandoned.
    pub failure: Option<String>,
}

/// 🍽️ The end-of-run table. One row per file, plus a totals row.
pub fn summary_table(reports: &[FileReport], elapsed: Duration) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["File", "Rows", "Indexed", "Status"]);

    let mut the_rows = 0u64;
    let mut the_docs = 0u64;
    for report in reports {
        the_rows += report.rows_processed;
        the_docs += report.documents_indexed;
        let the_name = report
            .path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| report.path.display().to_string());
        table.add_row(vec![
            Cell::new(the_name),
            Cell::new(format_number(report.rows_processed)).set_alignment(CellAlignment::Right),
            Cell::new(format_number(report.documents_indexed)).set_alignment(CellAlignment::Right),
            Cell::new(match &report.failure {
                None => "✅ ok".to_string(),
                Some(reason) => format!("💀 {}", reason),
            }),
        ]);
    }

    let docs_per_sec = if elapsed.as_secs_f64() > 0.0 {
        the_docs as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };
    table.add_row(vec![
        Cell::new(format!("total ({} elapsed)", format_duration(elapsed))),
        Cell::new(format_number(the_rows)).set_alignment(CellAlignment::Right),
        Cell::new(format_number(the_docs)).set_alignment(CellAlignment::Right),
        Cell::new(format!("{} docs/s", format_number(docs_per_sec as u64))),
    ]);
    table
}
