//! 📏 The progress pre-pass: how many lines are in these files, roughly?
//!
//! "Roughly" because a quoted field with an embedded newline counts twice here.
//! The total is advisory. It feeds a percentage, not a correctness check.

use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;

use super::SourceHandle;

// -- 📦 64 KiB chunks: big enough that memchr gets to stretch its SIMD legs
const CHUNK_SIZE: usize = 64 * 1024;

/// 🔢 Count lines in any reader. A final line without a trailing `\n` still counts.
pub(crate) fn count_lines_in<R: Read>(mut reader: R) -> Result<u64> {
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut the_count = 0u64;
    let mut the_last_byte = None;
    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e).context("💀 Read failed while counting lines"),
        };
        the_count += memchr::memchr_iter(b'\n', &buffer[..bytes_read]).count() as u64;
        the_last_byte = Some(buffer[bytes_read - 1]);
    }
    if matches!(the_last_byte, Some(byte) if byte != b'\n') {
        the_count += 1;
    }
    Ok(the_count)
}

/// 📏 Count the decoded lines of one source file (plain, gzip, or zip entry).
pub(crate) fn count_lines(path: &Path) -> Result<u64> {
    let mut handle = SourceHandle::open(path)?;
    count_lines_in(handle.reader()?)
        .with_context(|| format!("💀 Could not count lines in '{}'", path.display()))
}

/// 📊 Σ (lines − 1 header) across every regular file. Unreadable files count as zero, loudly.
pub(crate) fn count_total_records(files: &[PathBuf]) -> u64 {
    files
        .iter()
        .filter(|path| path.is_file())
        .map(|path| match count_lines(path) {
            Ok(lines) => lines.saturating_sub(1),
            Err(e) => {
                warn!("⚠️ Failed to count lines in '{}': {:#}", path.display(), e);
                0
            }
        })
        .sum()
}
