//! 📂 Previously, on "Things That Could Go Wrong With A File"...
//!
//! The BTS ships flight records three ways: bare CSV, gzipped CSV, and a zip archive
//! with a CSV somewhere inside it (plus a readme nobody reads). This module hides that
//! from everyone downstream. You hand it a path, it hands you bytes. 🚰
//!
//! 🧠 Knowledge graph:
//! - [`SourceFormat`]: the closed set of containers, picked by extension. No sniffing magic bytes.
//! - [`SourceHandle`]: owns every OS handle for one open source. Dropping it closes them all,
//!   on success, on `?`, on a bulk failure three hundred thousand rows in. RAII is the cleanup crew.
//! - [`rows`]: CSV rows on top of a handle's reader.
//! - [`line_count`]: the progress pre-pass, same handles, no CSV parsing.
//! - [`discovery`]: which files are we even importing.
//!
//! 🦆 (mandatory, no notes)

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use tracing::debug;
use zip::ZipArchive;

use crate::errors::IngestError;

pub(crate) mod discovery;
pub(crate) mod line_count;
pub mod rows;

pub use discovery::FileSelection;

/// 🧾 Row files inside archives are recognised by this extension (case-insensitive).
pub(crate) const ROW_FILE_EXTENSION: &str = "csv";

/// 📦 The container a source file arrives in. Picked from the file name, nothing fancier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Plain,
    Gzip,
    Zip,
}

impl SourceFormat {
    /// 🔍 `.zip` → Zip, `.gz` → Gzip, anything else is taken at face value.
    pub fn detect(path: &Path) -> Self {
        let the_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if the_name.ends_with(".zip") {
            SourceFormat::Zip
        } else if the_name.ends_with(".gz") {
            SourceFormat::Gzip
        } else {
            SourceFormat::Plain
        }
    }
}

/// 🚪 One open record source. Every variant owns its file handle (and decoder, and archive).
///
/// Nothing here is extracted to disk. A zip entry is inflated as it is read.
pub(crate) enum SourceHandle {
    Plain(BufReader<File>),
    Gzip(MultiGzDecoder<BufReader<File>>),
    Zip {
        archive: ZipArchive<BufReader<File>>,
        entry_index: usize,
    },
}

impl std::fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 decoders don't derive Debug, and nobody wants to read a zip central directory anyway
        match self {
            SourceHandle::Plain(_) => f.write_str("SourceHandle::Plain"),
            SourceHandle::Gzip(_) => f.write_str("SourceHandle::Gzip"),
            SourceHandle::Zip { entry_index, .. } => f
                .debug_struct("SourceHandle::Zip")
                .field("entry_index", entry_index)
                .finish(),
        }
    }
}

impl SourceHandle {
    /// 🚀 Open `path` according to its [`SourceFormat`].
    ///
    /// For zips this also locates the row entry, so an archive without a CSV fails here
    /// with [`IngestError::NoRowEntry`] rather than halfway through an import.
    pub(crate) fn open(path: &Path) -> Result<Self> {
        let file_handle = File::open(path).with_context(|| {
            format!(
                "💀 The door to '{}' would not budge. It might not exist, it might not be ours to read.",
                path.display()
            )
        })?;
        let buffered = BufReader::new(file_handle);

        match SourceFormat::detect(path) {
            SourceFormat::Plain => Ok(SourceHandle::Plain(buffered)),
            SourceFormat::Gzip => Ok(SourceHandle::Gzip(MultiGzDecoder::new(buffered))),
            SourceFormat::Zip => {
                let mut archive = ZipArchive::new(buffered).map_err(|e| IngestError::ContainerFormat {
                    path: path.to_path_buf(),
                    reason: format!("not a readable zip archive: {e}"),
                })?;
                let entry_index = first_row_entry(&mut archive, path)?;
                Ok(SourceHandle::Zip {
                    archive,
                    entry_index,
                })
            }
        }
    }

    /// 📖 Borrow a byte reader over the decoded contents.
    ///
    /// Call it once per handle. For zips each call restarts the entry from the top.
    pub(crate) fn reader(&mut self) -> Result<Box<dyn Read + '_>> {
        match self {
            SourceHandle::Plain(reader) => Ok(Box::new(reader)),
            SourceHandle::Gzip(decoder) => Ok(Box::new(decoder)),
            SourceHandle::Zip {
                archive,
                entry_index,
            } => {
                let the_entry = archive
                    .by_index(*entry_index)
                    .context("💀 The zip entry we found a moment ago refused to open. Rude.")?;
                Ok(Box::new(the_entry))
            }
        }
    }
}

/// 🔍 Index of the first entry whose name ends in `.csv`, case-insensitively.
fn first_row_entry(archive: &mut ZipArchive<BufReader<File>>, path: &Path) -> Result<usize> {
    let the_suffix = format!(".{ROW_FILE_EXTENSION}");
    for index in 0..archive.len() {
        let the_name = archive
            .by_index_raw(index)
            .with_context(|| format!("💀 Could not read entry #{index} of '{}'", path.display()))?
            .name()
            .to_lowercase();
        if the_name.ends_with(&the_suffix) {
            debug!("🗜️ '{}' carries its rows in entry #{} ({})", path.display(), index, the_name);
            return Ok(index);
        }
    }
    Err(IngestError::NoRowEntry {
        archive: PathBuf::from(path),
        extension: ROW_FILE_EXTENSION.to_string(),
    }
    .into())
}

#[cfg(test)]
pub(crate) mod test_fixtures {
    //! 🧪 Little file factories shared by the source, lookup, and import tests.

    use std::io::Write;
    use std::path::{Path, PathBuf};

    use flate2::Compression;
    use flate2::write::GzEncoder;
    use zip::write::SimpleFileOptions;

    pub(crate) fn write_plain(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let the_path = dir.join(name);
        std::fs::write(&the_path, contents).expect("💀 plain fixture refused to be written");
        the_path
    }

    pub(crate) fn write_gzip(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let the_path = dir.join(name);
        let file = std::fs::File::create(&the_path).expect("💀 gzip fixture file");
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder
            .write_all(contents.as_bytes())
            .expect("💀 gzip fixture bytes");
        encoder.finish().expect("💀 gzip fixture trailer");
        the_path
    }

    /// 🗜️ Zip with the given (entry name, contents) pairs, in order.
    pub(crate) fn write_zip(dir: &Path, name: &str, entries: &[(&str, &str)]) -> PathBuf {
        let the_path = dir.join(name);
        let file = std::fs::File::create(&the_path).expect("💀 zip fixture file");
        let mut writer = zip::ZipWriter::new(file);
        for (entry_name, contents) in entries {
            writer
                .start_file(*entry_name, SimpleFileOptions::default())
                .expect("💀 zip fixture entry");
            writer
                .write_all(contents.as_bytes())
                .expect("💀 zip fixture bytes");
        }
        writer.finish().expect("💀 zip fixture central directory");
        the_path
    }
}

#[cfg(test)]
mod tests {
    use super::test_fixtures::*;
    use super::*;

    fn read_all(path: &Path) -> Result<String> {
        let mut handle = SourceHandle::open(path)?;
        let mut the_contents = String::new();
        handle.reader()?.read_to_string(&mut the_contents)?;
        Ok(the_contents)
    }

    #[test]
    fn the_one_where_extensions_pick_the_container() {
        assert_eq!(SourceFormat::detect(Path::new("a/flights-2024-07.zip")), SourceFormat::Zip);
        assert_eq!(SourceFormat::detect(Path::new("flights.CSV.GZ")), SourceFormat::Gzip);
        assert_eq!(SourceFormat::detect(Path::new("flights.csv")), SourceFormat::Plain);
        assert_eq!(SourceFormat::detect(Path::new("no_extension_at_all")), SourceFormat::Plain);
    }

    #[test]
    fn the_one_where_all_three_containers_read_the_same() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let the_rows = "FlightDate,Origin\n2024-07-01,SFO\n";

        let plain = write_plain(dir.path(), "plain.csv", the_rows);
        let gz = write_gzip(dir.path(), "squished.csv.gz", the_rows);
        let zipped = write_zip(
            dir.path(),
            "boxed.zip",
            &[("readme.html", "<p>nobody reads this</p>"), ("On_Time_2024_7.CSV", the_rows)],
        );

        assert_eq!(read_all(&plain)?, the_rows);
        assert_eq!(read_all(&gz)?, the_rows);
        assert_eq!(read_all(&zipped)?, the_rows);
        Ok(())
    }

    #[test]
    fn the_one_where_the_zip_has_no_csv_inside() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let the_disappointment = write_zip(dir.path(), "empty-promises.zip", &[("readme.txt", "hi")]);

        let the_error = SourceHandle::open(&the_disappointment).unwrap_err();
        assert!(matches!(
            the_error.downcast_ref::<IngestError>(),
            Some(IngestError::NoRowEntry { .. })
        ));
        Ok(())
    }

    #[test]
    fn the_one_where_a_fake_zip_is_a_container_failure() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let the_impostor = write_plain(dir.path(), "impostor.zip", "I am definitely a zip file");

        let the_error = SourceHandle::open(&the_impostor).unwrap_err();
        assert!(IngestError::is_container_failure(&the_error));
        Ok(())
    }
}
