//! 🧾 Rows: headered CSV on top of whatever reader a [`SourceHandle`](super::SourceHandle) lends us.
//!
//! A [`RawRow`] is a borrowed view (header index + one record). No per-row HashMap,
//! no string copies. It lives exactly as long as the iteration step that produced it.

use std::collections::HashMap;
use std::io::Read;

use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord};

/// 🗺️ Column name → position, built once per file from the header line.
#[derive(Debug, Clone, Default)]
pub struct ColumnIndex {
    positions: HashMap<String, usize>,
    names: Vec<String>,
}

impl ColumnIndex {
    pub fn from_headers(headers: &StringRecord) -> Self {
        let mut positions = HashMap::with_capacity(headers.len());
        let mut names = Vec::with_capacity(headers.len());
        for (position, header) in headers.iter().enumerate() {
            // -- 🧹 a UTF-8 BOM glued to the first header is a classic spreadsheet export souvenir
            let the_name = header.trim_start_matches('\u{feff}').to_string();
            positions.entry(the_name.clone()).or_insert(position);
            names.push(the_name);
        }
        Self { positions, names }
    }

    pub(crate) fn contains(&self, column: &str) -> bool {
        self.positions.contains_key(column)
    }

    pub(crate) fn names(&self) -> &[String] {
        &self.names
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.positions.get(column).copied()
    }
}

/// 📄 One record, addressed by column name. Raw text, untrimmed, uncoerced.
#[derive(Debug, Clone, Copy)]
pub struct RawRow<'a> {
    columns: &'a ColumnIndex,
    record: &'a StringRecord,
}

impl<'a> RawRow<'a> {
    pub fn new(columns: &'a ColumnIndex, record: &'a StringRecord) -> Self {
        Self { columns, record }
    }

    /// 🔍 The raw field under `column`, if the file has that column and this row reaches it.
    pub fn get(&self, column: &str) -> Option<&'a str> {
        self.columns
            .position(column)
            .and_then(|position| self.record.get(position))
    }
}

/// 🚰 Streaming CSV rows with a header. Flexible about ragged rows, strict about nothing else.
pub(crate) struct RowStream<R: Read> {
    reader: csv::Reader<R>,
    columns: ColumnIndex,
    record: StringRecord,
}

impl<R: Read> RowStream<R> {
    /// 🚀 Wrap `reader` and consume the header line.
    pub(crate) fn new(reader: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let the_headers = reader
            .headers()
            .context("💀 Could not read the CSV header line")?
            .clone();
        Ok(Self {
            columns: ColumnIndex::from_headers(&the_headers),
            reader,
            record: StringRecord::new(),
        })
    }

    pub(crate) fn columns(&self) -> &ColumnIndex {
        &self.columns
    }

    /// 📄 The next row, or `None` at EOF. The row borrows this stream until it's dropped.
    pub(crate) fn next_row(&mut self) -> Result<Option<RawRow<'_>>> {
        let the_stream_has_more = self
            .reader
            .read_record(&mut self.record)
            .context("💀 A CSV record could not be read (truncated file? corrupt compression?)")?;
        if the_stream_has_more {
            Ok(Some(RawRow::new(&self.columns, &self.record)))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_rows_are_addressed_by_header_name() -> Result<()> {
        let the_csv = "\u{feff}FlightDate,Origin,Dest\n2024-07-01,SFO,JFK\n2024-07-02,LAX\n";
        let mut stream = RowStream::new(the_csv.as_bytes())?;
        assert!(stream.columns().contains("FlightDate"), "BOM should be peeled off");

        let first = stream.next_row()?.expect("first row exists");
        assert_eq!(first.get("Origin"), Some("SFO"));
        assert_eq!(first.get("Dest"), Some("JFK"));
        assert_eq!(first.get("NotAColumn"), None);

        // 🧪 ragged row: Dest is a real column, the row just never got there
        let second = stream.next_row()?.expect("second row exists");
        assert_eq!(second.get("Origin"), Some("LAX"));
        assert_eq!(second.get("Dest"), None);

        assert!(stream.next_row()?.is_none());
        Ok(())
    }

    #[test]
    fn the_one_where_quoted_fields_keep_their_commas() -> Result<()> {
        let the_csv = "Code,Description\nB,\"Weather, mostly\"\n";
        let mut stream = RowStream::new(the_csv.as_bytes())?;
        let row = stream.next_row()?.expect("row exists");
        assert_eq!(row.get("Description"), Some("Weather, mostly"));
        Ok(())
    }
}
