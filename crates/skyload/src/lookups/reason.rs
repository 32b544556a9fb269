//! 🧾 ReasonTable: cancellation code → description. `"B"` → `"Weather"`, that kind of thing.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use csv::ReaderBuilder;

use super::normalize_code;
use crate::errors::IngestError;
use crate::sources::SourceHandle;

const CODE_HEADER: &str = "Code";
const DESCRIPTION_HEADER: &str = "Description";

#[derive(Debug, Clone, Default)]
pub struct ReasonTable {
    descriptions: HashMap<String, String>,
}

impl ReasonTable {
    /// 🚀 Load a headered `Code,Description` file. Headers are trimmed, then matched exactly.
    pub fn load(path: &Path) -> Result<Self> {
        let mut handle = SourceHandle::open(path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(handle.reader()?);

        let the_headers = reader
            .headers()
            .context("💀 Could not read the cancellations header line")?
            .clone();
        let position_of = |wanted: &str| {
            the_headers
                .iter()
                .position(|header| header.trim_start_matches('\u{feff}').trim() == wanted)
                .ok_or_else(|| IngestError::InvalidLookupSchema {
                    path: path.to_path_buf(),
                    column: wanted.to_string(),
                })
        };
        let code_at = position_of(CODE_HEADER)?;
        let description_at = position_of(DESCRIPTION_HEADER)?;

        let mut descriptions = HashMap::new();
        for record in reader.records() {
            let record = record.context("💀 A cancellations row could not be read")?;
            let code = record.get(code_at).unwrap_or_default().trim();
            let description = record.get(description_at).unwrap_or_default().trim();
            if code.is_empty() || description.is_empty() {
                continue;
            }
            descriptions.insert(normalize_code(code), description.to_string());
        }
        Ok(Self { descriptions })
    }

    /// 🔍 Exact description for a known code, `None` for everything else.
    pub fn lookup(&self, code: &str) -> Option<&str> {
        self.descriptions.get(&normalize_code(code)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.descriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }

    pub fn from_entries<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            descriptions: entries
                .into_iter()
                .map(|(code, description)| (normalize_code(code), description.to_string()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::test_fixtures::write_plain;

    #[test]
    fn the_one_where_codes_find_their_exact_words() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_plain(
            dir.path(),
            "cancellations.csv",
            " Code , Description \nA,Carrier\nb,Weather\nC,\n,Orphan\nD,Security\n",
        );

        let table = ReasonTable::load(&path)?;
        assert_eq!(table.len(), 3);
        assert_eq!(table.lookup("A"), Some("Carrier"));
        assert_eq!(table.lookup("B"), Some("Weather"));
        assert_eq!(table.lookup("d"), Some("Security"));
        // 🦆 a miss is a miss, no "Unknown" consolation prize
        assert_eq!(table.lookup("C"), None);
        assert_eq!(table.lookup("Z"), None);
        Ok(())
    }

    #[test]
    fn the_one_where_the_header_is_in_the_wrong_case() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = write_plain(dir.path(), "cancellations.csv", "Code,description\nA,Carrier\n");

        let the_error = ReasonTable::load(&path).unwrap_err();
        match the_error.downcast_ref::<IngestError>() {
            Some(IngestError::InvalidLookupSchema { column, .. }) => assert_eq!(column, "Description"),
            other => panic!("expected InvalidLookupSchema, got {other:?}"),
        }
        Ok(())
    }
}
