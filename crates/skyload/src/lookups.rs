//! 🗺️ Lookup tables: the two reference files that turn terse codes into useful facts.
//!
//! - [`GeoTable`]: airport code → `"lat,lon"`, from a headerless, fixed-column airports file.
//! - [`ReasonTable`]: cancellation code → human words, from a headered `Code,Description` file.
//!
//! Both load once, synchronously, before the first row is read, and are read-only after.
//! Keys are upper-cased at load; lookups upper-case too, so `"sfo"` finds `"SFO"`.
//! A miss is `None`. Never an error, never a guess. 🦆

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

pub(crate) mod geo;
pub(crate) mod reason;

pub use geo::GeoTable;
pub use reason::ReasonTable;

/// 📚 Both tables, bundled for the transformer.
#[derive(Debug, Clone, Default)]
pub struct LookupTables {
    pub geo: GeoTable,
    pub reasons: ReasonTable,
}

impl LookupTables {
    /// 🚀 Load both tables. A missing file is a warning and an empty table; a broken one is an error.
    pub fn load(geo_file: &Path, reason_file: &Path) -> Result<Self> {
        let geo = if geo_file.exists() {
            info!("🗺️ Loading airports from '{}'", geo_file.display());
            let table = GeoTable::load(geo_file)
                .with_context(|| format!("💀 Could not load airports from '{}'", geo_file.display()))?;
            info!("✅ Loaded {} airports into lookup table", table.len());
            table
        } else {
            warn!("⚠️ Airports file not found: '{}'. Locations will be left out.", geo_file.display());
            GeoTable::default()
        };

        let reasons = if reason_file.exists() {
            info!("🧾 Loading cancellations from '{}'", reason_file.display());
            let table = ReasonTable::load(reason_file).with_context(|| {
                format!("💀 Could not load cancellations from '{}'", reason_file.display())
            })?;
            info!("✅ Loaded {} cancellation reasons into lookup table", table.len());
            table
        } else {
            warn!(
                "⚠️ Cancellations file not found: '{}'. Reasons will be left out.",
                reason_file.display()
            );
            ReasonTable::default()
        };

        Ok(Self { geo, reasons })
    }
}

/// 🔠 Shared key normalisation: trimmed, upper-cased.
pub(crate) fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::test_fixtures::*;

    #[test]
    fn the_one_where_missing_files_mean_empty_tables_not_errors() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let tables = LookupTables::load(&dir.path().join("nope.csv.gz"), &dir.path().join("nah.csv"))?;
        assert!(tables.geo.is_empty());
        assert!(tables.reasons.is_empty());
        Ok(())
    }

    #[test]
    fn the_one_where_a_broken_reason_header_fails_the_load() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let airports = write_gzip(dir.path(), "airports.csv.gz", "");
        let reasons = write_plain(dir.path(), "cancellations.csv", "code,description\nA,Carrier\n");
        assert!(LookupTables::load(&airports, &reasons).is_err());
        Ok(())
    }
}
