//! 📍 GeoTable: airport code → `"lat,lon"` with six decimals.
//!
//! The airports file is the OpenFlights layout, no header:
//! `ID, Name, City, Country, IATA, ICAO, Latitude, Longitude, ...`
//! We only care about IATA (col 4), latitude (col 6), and longitude (col 7).

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use csv::ReaderBuilder;

use super::normalize_code;
use crate::sources::SourceHandle;

const CODE_COLUMN: usize = 4;
const LATITUDE_COLUMN: usize = 6;
const LONGITUDE_COLUMN: usize = 7;
// -- 🪦 the OpenFlights way of saying "this airport has no IATA code"
const NULL_SENTINEL: &str = "\\N";

/// 📍 Code → pre-formatted `"lat,lon"`. Stored formatted so every document gets the same bytes.
#[derive(Debug, Clone, Default)]
pub struct GeoTable {
    coordinates: HashMap<String, String>,
}

impl GeoTable {
    /// 🚀 Load from a plain or gzipped file.
    pub fn load(path: &Path) -> Result<Self> {
        let mut handle = SourceHandle::open(path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(handle.reader()?);

        let mut coordinates = HashMap::new();
        for record in reader.records() {
            let record = record.context("💀 An airports row could not be read")?;
            if record.len() <= LONGITUDE_COLUMN {
                continue;
            }
            if let Some((code, location)) = parse_airport(
                record.get(CODE_COLUMN).unwrap_or_default(),
                record.get(LATITUDE_COLUMN).unwrap_or_default(),
                record.get(LONGITUDE_COLUMN).unwrap_or_default(),
            ) {
                coordinates.insert(code, location);
            }
        }
        Ok(Self { coordinates })
    }

    /// 🔍 `"sfo"` and `"SFO"` both land on the same pin.
    pub fn lookup(&self, code: &str) -> Option<&str> {
        self.coordinates.get(&normalize_code(code)).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    /// 🧪 Build a table straight from (code, lat, lon) triples.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = (&'a str, f64, f64)>) -> Self {
        Self {
            coordinates: entries
                .into_iter()
                .map(|(code, lat, lon)| (normalize_code(code), format_location(lat, lon)))
                .collect(),
        }
    }
}

fn parse_airport(code: &str, latitude: &str, longitude: &str) -> Option<(String, String)> {
    let code = code.trim();
    if code.is_empty() || code == NULL_SENTINEL {
        return None;
    }
    let latitude: f64 = latitude.trim().parse().ok()?;
    let longitude: f64 = longitude.trim().parse().ok()?;
    Some((normalize_code(code), format_location(latitude, longitude)))
}

fn format_location(latitude: f64, longitude: f64) -> String {
    format!("{latitude:.6},{longitude:.6}")
}
