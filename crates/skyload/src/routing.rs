//! 🧭 Routing: which index does this flight land in?
//!
//! Filenames are trusted over rows. Upstream cuts files per calendar period, so
//! `flights-2024-07.zip` is July 2024 no matter what a cell claims. Only an undated
//! filename sends us to the row's own date, and then only the year is used.
//!
//! ```text
//!   hints: year+month ──▶ <prefix>-YYYY-MM
//!          year       ──▶ <prefix>-YYYY
//!          none       ──▶ row date ^YYYY-MM-DD ──▶ <prefix>-YYYY
//!                                    otherwise ──▶ None (row dropped)
//! ```

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

// -- 🧾 container suffixes peeled off (repeatedly, case-insensitively) before hint matching
const CONTAINER_SUFFIXES: [&str; 3] = [".gz", ".csv", ".zip"];

static YEAR_MONTH_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-(\d{4})-(\d{2})$").expect("static regex compiles"));
static YEAR_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-(\d{4})$").expect("static regex compiles"));
static LEADING_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-\d{2}").expect("static regex compiles"));

/// 📅 Period hints read off a file name. Computed once per file, reused for every row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileHints {
    pub year: Option<String>,
    pub month: Option<String>,
}

impl FileHints {
    /// 🔍 `data/flights-2024-07.csv.gz` → year 2024, month 07. `flights.csv` → nothing.
    pub fn from_path(path: &Path) -> Self {
        let Some(the_name) = path.file_name().map(|name| name.to_string_lossy()) else {
            return Self::default();
        };
        let the_stem = strip_container_suffixes(&the_name);

        if let Some(captures) = YEAR_MONTH_SUFFIX.captures(the_stem) {
            return Self {
                year: Some(captures[1].to_string()),
                month: Some(captures[2].to_string()),
            };
        }
        if let Some(captures) = YEAR_SUFFIX.captures(the_stem) {
            return Self {
                year: Some(captures[1].to_string()),
                month: None,
            };
        }
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.year.is_none()
    }
}

/// ✂️ Peel `.gz`, `.csv`, `.zip` off the end until none are left. `x.csv.gz` → `x`.
fn strip_container_suffixes(name: &str) -> &str {
    let mut the_stem = name;
    'peeling: loop {
        for suffix in CONTAINER_SUFFIXES {
            let cut = the_stem.len().saturating_sub(suffix.len());
            if the_stem.len() >= suffix.len()
                && the_stem.is_char_boundary(cut)
                && the_stem[cut..].eq_ignore_ascii_case(suffix)
            {
                the_stem = &the_stem[..cut];
                continue 'peeling;
            }
        }
        return the_stem;
    }
}

/// 🧭 Turns hints and timestamps into index names.
#[derive(Debug, Clone)]
pub struct PartitionRouter {
    prefix: String,
}

impl PartitionRouter {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// 🎯 First match wins: year+month hint, year hint, the row's leading `YYYY-MM-DD`.
    /// `None` means the row has nowhere to go.
    pub fn route(&self, timestamp: Option<&str>, hints: &FileHints) -> Option<String> {
        match (&hints.year, &hints.month) {
            (Some(year), Some(month)) => Some(format!("{}-{}-{}", self.prefix, year, month)),
            (Some(year), None) => Some(format!("{}-{}", self.prefix, year)),
            (None, _) => {
                let the_year = parse_leading_date(timestamp?)?.0;
                Some(format!("{}-{}", self.prefix, the_year))
            }
        }
    }
}

/// 📅 `"2023-05-10T00:00:00"` → `("2023", "05")`. Anything not starting with a date → `None`.
pub fn parse_leading_date(timestamp: &str) -> Option<(String, String)> {
    let captures = LEADING_DATE.captures(timestamp.trim())?;
    Some((captures[1].to_string(), captures[2].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hints_for(name: &str) -> FileHints {
        FileHints::from_path(Path::new(name))
    }

    #[test]
    fn the_one_where_the_filename_outranks_the_row() {
        let the_router = PartitionRouter::new("events");
        let the_hints = hints_for("data/events-2024-07.csv.gz");
        assert_eq!(the_hints.year.as_deref(), Some("2024"));
        assert_eq!(the_hints.month.as_deref(), Some("07"));

        assert_eq!(
            the_router.route(Some("1999-01-01"), &the_hints).as_deref(),
            Some("events-2024-07")
        );
        assert_eq!(the_router.route(Some("garbage"), &the_hints).as_deref(), Some("events-2024-07"));
        assert_eq!(the_router.route(None, &the_hints).as_deref(), Some("events-2024-07"));
    }

    #[test]
    fn the_one_where_only_the_year_is_on_the_label() {
        let the_router = PartitionRouter::new("flights");
        let the_hints = hints_for("flights-2019.ZIP");
        assert_eq!(the_hints.month, None);
        assert_eq!(the_router.route(None, &the_hints).as_deref(), Some("flights-2019"));
    }

    #[test]
    fn the_one_where_the_row_date_is_the_last_resort() {
        let the_router = PartitionRouter::new("events");
        let the_hints = hints_for("events.csv");
        assert!(the_hints.is_empty());

        assert_eq!(
            the_router.route(Some("2023-05-10T00:00:00"), &the_hints).as_deref(),
            Some("events-2023")
        );
        assert_eq!(the_router.route(Some("05/10/2023"), &the_hints), None);
        assert_eq!(the_router.route(None, &the_hints), None);
    }

    #[test]
    fn the_one_where_suffixes_peel_like_an_onion() {
        assert_eq!(strip_container_suffixes("flights-2024-01.csv.gz"), "flights-2024-01");
        assert_eq!(strip_container_suffixes("flights-2024-01.CSV.ZIP"), "flights-2024-01");
        assert_eq!(strip_container_suffixes("flights.zip.csv.gz"), "flights");
        assert_eq!(strip_container_suffixes("flights.json"), "flights.json");
        // 🧪 a full date in the name is neither hint
        assert_eq!(hints_for("flights-2024-07-15.csv"), FileHints::default());
    }
}
