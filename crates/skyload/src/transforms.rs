//! 🔄 Transforms: the Rosetta Stone between a BTS CSV row and a flight [`Document`]. 🎭
//!
//! 🎬 COLD OPEN — INT. DATA CENTER — 4:12 AM
//!
//! Row 3,141,592 has `DepDelay` set to `"  -4.00 "`. Row 3,141,593 has it set to `""`.
//! Row 3,141,594 has it set to `"NA"`, because a spreadsheet got involved at some point.
//! The transformer does not flinch. It trims, it parses, it rounds, and when it can't,
//! it shrugs and leaves the field out. No logs, no drama. Coercion failures are weather,
//! not incidents.
//!
//! ## Knowledge Graph 🧠
//! - Input: [`RawRow`] (borrowed, untrimmed text by column name)
//! - Enrichment: [`LookupTables`] (geo pins + cancellation reasons), read-only
//! - Output: [`Document`] (typed, every field optional)
//! - Pure: same row + same tables → same document, every time, on every machine.
//!
//! ```text
//!   RawRow ──present/to_integer/to_boolean──▶ Document ◀── LookupTables
//! ```

use std::sync::Arc;

use crate::document::Document;
use crate::lookups::LookupTables;
use crate::sources::rows::RawRow;

// ============================================================
//  🧪 Coercions: text in, typed value (or nothing) out
// ============================================================

/// ✂️ Trim; empty means absent.
pub fn present(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|value| !value.is_empty())
}

/// 🔢 Parse as a float, round half away from zero. `"15.4"` → 15, `"15.6"` → 16, `"abc"` → nothing.
///
/// Non-finite values (`"NaN"`, `"inf"`) are absent rather than saturated into nonsense.
pub fn to_integer(raw: Option<&str>) -> Option<i64> {
    let the_number: f64 = present(raw)?.parse().ok()?;
    if !the_number.is_finite() {
        return None;
    }
    Some(the_number.round() as i64)
}

/// ✅ Words first (`y`, `yes`, `t`, `true` and their negatives), numbers second (`> 0` is true).
pub fn to_boolean(raw: Option<&str>) -> Option<bool> {
    let the_value = present(raw)?;
    match the_value.to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" => Some(true),
        "false" | "f" | "no" | "n" => Some(false),
        _ => {
            let the_number: f64 = the_value.parse().ok()?;
            // -- 🐛 NaN compares false to everything, which would sneak in as `false`
            if the_number.is_nan() {
                None
            } else {
                Some(the_number > 0.0)
            }
        }
    }
}

// ============================================================
//  🏭 RowTransformer
// ============================================================

/// 🏭 Maps rows to documents. Cheap to clone; the lookup tables are shared.
#[derive(Debug, Clone)]
pub struct RowTransformer {
    lookups: Arc<LookupTables>,
}

impl RowTransformer {
    pub fn new(lookups: Arc<LookupTables>) -> Self {
        Self { lookups }
    }

    /// 🔄 One row in, one document out. Never fails; the worst case is an empty document.
    pub fn transform(&self, row: &RawRow<'_>) -> Document {
        let text = |column: &str| present(row.get(column)).map(str::to_string);
        let integer = |column: &str| to_integer(row.get(column));
        let boolean = |column: &str| to_boolean(row.get(column));

        // 📅 an explicit timestamp column beats the plain flight date
        let timestamp = text("@timestamp").or_else(|| text("FlightDate"));
        let reporting_airline = text("Reporting_Airline");
        let flight_number = text("Flight_Number_Reporting_Airline");
        let origin = text("Origin");
        let dest = text("Dest");

        let flight_id = composite_flight_id(
            timestamp.as_deref(),
            reporting_airline.as_deref(),
            flight_number.as_deref(),
            origin.as_deref(),
            dest.as_deref(),
        );

        let cancellation_code = text("CancellationCode");
        let cancellation_reason = cancellation_code
            .as_deref()
            .and_then(|code| self.lookups.reasons.lookup(code))
            .map(str::to_string);

        let origin_location = self.locate(origin.as_deref());
        let dest_location = self.locate(dest.as_deref());

        Document {
            timestamp,
            flight_id,
            reporting_airline,
            tail_number: text("Tail_Number"),
            flight_number,
            origin,
            dest,
            crs_dep_time_local: integer("CRSDepTime"),
            dep_delay_min: integer("DepDelay"),
            taxi_out_min: integer("TaxiOut"),
            taxi_in_min: integer("TaxiIn"),
            crs_arr_time_local: integer("CRSArrTime"),
            arr_delay_min: integer("ArrDelay"),
            cancelled: boolean("Cancelled"),
            diverted: boolean("Diverted"),
            cancellation_code,
            cancellation_reason,
            actual_elapsed_time_min: integer("ActualElapsedTime"),
            air_time_min: integer("AirTime"),
            flights: integer("Flights"),
            distance_miles: integer("Distance"),
            carrier_delay_min: integer("CarrierDelay"),
            weather_delay_min: integer("WeatherDelay"),
            nas_delay_min: integer("NASDelay"),
            security_delay_min: integer("SecurityDelay"),
            late_aircraft_delay_min: integer("LateAircraftDelay"),
            origin_location,
            dest_location,
        }
    }

    /// 📍 Airport code → `"lat,lon"`, only when the table knows the airport.
    fn locate(&self, code: Option<&str>) -> Option<String> {
        code.and_then(|code| self.lookups.geo.lookup(code))
            .filter(|location| !location.is_empty())
            .map(str::to_string)
    }
}

/// 🆔 `<date>_<airline>_<number>_<origin>_<dest>`, or nothing if any piece is missing.
fn composite_flight_id(
    date: Option<&str>,
    airline: Option<&str>,
    number: Option<&str>,
    origin: Option<&str>,
    dest: Option<&str>,
) -> Option<String> {
    Some(format!("{}_{}_{}_{}_{}", date?, airline?, number?, origin?, dest?))
}
