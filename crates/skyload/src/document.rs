//! 📄 Document: one flight, typed, with every field optional.
//!
//! Absent fields are simply not serialized, so a document on the wire only carries what the
//! row actually had. `@timestamp` rides along as `None` until routing has had its say;
//! after that, absent is absent. 🦆

use serde::Serialize;

/// 🛫 The canonical flight document. Field order here is field order on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Document {
    #[serde(rename = "@timestamp", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(rename = "FlightID", skip_serializing_if = "Option::is_none")]
    pub flight_id: Option<String>,
    #[serde(rename = "Reporting_Airline", skip_serializing_if = "Option::is_none")]
    pub reporting_airline: Option<String>,
    #[serde(rename = "Tail_Number", skip_serializing_if = "Option::is_none")]
    pub tail_number: Option<String>,
    #[serde(rename = "Flight_Number", skip_serializing_if = "Option::is_none")]
    pub flight_number: Option<String>,
    #[serde(rename = "Origin", skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(rename = "Dest", skip_serializing_if = "Option::is_none")]
    pub dest: Option<String>,

    #[serde(rename = "CRSDepTimeLocal", skip_serializing_if = "Option::is_none")]
    pub crs_dep_time_local: Option<i64>,
    #[serde(rename = "DepDelayMin", skip_serializing_if = "Option::is_none")]
    pub dep_delay_min: Option<i64>,
    #[serde(rename = "TaxiOutMin", skip_serializing_if = "Option::is_none")]
    pub taxi_out_min: Option<i64>,
    #[serde(rename = "TaxiInMin", skip_serializing_if = "Option::is_none")]
    pub taxi_in_min: Option<i64>,
    #[serde(rename = "CRSArrTimeLocal", skip_serializing_if = "Option::is_none")]
    pub crs_arr_time_local: Option<i64>,
    #[serde(rename = "ArrDelayMin", skip_serializing_if = "Option::is_none")]
    pub arr_delay_min: Option<i64>,

    #[serde(rename = "Cancelled", skip_serializing_if = "Option::is_none")]
    pub cancelled: Option<bool>,
    #[serde(rename = "Diverted", skip_serializing_if = "Option::is_none")]
    pub diverted: Option<bool>,
    #[serde(rename = "CancellationCode", skip_serializing_if = "Option::is_none")]
    pub cancellation_code: Option<String>,
    #[serde(rename = "CancellationReason", skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,

    #[serde(rename = "ActualElapsedTimeMin", skip_serializing_if = "Option::is_none")]
    pub actual_elapsed_time_min: Option<i64>,
    #[serde(rename = "AirTimeMin", skip_serializing_if = "Option::is_none")]
    pub air_time_min: Option<i64>,
    #[serde(rename = "Flights", skip_serializing_if = "Option::is_none")]
    pub flights: Option<i64>,
    #[serde(rename = "DistanceMiles", skip_serializing_if = "Option::is_none")]
    pub distance_miles: Option<i64>,

    #[serde(rename = "CarrierDelayMin", skip_serializing_if = "Option::is_none")]
    pub carrier_delay_min: Option<i64>,
    #[serde(rename = "WeatherDelayMin", skip_serializing_if = "Option::is_none")]
    pub weather_delay_min: Option<i64>,
    #[serde(rename = "NASDelayMin", skip_serializing_if = "Option::is_none")]
    pub nas_delay_min: Option<i64>,
    #[serde(rename = "SecurityDelayMin", skip_serializing_if = "Option::is_none")]
    pub security_delay_min: Option<i64>,
    #[serde(rename = "LateAircraftDelayMin", skip_serializing_if = "Option::is_none")]
    pub late_aircraft_delay_min: Option<i64>,

    #[serde(rename = "OriginLocation", skip_serializing_if = "Option::is_none")]
    pub origin_location: Option<String>,
    #[serde(rename = "DestLocation", skip_serializing_if = "Option::is_none")]
    pub dest_location: Option<String>,
}

impl Document {
    /// 🕳️ True when nothing at all survived coercion. Such documents are not worth a bulk line.
    pub fn is_empty(&self) -> bool {
        *self == Document::default()
    }
}

/// 🗺️ The index mapping every partition is created with, unless a mapping file overrides it.
pub const BUILTIN_MAPPING: &str = include_str!("../mappings/flights.json");
