//! 🏎️ The per-row hot path: CSV record → Document → index name.
//!
//! Every flight goes through `transform` and `route` exactly once, so these two
//! set the ceiling on how fast a file can be read. Bulk I/O is not measured here.

use std::hint::black_box;
use std::path::Path;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use csv::StringRecord;
use skyload::lookups::{GeoTable, LookupTables, ReasonTable};
use skyload::routing::{FileHints, PartitionRouter};
use skyload::sources::rows::{ColumnIndex, RawRow};
use skyload::transforms::RowTransformer;

const HEADERS: [&str; 24] = [
    "FlightDate",
    "Reporting_Airline",
    "Tail_Number",
    "Flight_Number_Reporting_Airline",
    "Origin",
    "Dest",
    "CRSDepTime",
    "DepDelay",
    "TaxiOut",
    "TaxiIn",
    "CRSArrTime",
    "ArrDelay",
    "Cancelled",
    "CancellationCode",
    "Diverted",
    "ActualElapsedTime",
    "AirTime",
    "Flights",
    "Distance",
    "CarrierDelay",
    "WeatherDelay",
    "NASDelay",
    "SecurityDelay",
    "LateAircraftDelay",
];

// ── Helpers ──────────────────────────────────────────────────────────

fn lookups() -> Arc<LookupTables> {
    Arc::new(LookupTables {
        geo: GeoTable::from_entries([
            ("SFO", 37.618999, -122.375),
            ("JFK", 40.639751, -73.778925),
            ("ORD", 41.9786, -87.9048),
        ]),
        reasons: ReasonTable::from_entries([("A", "Carrier"), ("B", "Weather"), ("C", "National Air System")]),
    })
}

fn flown_record(day: usize) -> StringRecord {
    StringRecord::from(vec![
        format!("2024-07-{:02}", day % 28 + 1),
        "UA".into(),
        "N12345".into(),
        "1234".into(),
        "SFO".into(),
        "JFK".into(),
        "0730".into(),
        "-3.00".into(),
        "17.00".into(),
        "9.00".into(),
        "1602".into(),
        "12.50".into(),
        "0.00".into(),
        String::new(),
        "0.00".into(),
        "332.00".into(),
        "306.00".into(),
        "1.00".into(),
        "2586.00".into(),
        "12.00".into(),
        "0.00".into(),
        "0.00".into(),
        "0.00".into(),
        "0.00".into(),
    ])
}

fn cancelled_record() -> StringRecord {
    let mut fields: Vec<String> = flown_record(3).iter().map(str::to_string).collect();
    fields[12] = "1.00".into();
    fields[13] = "B".into();
    StringRecord::from(fields)
}

// ── Benchmarks ───────────────────────────────────────────────────────

fn bench_transform(c: &mut Criterion) {
    let columns = ColumnIndex::from_headers(&StringRecord::from(HEADERS.to_vec()));
    let transformer = RowTransformer::new(lookups());
    let flown = flown_record(0);
    let cancelled = cancelled_record();

    let mut group = c.benchmark_group("transform");
    group.throughput(Throughput::Elements(1));
    for (name, record) in [("flown", &flown), ("cancelled", &cancelled)] {
        group.bench_with_input(BenchmarkId::from_parameter(name), record, |b, record| {
            b.iter(|| transformer.transform(black_box(&RawRow::new(&columns, record))))
        });
    }
    group.finish();
}

fn bench_route(c: &mut Criterion) {
    let router = PartitionRouter::new("flights");
    let monthly = FileHints::from_path(Path::new("data/flights-2024-07.csv.gz"));
    let undated = FileHints::from_path(Path::new("data/On_Time_Reporting.zip"));

    let mut group = c.benchmark_group("route");
    group.bench_function("file_hints", |b| {
        b.iter(|| router.route(black_box(Some("2024-07-04")), black_box(&monthly)))
    });
    group.bench_function("row_date", |b| {
        b.iter(|| router.route(black_box(Some("2024-07-04T07:30:00")), black_box(&undated)))
    });
    group.finish();
}

fn bench_transform_and_route(c: &mut Criterion) {
    let columns = ColumnIndex::from_headers(&StringRecord::from(HEADERS.to_vec()));
    let transformer = RowTransformer::new(lookups());
    let router = PartitionRouter::new("flights");
    let hints = FileHints::from_path(Path::new("data/On_Time_Reporting.zip"));
    let records: Vec<StringRecord> = (0..1_000).map(flown_record).collect();

    let mut group = c.benchmark_group("transform_and_route");
    group.throughput(Throughput::Elements(records.len() as u64));
    group.bench_function("1k_rows", |b| {
        b.iter(|| {
            let mut routed = 0usize;
            for record in &records {
                let document = transformer.transform(&RawRow::new(&columns, record));
                if router.route(document.timestamp.as_deref(), &hints).is_some() {
                    routed += 1;
                }
            }
            black_box(routed)
        })
    });
    group.finish();
}

criterion_group!(benches, bench_transform, bench_route, bench_transform_and_route);
criterion_main!(benches);
