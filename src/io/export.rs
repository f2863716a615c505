//! CSV export of the extracted API table and the joined table.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::error::{ReconcileError, Result};
use crate::extract::{ApiSnapshot, FieldValue, SUBSYSTEMS, Subsystem};
use crate::reconcile::AlignedRecord;

/// Leading columns of the extracted API table; subsystem columns follow.
const EXTRACTED_PREFIX: &[&str] = &[
    "api_return_time",
    "matched_timestamp",
    "api_poll_time",
    "load",
    "solar",
];

/// Leading columns of the joined table; subsystem columns follow.
const JOINED_PREFIX: &[&str] = &[
    "time_of_day",
    "matched_timestamp",
    "synthetic_load",
    "synthetic_solar",
    "reported_load",
    "reported_solar",
    "solar_delta",
    "charge_discharge_sign",
];

fn header(prefix: &[&'static str]) -> Vec<&'static str> {
    prefix
        .iter()
        .copied()
        .chain(SUBSYSTEMS.iter().map(|(id, _)| id.name()))
        .collect()
}

fn fmt_return_time(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

fn fmt_matched_time(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M:%S%.6fZ").to_string()
}

fn fmt_opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn field_cells<'a>(
    fields: &'a BTreeMap<Subsystem, FieldValue>,
) -> impl Iterator<Item = String> + 'a {
    SUBSYSTEMS.iter().map(move |(id, _)| {
        fields
            .get(id)
            .map(ToString::to_string)
            .unwrap_or_default()
    })
}

/// One row of the extracted API table as read back from CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRow {
    pub api_return_time: String,
    pub matched_timestamp: String,
    pub api_poll_time: Option<String>,
    pub load: FieldValue,
    pub solar: Option<f64>,
    pub fields: BTreeMap<Subsystem, FieldValue>,
}

/// Writes the extracted API table as CSV to any writer.
///
/// # Arguments
///
/// * `snapshots` - Flattened snapshots, already sorted
/// * `writer` - Destination implementing `Write`
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_extracted_csv(snapshots: &[ApiSnapshot], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(header(EXTRACTED_PREFIX))?;

    for s in snapshots {
        let mut row = vec![
            fmt_return_time(s.reported_time),
            fmt_matched_time(s.matched_time),
            s.poll_time.clone().unwrap_or_default(),
            s.facility_load.to_string(),
            fmt_opt(s.solar),
        ];
        row.extend(field_cells(&s.fields));
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Writes the joined table as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_joined_csv(records: &[AlignedRecord], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(header(JOINED_PREFIX))?;

    for r in records {
        let mut row = vec![
            r.time_of_day.to_string(),
            fmt_matched_time(r.matched_time),
            r.synthetic_load.to_string(),
            r.synthetic_solar.to_string(),
            r.reported_load.to_string(),
            fmt_opt(r.reported_solar),
            fmt_opt(r.solar_delta),
            fmt_opt(r.charge_discharge_sign),
        ];
        row.extend(field_cells(&r.fields));
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Reads an extracted API table written by [`write_extracted_csv`].
///
/// Columns are located by header name, so column order does not matter.
///
/// # Arguments
///
/// * `path` - Label used in error messages
/// * `reader` - CSV source
///
/// # Errors
///
/// Returns `MalformedCsv` if a required column is absent or a row is unreadable.
pub fn read_extracted_csv(path: &Path, reader: impl Read) -> Result<Vec<ExtractedRow>> {
    let malformed = |message: String| ReconcileError::MalformedCsv {
        path: path.to_path_buf(),
        message,
    };

    let mut rdr = csv::ReaderBuilder::new().from_reader(reader);
    let headers = rdr.headers().map_err(|e| malformed(e.to_string()))?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| malformed(format!("missing column \"{name}\"")))
    };

    let return_col = column("api_return_time")?;
    let matched_col = column("matched_timestamp")?;
    let poll_col = column("api_poll_time")?;
    let load_col = column("load")?;
    let solar_col = column("solar")?;
    let field_cols = SUBSYSTEMS
        .iter()
        .map(|(id, _)| column(id.name()).map(|c| (*id, c)))
        .collect::<Result<Vec<_>>>()?;

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|e| malformed(e.to_string()))?;
        let cell = |i: usize| record.get(i).unwrap_or("");

        let solar = match cell(solar_col) {
            "" => None,
            s => Some(
                s.parse::<f64>()
                    .map_err(|_| malformed(format!("solar \"{s}\" is not numeric")))?,
            ),
        };
        let poll = cell(poll_col);

        rows.push(ExtractedRow {
            api_return_time: cell(return_col).to_string(),
            matched_timestamp: cell(matched_col).to_string(),
            api_poll_time: (!poll.is_empty()).then(|| poll.to_string()),
            load: FieldValue::parse_cell(cell(load_col)),
            solar,
            fields: field_cols
                .iter()
                .map(|(id, c)| (*id, FieldValue::parse_cell(cell(*c))))
                .collect(),
        });
    }
    Ok(rows)
}

/// Writes the extracted API table to `path`.
///
/// # Errors
///
/// Returns `Io` if the file cannot be created or written.
pub fn export_extracted(snapshots: &[ApiSnapshot], path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| ReconcileError::io(path, e))?;
    write_extracted_csv(snapshots, io::BufWriter::new(file)).map_err(|e| ReconcileError::io(path, e))
}

/// Writes the joined table to `path`.
///
/// # Errors
///
/// Returns `Io` if the file cannot be created or written.
pub fn export_joined(records: &[AlignedRecord], path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| ReconcileError::io(path, e))?;
    write_joined_csv(records, io::BufWriter::new(file)).map_err(|e| ReconcileError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ResponseExtractor;
    use crate::reconcile::join;
    use crate::synthetic::SyntheticSample;
    use serde_json::json;

    fn snapshot(ts: &str, battery: serde_json::Value) -> ApiSnapshot {
        let body = json!({
            "timestamp": "2023-05-02 01:36:01",
            "api_response": {
                "Timestamp": ts,
                "ChargeDischargeCounter": {"C": 0, "D": 0},
                "BatteryMeter": {"ACPowerWattsSigned": battery},
                "PVMeter": {"ACPowerWattsSigned": -812.25},
                "GEM100": {"StateOfCharge": 55},
                "1MinGridLessBatteryAverager": {"A": 1.5, "B": "idle"}
            }
        });
        ResponseExtractor::new(Some(Subsystem::BatteryMeter))
            .extract_str(Path::new("snap.json"), &body.to_string())
            .expect("snapshot should extract")
    }

    fn written(snapshots: &[ApiSnapshot]) -> String {
        let mut buf = Vec::new();
        write_extracted_csv(snapshots, &mut buf).expect("csv export should succeed");
        String::from_utf8(buf).expect("csv output should be valid UTF-8")
    }

    #[test]
    fn extracted_header_lists_every_subsystem() {
        let csv = written(&[]);
        let first_line = csv.lines().next().unwrap_or("");
        assert!(first_line.starts_with("api_return_time,matched_timestamp,api_poll_time,load,solar,"));
        assert!(first_line.ends_with("15MinGridAverager,1MinGridLessBatteryAverager"));
        assert_eq!(first_line.split(',').count(), EXTRACTED_PREFIX.len() + SUBSYSTEMS.len());
    }

    #[test]
    fn extracted_timestamps_are_formatted() {
        let csv = written(&[snapshot("2023-05-02T01:36:12.5Z", json!(-300))]);
        let row = csv.lines().nth(1).unwrap_or("");
        assert!(row.starts_with("2023-05-02T01:36:12.500000Z,2023-05-02 01:36:00.000000Z,"));
    }

    #[test]
    fn extracted_round_trip_preserves_fields() {
        let snaps = vec![
            snapshot("2023-05-02T01:36:12.5Z", json!(-300)),
            snapshot("2023-05-02T01:37:02Z", json!(null)),
        ];
        let csv = written(&snaps);
        let rows = read_extracted_csv(Path::new("mem.csv"), csv.as_bytes())
            .expect("written table should read back");

        assert_eq!(rows.len(), snaps.len());
        for (row, snap) in rows.iter().zip(&snaps) {
            assert_eq!(row.fields, snap.fields);
            assert_eq!(row.solar, snap.solar);
            assert_eq!(row.load, snap.facility_load);
            assert_eq!(row.api_poll_time, snap.poll_time);
        }
        assert!(rows[1].fields[&Subsystem::BatteryMeter].is_missing());
    }

    #[test]
    fn read_rejects_missing_columns() {
        let err = read_extracted_csv(Path::new("mem.csv"), "load,solar\n1,2\n".as_bytes());
        assert!(matches!(err, Err(ReconcileError::MalformedCsv { .. })));
    }

    #[test]
    fn joined_rows_carry_synthetic_and_reported_values() {
        let snaps = vec![snapshot("2023-05-02T09:36:40Z", json!(-300))];
        let synthetic = vec![SyntheticSample {
            time_of_day: snaps[0].key(),
            load: 2_000_000.0,
            solar: 800.0,
        }];
        let records = join(&synthetic, &snaps);

        let mut buf = Vec::new();
        write_joined_csv(&records, &mut buf).expect("csv export should succeed");
        let csv = String::from_utf8(buf).expect("valid UTF-8");
        let mut lines = csv.lines();
        let header = lines.next().unwrap_or("");
        assert!(header.starts_with("time_of_day,matched_timestamp,synthetic_load"));
        let row = lines.next().unwrap_or("");
        assert!(
            row.starts_with("09:36:00.000000,2023-05-02 09:36:00.000000Z,2000000,800,-300,-812.25,-1612.25,0,"),
            "unexpected row: {row}"
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn output_is_deterministic() {
        let snaps = vec![snapshot("2023-05-02T01:36:12.5Z", json!(-300))];
        assert_eq!(written(&snaps), written(&snaps));
    }
}
