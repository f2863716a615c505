//! End-to-end reconciliation over a temporary data directory.

mod common;

use std::fs;
use std::path::Path;

use pretty_assertions::assert_eq;

use common::{Fixture, standard_fixture};
use ems_reconcile::ReconcileError;
use ems_reconcile::align::TimeOfDayKey;
use ems_reconcile::extract::{FieldValue, Subsystem};
use ems_reconcile::io::export::read_extracted_csv;
use ems_reconcile::runner::{run, write_outputs};

fn key(s: &str) -> TimeOfDayKey {
    TimeOfDayKey::parse(s).expect("test key should parse")
}

#[test]
fn synthetic_rows_are_the_overlap_in_utc() {
    let fx = standard_fixture();
    let out = run(fx.root(), &fx.config()).expect("run should succeed");

    let keys: Vec<String> = out.synthetic.iter().map(|s| s.time_of_day.to_string()).collect();
    assert_eq!(
        keys,
        vec![
            "09:36:00.000000",
            "09:37:00.000000",
            "09:38:00.000000",
            "09:39:00.000000",
        ]
    );
    assert_eq!(out.synthetic[0].load, 2_000_000.0);
    assert_eq!(out.synthetic[0].solar, 100.0);
}

#[test]
fn snapshots_are_sorted_and_non_json_is_skipped() {
    let fx = standard_fixture();
    let out = run(fx.root(), &fx.config()).expect("run should succeed");

    assert_eq!(out.snapshots.len(), 5);
    assert!(
        out.snapshots
            .windows(2)
            .all(|w| w[0].matched_time <= w[1].matched_time)
    );
}

#[test]
fn local_minute_aligns_with_reported_utc_minute() {
    let fx = standard_fixture();
    let out = run(fx.root(), &fx.config()).expect("run should succeed");

    let first = &out.reconciliation.records[0];
    assert_eq!(first.time_of_day, key("09:36:00.000000"));
    assert_eq!(first.synthetic_load, 2_000_000.0);
    assert_eq!(first.reported_solar, Some(104.0));
    assert_eq!(first.solar_delta, Some(4.0));
    assert_eq!(first.charge_discharge_sign, Some(1));
}

#[test]
fn duplicate_minute_keeps_first_snapshot() {
    let fx = standard_fixture();
    let out = run(fx.root(), &fx.config()).expect("run should succeed");
    let rec = &out.reconciliation;

    assert_eq!(rec.unmatched_snapshots, 1);
    assert_eq!(rec.duplicates_dropped, 1);
    assert_eq!(rec.records.len(), 3);

    let kept = rec
        .records
        .iter()
        .find(|r| r.time_of_day == key("09:37:00.000000"))
        .expect("09:37 should be present");
    assert_eq!(kept.reported_solar, Some(111.0));
    assert_eq!(kept.charge_discharge_sign, Some(0));
}

#[test]
fn joined_rows_never_exceed_either_side() {
    let fx = standard_fixture();
    let out = run(fx.root(), &fx.config()).expect("run should succeed");
    let records = &out.reconciliation.records;

    assert!(records.len() <= out.synthetic.len());
    assert!(records.len() <= out.snapshots.len());
    assert!(records.windows(2).all(|w| w[0].time_of_day < w[1].time_of_day));
}

#[test]
fn report_counts_and_pending_load() {
    let fx = standard_fixture();
    let out = run(fx.root(), &fx.config()).expect("run should succeed");
    let report = &out.report;

    assert_eq!(report.synthetic_rows, 4);
    assert_eq!(report.snapshot_rows, 5);
    assert_eq!(report.matched_rows, 3);
    assert_eq!(report.solar.compared, 3);
    assert!((report.solar.mae_w - 7.0 / 3.0).abs() < 1e-9);
    assert_eq!(report.solar.max_abs_w, 4.0);
    assert!(report.load.is_none());
    assert!(report.to_string().contains("pending"));
}

#[test]
fn mapped_load_field_fills_reported_load() {
    let fx = standard_fixture();
    let mut cfg = fx.config();
    cfg.extraction.facility_load_field = Some("PrimaryGridMeter".to_string());
    let out = run(fx.root(), &cfg).expect("run should succeed");

    let first = &out.reconciliation.records[0];
    assert_eq!(first.reported_load, FieldValue::Number(1_999_000.0));
    assert_eq!(first.load_delta(), Some(-1000.0));
    let load = out.report.load.expect("load stats should be computed");
    assert_eq!(load.compared, 3);
}

#[test]
fn zero_offset_matches_same_clock_minute() {
    let fx = Fixture::new();
    fx.write_synthetic("load.csv", &[("2023-01-01 01:36:00", 2_000_000.0)]);
    fx.write_synthetic("pv.csv", &[("2023-01-01 01:36:00", 0.0)]);
    fx.write_snapshot("a.json", "2023-05-02T01:36:12.5Z", 5.0, (0, 1));

    let mut cfg = fx.config();
    cfg.alignment.utc_offset_hours = 0;
    let out = run(fx.root(), &cfg).expect("run should succeed");

    assert_eq!(out.reconciliation.records.len(), 1);
    let rec = &out.reconciliation.records[0];
    assert_eq!(rec.time_of_day, key("01:36:00.000000"));
    assert_eq!(rec.synthetic_load, 2_000_000.0);
    assert_eq!(rec.charge_discharge_sign, Some(-1));
}

#[test]
fn outputs_are_written_and_read_back() {
    let fx = standard_fixture();
    let cfg = fx.config();
    let out = run(fx.root(), &cfg).expect("run should succeed");
    let written = write_outputs(&out, &cfg).expect("outputs should be written");

    assert_eq!(written.len(), 3);
    for path in &written {
        assert!(path.is_file(), "{} should exist", path.display());
    }

    let extracted_path = fx.out_dir().join("mined_motiv_response.csv");
    let text = fs::read_to_string(&extracted_path).expect("extracted csv");
    let rows = read_extracted_csv(&extracted_path, text.as_bytes()).expect("table should parse");
    assert_eq!(rows.len(), out.snapshots.len());
    for (row, snap) in rows.iter().zip(&out.snapshots) {
        assert_eq!(row.fields, snap.fields);
        assert_eq!(row.solar, snap.solar);
    }
    assert_eq!(
        rows[0].fields[&Subsystem::ChargeDischargeCounter],
        FieldValue::Tuple(vec![1.into(), 0.into()])
    );

    let joined = fs::read_to_string(fx.out_dir().join("reconciled.csv")).expect("joined csv");
    assert_eq!(joined.lines().count(), 1 + out.reconciliation.records.len());

    let svg = fs::read_to_string(fx.out_dir().join("reconciliation.svg")).expect("chart");
    assert!(svg.contains("<svg"));
}

#[test]
fn chart_can_be_disabled() {
    let fx = standard_fixture();
    let mut cfg = fx.config();
    cfg.output.render_chart = false;
    let out = run(fx.root(), &cfg).expect("run should succeed");
    let written = write_outputs(&out, &cfg).expect("outputs should be written");

    assert_eq!(written.len(), 2);
    assert!(!fx.out_dir().join("reconciliation.svg").exists());
}

#[test]
fn missing_synthetic_directory_is_fatal() {
    let fx = standard_fixture();
    fs::remove_dir_all(fx.root().join("data_we_gave_to_motiv")).expect("remove dir");

    match run(fx.root(), &fx.config()) {
        Err(ReconcileError::MissingDirectory(dir)) => {
            assert!(dir.ends_with("data_we_gave_to_motiv"));
        }
        other => panic!("expected MissingDirectory, got {other:?}"),
    }
}

#[test]
fn second_load_file_is_ambiguous() {
    let fx = standard_fixture();
    fx.write_synthetic("load_copy.csv", &[("2023-01-01 01:36:00", 1.0)]);

    let err = run(fx.root(), &fx.config()).expect_err("two load files must fail");
    assert!(matches!(err, ReconcileError::AmbiguousInput { .. }), "got {err:?}");
}

#[test]
fn malformed_snapshot_is_fatal() {
    let fx = standard_fixture();
    fx.write_raw_snapshot("poll_999.json", "{ not json");

    let err = run(fx.root(), &fx.config()).expect_err("bad json must fail");
    match err {
        ReconcileError::MalformedJson { path, .. } => {
            assert_eq!(path.file_name(), Some(Path::new("poll_999.json").as_os_str()));
        }
        other => panic!("expected MalformedJson, got {other:?}"),
    }
}
