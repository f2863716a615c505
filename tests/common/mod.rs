//! Shared test fixtures for integration tests.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use tempfile::TempDir;

use ems_reconcile::config::ReconcileConfig;

/// A temporary `data_path` with both input subdirectories created.
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        fs::create_dir(dir.path().join("api_responses")).expect("api dir");
        fs::create_dir(dir.path().join("data_we_gave_to_motiv")).expect("synthetic dir");
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn out_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    /// Writes an unlabeled `timestamp,value` CSV into the synthetic directory.
    pub fn write_synthetic(&self, name: &str, rows: &[(&str, f64)]) {
        let body: String = rows.iter().map(|(ts, v)| format!("{ts},{v}\n")).collect();
        fs::write(self.root().join("data_we_gave_to_motiv").join(name), body)
            .expect("synthetic csv should be written");
    }

    /// Writes one raw file into the snapshot directory.
    pub fn write_raw_snapshot(&self, name: &str, body: &str) {
        fs::write(self.root().join("api_responses").join(name), body)
            .expect("snapshot should be written");
    }

    pub fn write_snapshot(&self, name: &str, reported: &str, pv: f64, counter: (u8, u8)) {
        self.write_raw_snapshot(name, &snapshot_json(reported, pv, counter));
    }

    /// Default configuration writing into this fixture's `out` directory.
    pub fn config(&self) -> ReconcileConfig {
        let mut cfg = ReconcileConfig::default();
        cfg.output.dir = self.out_dir();
        cfg
    }
}

/// A complete snapshot document with every subsystem populated.
pub fn snapshot_json(reported: &str, pv: f64, counter: (u8, u8)) -> String {
    json!({
        "timestamp": reported,
        "api_response": {
            "Timestamp": reported,
            "ChargeDischargeCounter": {"Charge": counter.0, "Discharge": counter.1},
            "1MinPVAverager": {"Averager": pv},
            "BatteryMeter": {"ACPowerWattsSigned": -250},
            "PrimaryGridMeter": {"ACPowerWattsSigned": 1_999_000},
            "ArbiterPower": {"SystemDirectorPowerRequest": 300},
            "PVChargeLimiter": {"PVChargeLimitWatts": 9000},
            "PVMeter": {"ACPowerWattsSigned": pv},
            "Distributer1": {"AvailableCapacityWattHours": 48_000},
            "GEM100": {"StateOfCharge": 57.5},
            "MaxAvgGrid": {"MaxAverage": 2_100_000},
            "1MinBatteryAverager": {"Averager": -240},
            "DemandManagement1": {"ClippingLevel": 2_500_000},
            "15MinGridAverager": {"Averager": 2_050_000},
            "1MinGridLessBatteryAverager": {"Mean": 1_998_500, "Count": 60}
        }
    })
    .to_string()
}

/// Four overlapping minutes of synthetic data plus five polls.
///
/// Local 01:35–01:39 load and 01:36–01:40 PV overlap on 01:36–01:39
/// (09:36–09:39 UTC). One poll falls outside the synthetic day and two share
/// the 09:37 minute.
pub fn standard_fixture() -> Fixture {
    let fx = Fixture::new();
    fx.write_synthetic(
        "synthetic_load.csv",
        &[
            ("2023-01-01 01:35:00", 1_900_000.0),
            ("2023-01-01 01:36:00", 2_000_000.0),
            ("2023-01-01 01:37:00", 2_010_000.0),
            ("2023-01-01 01:38:00", 2_020_000.0),
            ("2023-01-01 01:39:00", 2_030_000.0),
        ],
    );
    fx.write_synthetic(
        "synthetic_pv.csv",
        &[
            ("2023-01-01 01:40:00", 140.0),
            ("2023-01-01 01:36:00", 100.0),
            ("2023-01-01 01:37:00", 110.0),
            ("2023-01-01 01:38:00", 120.0),
            ("2023-01-01 01:39:00", 130.0),
        ],
    );
    fx.write_snapshot("poll_001.json", "2023-05-02T09:36:12.500000Z", 104.0, (1, 0));
    fx.write_snapshot("poll_002.json", "2023-05-02T09:37:03Z", 111.0, (0, 0));
    fx.write_snapshot("poll_003.json", "2023-05-02T09:37:48Z", 999.0, (0, 1));
    fx.write_snapshot("poll_004.json", "2023-05-02T09:38:30Z", 118.0, (2, 0));
    fx.write_snapshot("poll_005.json", "2023-05-02T11:00:00Z", 0.0, (0, 0));
    fx.write_raw_snapshot("notes.txt", "not a snapshot");
    fx
}
