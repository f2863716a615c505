//! Flattening of per-poll API snapshot files into uniform rows.
//!
//! Each snapshot file is reduced by a pure function to an [`ApiSnapshot`];
//! the table is assembled once after every file has been read.

pub mod field;
pub mod subsystem;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::align::{TimeOfDayKey, floor_to_minute, parse_reported};
use crate::error::{ReconcileError, Result};

pub use field::{FieldValue, charge_discharge_sign};
pub use subsystem::{Projection, SUBSYSTEMS, Subsystem};

const MISSING: &FieldValue = &FieldValue::Missing;

/// On-disk layout of one polled response.
#[derive(Debug, Deserialize)]
struct SnapshotFile {
    #[serde(default)]
    timestamp: Option<Value>,
    api_response: Map<String, Value>,
}

/// One flattened API snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiSnapshot {
    /// File the snapshot was read from.
    pub source: PathBuf,
    /// Polling script timestamp, verbatim.
    pub poll_time: Option<String>,
    /// `poll_time` as a UTC instant, when it parses; zone-less values read as UTC.
    pub poll_instant: Option<DateTime<Utc>>,
    /// `Timestamp` reported by the API (UTC).
    pub reported_time: DateTime<Utc>,
    /// `reported_time` floored to the minute.
    pub matched_time: DateTime<Utc>,
    /// One cell per entry of [`SUBSYSTEMS`].
    pub fields: BTreeMap<Subsystem, FieldValue>,
    /// Facility load according to the configured mapping; `Missing` while pending.
    pub facility_load: FieldValue,
    /// `PVMeter.ACPowerWattsSigned`.
    pub solar: Option<f64>,
}

impl ApiSnapshot {
    /// Alignment key: the floored report time without its date.
    pub fn key(&self) -> TimeOfDayKey {
        TimeOfDayKey::from_utc(self.matched_time)
    }

    pub fn field(&self, id: Subsystem) -> &FieldValue {
        self.fields.get(&id).unwrap_or(MISSING)
    }
}

/// Builds [`ApiSnapshot`]s from snapshot files.
#[derive(Debug, Clone, Default)]
pub struct ResponseExtractor {
    facility_load: Option<Subsystem>,
}

impl ResponseExtractor {
    /// Creates an extractor; `facility_load` of `None` leaves the load column pending.
    pub fn new(facility_load: Option<Subsystem>) -> Self {
        Self { facility_load }
    }

    pub fn facility_load(&self) -> Option<Subsystem> {
        self.facility_load
    }

    /// Flattens the text of one snapshot file.
    ///
    /// # Errors
    ///
    /// Returns `MalformedJson` if the text is not a snapshot object, or
    /// `InvalidTimestamp` if `api_response.Timestamp` cannot be parsed.
    pub fn extract_str(&self, source: &Path, contents: &str) -> Result<ApiSnapshot> {
        let file: SnapshotFile =
            serde_json::from_str(contents).map_err(|e| ReconcileError::MalformedJson {
                path: source.to_path_buf(),
                message: e.to_string(),
            })?;
        self.extract(source, file)
    }

    fn extract(&self, source: &Path, file: SnapshotFile) -> Result<ApiSnapshot> {
        let response = &file.api_response;
        let reported = response
            .get("Timestamp")
            .and_then(Value::as_str)
            .ok_or_else(|| ReconcileError::MalformedJson {
                path: source.to_path_buf(),
                message: "api_response.Timestamp is missing or not a string".to_string(),
            })?;
        let reported_time = parse_reported(reported)?;

        let fields: BTreeMap<Subsystem, FieldValue> = SUBSYSTEMS
            .iter()
            .map(|(id, projection)| {
                let value = projection.apply(response.get(id.name()));
                if value.is_missing() {
                    debug!(file = %source.display(), subsystem = %id, "unresolved field");
                }
                (*id, value)
            })
            .collect();

        let facility_load = self
            .facility_load
            .and_then(|id| fields.get(&id).cloned())
            .unwrap_or(FieldValue::Missing);
        let solar = fields.get(&Subsystem::PvMeter).and_then(FieldValue::as_f64);

        let poll_time = file.timestamp.and_then(|v| match v {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        });
        let poll_instant = poll_time.as_deref().and_then(|s| parse_reported(s).ok());

        Ok(ApiSnapshot {
            source: source.to_path_buf(),
            poll_time,
            poll_instant,
            reported_time,
            matched_time: floor_to_minute(reported_time),
            fields,
            facility_load,
            solar,
        })
    }

    /// Reads and flattens one snapshot file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, otherwise as [`Self::extract_str`].
    pub fn extract_file(&self, path: &Path) -> Result<ApiSnapshot> {
        let contents = fs::read_to_string(path).map_err(|e| ReconcileError::io(path, e))?;
        self.extract_str(path, &contents)
    }

    /// Flattens every `*.json` file in `dir`, sorted by matched time.
    ///
    /// Files are visited in name order so that snapshots sharing a matched
    /// minute keep a deterministic relative order.
    ///
    /// # Errors
    ///
    /// Returns `MissingDirectory` if `dir` does not exist, or the first
    /// per-file error encountered.
    pub fn collect_dir(&self, dir: &Path) -> Result<Vec<ApiSnapshot>> {
        if !dir.is_dir() {
            return Err(ReconcileError::MissingDirectory(dir.to_path_buf()));
        }
        if self.facility_load.is_none() {
            warn!("facility load mapping is pending; the load column will be empty");
        }

        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| ReconcileError::io(dir, e))? {
            let path = entry.map_err(|e| ReconcileError::io(dir, e))?.path();
            if path.extension().is_some_and(|ext| ext == "json") && path.is_file() {
                paths.push(path);
            } else {
                debug!(path = %path.display(), "skipping non-snapshot entry");
            }
        }
        paths.sort();

        let mut snapshots = paths
            .iter()
            .map(|p| self.extract_file(p))
            .collect::<Result<Vec<_>>>()?;
        snapshots.sort_by_key(|s| s.matched_time);

        info!(dir = %dir.display(), count = snapshots.len(), "collected API snapshots");
        Ok(snapshots)
    }
}
