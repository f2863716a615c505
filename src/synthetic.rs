//! Loading of the synthetic load and solar series that were fed to the API.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::FixedOffset;
use tracing::{debug, info, warn};

use crate::align::{TimeOfDayKey, synthetic_key};
use crate::error::{ReconcileError, Result};

/// One minute of the representative synthetic day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticSample {
    /// UTC time of day of the sample.
    pub time_of_day: TimeOfDayKey,
    /// Facility load (W).
    pub load: f64,
    /// Solar generation (W).
    pub solar: f64,
}

/// Reads a load/solar CSV pair from a directory and joins them on time of day.
#[derive(Debug, Clone)]
pub struct SyntheticSeriesLoader {
    zone: FixedOffset,
    load_pattern: String,
    solar_pattern: String,
}

impl SyntheticSeriesLoader {
    /// Creates a loader.
    ///
    /// # Arguments
    ///
    /// * `zone` - Fixed offset the CSV timestamps are written in
    /// * `load_pattern` - File name substring selecting the load CSV
    /// * `solar_pattern` - File name substring selecting the solar CSV
    pub fn new(zone: FixedOffset, load_pattern: &str, solar_pattern: &str) -> Self {
        Self {
            zone,
            load_pattern: load_pattern.to_string(),
            solar_pattern: solar_pattern.to_string(),
        }
    }

    /// Loads, joins and sorts both series from `dir`.
    ///
    /// # Errors
    ///
    /// Returns `MissingDirectory`, `AmbiguousInput` if a pattern does not match
    /// exactly one file, or `MalformedCsv` for any unreadable row.
    pub fn load_dir(&self, dir: &Path) -> Result<Vec<SyntheticSample>> {
        if !dir.is_dir() {
            return Err(ReconcileError::MissingDirectory(dir.to_path_buf()));
        }
        let (load_path, solar_path) = self.find_inputs(dir)?;
        debug!(load = %load_path.display(), solar = %solar_path.display(), "synthetic inputs");

        let load = self.read_path(&load_path)?;
        let solar = self.read_path(&solar_path)?;
        let merged = merge_series(&load, &solar);

        let dropped = load.len().max(solar.len()) - merged.len();
        if dropped > 0 {
            warn!(dropped, "time-of-day keys present in only one synthetic series");
        }
        info!(rows = merged.len(), "loaded synthetic series");
        Ok(merged)
    }

    /// Selects the load and solar CSV files in `dir`.
    ///
    /// A file name matching both patterns counts as a load file.
    ///
    /// # Errors
    ///
    /// Returns `AmbiguousInput` unless each pattern selects exactly one file.
    pub fn find_inputs(&self, dir: &Path) -> Result<(PathBuf, PathBuf)> {
        let mut load = Vec::new();
        let mut solar = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| ReconcileError::io(dir, e))? {
            let path = entry.map_err(|e| ReconcileError::io(dir, e))?.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.contains(&self.load_pattern) {
                load.push(path);
            } else if name.contains(&self.solar_pattern) {
                solar.push(path);
            }
        }
        let load = single(dir, &self.load_pattern, load)?;
        let solar = single(dir, &self.solar_pattern, solar)?;
        Ok((load, solar))
    }

    fn read_path(&self, path: &Path) -> Result<Vec<(TimeOfDayKey, f64)>> {
        let file = File::open(path).map_err(|e| ReconcileError::io(path, e))?;
        self.read_series(path, file)
    }

    /// Parses a two-column `timestamp,value` CSV without a header.
    ///
    /// Rows whose time-of-day repeats an earlier row are dropped.
    ///
    /// # Arguments
    ///
    /// * `path` - Label used in error messages
    /// * `reader` - CSV source
    ///
    /// # Errors
    ///
    /// Returns `MalformedCsv` on a short row, a bad timestamp or a non-numeric value.
    pub fn read_series(
        &self,
        path: &Path,
        reader: impl Read,
    ) -> Result<Vec<(TimeOfDayKey, f64)>> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let malformed = |line: u64, message: String| ReconcileError::MalformedCsv {
            path: path.to_path_buf(),
            message: format!("line {line}: {message}"),
        };

        let mut seen = BTreeMap::new();
        let mut series = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(|e| ReconcileError::MalformedCsv {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
            let line = record.position().map_or(0, csv::Position::line);
            if record.len() < 2 {
                return Err(malformed(line, format!("expected 2 columns, found {}", record.len())));
            }
            let key = synthetic_key(&record[0], self.zone).map_err(|e| malformed(line, e.to_string()))?;
            let value: f64 = record[1]
                .parse()
                .map_err(|_| malformed(line, format!("value \"{}\" is not numeric", &record[1])))?;

            match seen.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(line);
                    series.push((key, value));
                }
                Entry::Occupied(first) => {
                    debug!(%key, line, first = *first.get(), "duplicate time of day dropped");
                }
            }
        }
        Ok(series)
    }
}

fn single(dir: &Path, pattern: &str, mut found: Vec<PathBuf>) -> Result<PathBuf> {
    if found.len() == 1 {
        if let Some(path) = found.pop() {
            return Ok(path);
        }
    }
    Err(ReconcileError::AmbiguousInput {
        dir: dir.to_path_buf(),
        pattern: pattern.to_string(),
        found: found.len(),
    })
}

/// Inner-joins two keyed series, sorted ascending by time of day.
///
/// Each input must already be free of duplicate keys; if not, the first
/// occurrence wins.
pub fn merge_series(load: &[(TimeOfDayKey, f64)], solar: &[(TimeOfDayKey, f64)]) -> Vec<SyntheticSample> {
    let mut solar_by_key = BTreeMap::new();
    for (key, value) in solar {
        solar_by_key.entry(*key).or_insert(*value);
    }
    let mut load_by_key = BTreeMap::new();
    for (key, value) in load {
        load_by_key.entry(*key).or_insert(*value);
    }

    load_by_key
        .into_iter()
        .filter_map(|(time_of_day, load)| {
            solar_by_key.get(&time_of_day).map(|solar| SyntheticSample {
                time_of_day,
                load,
                solar: *solar,
            })
        })
        .collect()
}
