//! Time-of-day join of the synthetic series with the API snapshots.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::align::TimeOfDayKey;
use crate::extract::{ApiSnapshot, FieldValue, Subsystem, charge_discharge_sign};
use crate::synthetic::SyntheticSample;

/// One synthetic sample paired with the snapshot taken in the same minute.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRecord {
    /// Shared UTC time-of-day key.
    pub time_of_day: TimeOfDayKey,
    /// Snapshot report time floored to the minute (date retained).
    pub matched_time: DateTime<Utc>,
    /// Load fed to the API (W).
    pub synthetic_load: f64,
    /// Solar fed to the API (W).
    pub synthetic_solar: f64,
    /// Facility load read back from the API; `Missing` while the mapping is pending.
    pub reported_load: FieldValue,
    /// `PVMeter.ACPowerWattsSigned` read back from the API (W).
    pub reported_solar: Option<f64>,
    /// `reported_solar - synthetic_solar` (W).
    pub solar_delta: Option<f64>,
    /// Sign derived from `ChargeDischargeCounter`.
    pub charge_discharge_sign: Option<i8>,
    /// Every extracted subsystem cell.
    pub fields: BTreeMap<Subsystem, FieldValue>,
}

impl AlignedRecord {
    fn new(sample: &SyntheticSample, snapshot: &ApiSnapshot) -> Self {
        Self {
            time_of_day: sample.time_of_day,
            matched_time: snapshot.matched_time,
            synthetic_load: sample.load,
            synthetic_solar: sample.solar,
            reported_load: snapshot.facility_load.clone(),
            reported_solar: snapshot.solar,
            solar_delta: snapshot.solar.map(|s| s - sample.solar),
            charge_discharge_sign: charge_discharge_sign(
                snapshot.field(Subsystem::ChargeDischargeCounter),
            ),
            fields: snapshot.fields.clone(),
        }
    }

    /// `reported_load - synthetic_load` when the reported load is numeric.
    pub fn load_delta(&self) -> Option<f64> {
        self.reported_load.as_f64().map(|l| l - self.synthetic_load)
    }
}

/// Joined table plus the bookkeeping needed for the comparison report.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// Deduplicated records sorted by time of day.
    pub records: Vec<AlignedRecord>,
    /// Snapshots whose minute has no synthetic sample.
    pub unmatched_snapshots: usize,
    /// Joined rows removed by key deduplication.
    pub duplicates_dropped: usize,
}

/// Inner-joins both tables on time of day.
///
/// Output is sorted by time of day; rows sharing a key keep the order of
/// `snapshots`. Duplicates are not removed here, see [`dedupe_by_key`].
pub fn join(synthetic: &[SyntheticSample], snapshots: &[ApiSnapshot]) -> Vec<AlignedRecord> {
    let by_key: HashMap<TimeOfDayKey, &SyntheticSample> = synthetic
        .iter()
        .rev()
        .map(|s| (s.time_of_day, s))
        .collect();

    let mut records: Vec<AlignedRecord> = snapshots
        .iter()
        .filter_map(|snap| {
            let sample = by_key.get(&snap.key());
            if sample.is_none() {
                debug!(key = %snap.key(), file = %snap.source.display(), "snapshot has no synthetic sample");
            }
            sample.map(|sample| AlignedRecord::new(sample, snap))
        })
        .collect();
    records.sort_by_key(|r| r.time_of_day);
    records
}

/// Keeps the first record of every time-of-day key.
///
/// Returns the surviving records and the number removed.
pub fn dedupe_by_key(records: Vec<AlignedRecord>) -> (Vec<AlignedRecord>, usize) {
    let before = records.len();
    let mut seen = HashSet::with_capacity(before);
    let kept: Vec<AlignedRecord> = records
        .into_iter()
        .filter(|r| seen.insert(r.time_of_day))
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

/// Joins, deduplicates and counts unmatched snapshots.
pub fn reconcile(synthetic: &[SyntheticSample], snapshots: &[ApiSnapshot]) -> Reconciliation {
    let joined = join(synthetic, snapshots);
    let unmatched_snapshots = snapshots.len() - joined.len();
    let (records, duplicates_dropped) = dedupe_by_key(joined);
    info!(
        matched = records.len(),
        unmatched = unmatched_snapshots,
        duplicates = duplicates_dropped,
        "reconciled snapshots against synthetic series"
    );
    Reconciliation {
        records,
        unmatched_snapshots,
        duplicates_dropped,
    }
}
