//! Post-hoc comparison of reported meter values against the synthetic inputs.

use std::fmt;

use crate::reconcile::Reconciliation;

/// Error statistics for one compared quantity.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DeltaStats {
    /// Rows where both sides were numeric.
    pub compared: usize,
    /// Mean absolute difference (W).
    pub mae_w: f64,
    /// Root-mean-square difference (W).
    pub rmse_w: f64,
    /// Largest absolute difference (W).
    pub max_abs_w: f64,
}

impl DeltaStats {
    /// Aggregates a sequence of signed differences.
    pub fn from_deltas(deltas: impl IntoIterator<Item = f64>) -> Self {
        let mut compared = 0_usize;
        let mut abs_sum = 0.0_f64;
        let mut sq_sum = 0.0_f64;
        let mut max_abs = 0.0_f64;
        for d in deltas {
            compared += 1;
            abs_sum += d.abs();
            sq_sum += d * d;
            max_abs = max_abs.max(d.abs());
        }
        if compared == 0 {
            return Self::default();
        }
        let n = compared as f64;
        Self {
            compared,
            mae_w: abs_sum / n,
            rmse_w: (sq_sum / n).sqrt(),
            max_abs_w: max_abs,
        }
    }
}

/// Summary of one reconciliation run.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonReport {
    /// Rows in the joined synthetic table.
    pub synthetic_rows: usize,
    /// Snapshot files read.
    pub snapshot_rows: usize,
    /// Joined rows after deduplication.
    pub matched_rows: usize,
    /// Snapshots with no synthetic sample at their minute.
    pub unmatched_snapshots: usize,
    /// Joined rows removed by deduplication.
    pub duplicates_dropped: usize,
    /// Reported `PVMeter` vs synthetic solar.
    pub solar: DeltaStats,
    /// Reported facility load vs synthetic load; `None` while the mapping is pending.
    pub load: Option<DeltaStats>,
}

impl ComparisonReport {
    /// Computes the report from a finished reconciliation.
    ///
    /// # Arguments
    ///
    /// * `outcome` - Joined and deduplicated records
    /// * `synthetic_rows` - Size of the synthetic table
    /// * `snapshot_rows` - Number of snapshots read
    /// * `load_mapped` - Whether a facility load field is configured
    pub fn from_reconciliation(
        outcome: &Reconciliation,
        synthetic_rows: usize,
        snapshot_rows: usize,
        load_mapped: bool,
    ) -> Self {
        let records = &outcome.records;
        let solar = DeltaStats::from_deltas(records.iter().filter_map(|r| r.solar_delta));
        let load = load_mapped
            .then(|| DeltaStats::from_deltas(records.iter().filter_map(|r| r.load_delta())));
        Self {
            synthetic_rows,
            snapshot_rows,
            matched_rows: records.len(),
            unmatched_snapshots: outcome.unmatched_snapshots,
            duplicates_dropped: outcome.duplicates_dropped,
            solar,
            load,
        }
    }
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Reconciliation Report ---")?;
        writeln!(f, "Synthetic rows:        {}", self.synthetic_rows)?;
        writeln!(f, "API snapshots:         {}", self.snapshot_rows)?;
        writeln!(f, "Matched rows:          {}", self.matched_rows)?;
        writeln!(f, "Unmatched snapshots:   {}", self.unmatched_snapshots)?;
        writeln!(f, "Duplicates dropped:    {}", self.duplicates_dropped)?;
        writeln!(
            f,
            "Solar delta:           MAE {:.1} W, RMSE {:.1} W, max {:.1} W ({} rows)",
            self.solar.mae_w, self.solar.rmse_w, self.solar.max_abs_w, self.solar.compared
        )?;
        match &self.load {
            Some(load) => write!(
                f,
                "Load delta:            MAE {:.1} W, RMSE {:.1} W, max {:.1} W ({} rows)",
                load.mae_w, load.rmse_w, load.max_abs_w, load.compared
            ),
            None => write!(f, "Load delta:            pending (no facility load field mapped)"),
        }
    }
}
