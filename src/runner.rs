//! End-to-end run: load both sources, reconcile, and write the artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::align::fixed_offset;
use crate::config::ReconcileConfig;
use crate::error::{ReconcileError, Result};
use crate::extract::{ApiSnapshot, ResponseExtractor};
use crate::io::export::{export_extracted, export_joined};
use crate::plot::{ChartInput, render_svg};
use crate::reconcile::{Reconciliation, reconcile};
use crate::report::ComparisonReport;
use crate::synthetic::{SyntheticSample, SyntheticSeriesLoader};

/// Input directories resolved below `data_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputLayout {
    pub api_responses: PathBuf,
    pub synthetic: PathBuf,
}

impl InputLayout {
    /// Resolves and checks both input directories before any file is read.
    ///
    /// # Errors
    ///
    /// Returns `MissingDirectory` for the first directory that does not exist.
    pub fn resolve(data_path: &Path, config: &ReconcileConfig) -> Result<Self> {
        let api_responses = data_path.join(&config.input.api_responses_dir);
        let synthetic = data_path.join(&config.input.synthetic_dir);
        for dir in [&api_responses, &synthetic] {
            if !dir.is_dir() {
                return Err(ReconcileError::MissingDirectory(dir.clone()));
            }
        }
        Ok(Self {
            api_responses,
            synthetic,
        })
    }
}

/// Everything a run produces in memory.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub synthetic: Vec<SyntheticSample>,
    pub snapshots: Vec<ApiSnapshot>,
    pub reconciliation: Reconciliation,
    pub report: ComparisonReport,
}

/// Loads both sources from `data_path` and reconciles them.
///
/// # Errors
///
/// Returns the first fatal error from layout resolution, loading or extraction.
pub fn run(data_path: &Path, config: &ReconcileConfig) -> Result<RunOutput> {
    let layout = InputLayout::resolve(data_path, config)?;
    let offset_hours = config.alignment.utc_offset_hours;
    let zone = fixed_offset(offset_hours)?;
    warn!(
        offset_hours,
        "synthetic timestamps use a fixed UTC offset; no daylight-saving rule is applied"
    );

    let loader = SyntheticSeriesLoader::new(
        zone,
        &config.input.load_pattern,
        &config.input.solar_pattern,
    );
    let synthetic = loader.load_dir(&layout.synthetic)?;

    let extractor = ResponseExtractor::new(config.facility_load());
    let snapshots = extractor.collect_dir(&layout.api_responses)?;

    let reconciliation = reconcile(&synthetic, &snapshots);
    let report = ComparisonReport::from_reconciliation(
        &reconciliation,
        synthetic.len(),
        snapshots.len(),
        extractor.facility_load().is_some(),
    );

    Ok(RunOutput {
        synthetic,
        snapshots,
        reconciliation,
        report,
    })
}

/// Writes the CSV tables and, if enabled, the chart; returns the written paths.
///
/// # Errors
///
/// Returns `Io` or `Plot` if an artifact cannot be written.
pub fn write_outputs(output: &RunOutput, config: &ReconcileConfig) -> Result<Vec<PathBuf>> {
    let out = &config.output;
    fs::create_dir_all(&out.dir).map_err(|e| ReconcileError::io(&out.dir, e))?;
    let mut written = Vec::new();

    let extracted = out.dir.join(&out.extracted_csv);
    export_extracted(&output.snapshots, &extracted)?;
    written.push(extracted);

    let joined = out.dir.join(&out.joined_csv);
    export_joined(&output.reconciliation.records, &joined)?;
    written.push(joined);

    if out.render_chart {
        let chart = out.dir.join(&out.chart);
        render_svg(
            &ChartInput {
                synthetic: &output.synthetic,
                snapshots: &output.snapshots,
                field: config.chart_field(),
            },
            &chart,
        )?;
        written.push(chart);
    }

    for path in &written {
        info!(path = %path.display(), "wrote artifact");
    }
    Ok(written)
}
