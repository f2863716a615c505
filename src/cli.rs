use std::path::PathBuf;

use clap::Parser;

use crate::config::ReconcileConfig;

/// Reconcile synthetic load/solar inputs with polled API snapshots.
#[derive(Debug, Parser)]
#[command(name = "ems-reconcile", version, long_about = None)]
pub struct CliOptions {
    /// Folder containing the `api_responses` and `data_we_gave_to_motiv` subdirectories
    #[arg(default_value = ".")]
    pub data_path: PathBuf,

    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory the CSV files and chart are written to
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Fixed UTC offset of the synthetic timestamps, in hours
    #[arg(long, allow_hyphen_values = true)]
    pub utc_offset: Option<i32>,

    /// Subsystem identifier to report as facility load
    #[arg(long)]
    pub load_field: Option<String>,

    /// Skip rendering the SVG chart
    #[arg(long)]
    pub no_chart: bool,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliOptions {
    /// Applies command-line overrides on top of a loaded configuration.
    pub fn apply(&self, config: &mut ReconcileConfig) {
        if let Some(dir) = &self.out_dir {
            config.output.dir.clone_from(dir);
        }
        if let Some(hours) = self.utc_offset {
            config.alignment.utc_offset_hours = hours;
        }
        if let Some(field) = &self.load_field {
            config.extraction.facility_load_field = Some(field.clone());
        }
        if self.no_chart {
            config.output.render_chart = false;
        }
    }
}

pub fn parse_args() -> CliOptions {
    CliOptions::parse()
}
