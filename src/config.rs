//! TOML-based run configuration.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::extract::Subsystem;

/// Top-level configuration parsed from TOML.
///
/// Every field has a default matching the layout the polling script
/// produced. Load from TOML with [`ReconcileConfig::from_toml_file`] or use
/// [`ReconcileConfig::default`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReconcileConfig {
    /// Input directory layout.
    pub input: InputConfig,
    /// Time-zone handling for the synthetic series.
    pub alignment: AlignmentConfig,
    /// Field mapping for the API snapshots.
    pub extraction: ExtractionConfig,
    /// Output artifacts.
    pub output: OutputConfig,
}

/// Input directory layout below `data_path`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InputConfig {
    /// Directory holding one JSON file per poll.
    pub api_responses_dir: String,
    /// Directory holding the load and solar CSVs.
    pub synthetic_dir: String,
    /// File name substring selecting the load CSV.
    pub load_pattern: String,
    /// File name substring selecting the solar CSV.
    pub solar_pattern: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            api_responses_dir: "api_responses".to_string(),
            synthetic_dir: "data_we_gave_to_motiv".to_string(),
            load_pattern: "load".to_string(),
            solar_pattern: "pv".to_string(),
        }
    }
}

/// Time-zone handling for the synthetic series.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlignmentConfig {
    /// Fixed UTC offset of the synthetic timestamps in hours. No DST is applied.
    pub utc_offset_hours: i32,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: -8,
        }
    }
}

/// Field mapping for the API snapshots.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractionConfig {
    /// Subsystem identifier standing for facility load; unset means pending.
    pub facility_load_field: Option<String>,
}

/// Output artifacts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    /// Directory the artifacts are written to.
    pub dir: PathBuf,
    /// Extracted API table.
    pub extracted_csv: String,
    /// Joined table.
    pub joined_csv: String,
    /// SVG chart file.
    pub chart: String,
    /// Whether to render the chart at all.
    pub render_chart: bool,
    /// Subsystem plotted in the facility load panel.
    pub chart_field: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            extracted_csv: "mined_motiv_response.csv".to_string(),
            joined_csv: "reconciled.csv".to_string(),
            chart: "reconciliation.svg".to_string(),
            render_chart: true,
            chart_field: "ArbiterPower".to_string(),
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"alignment.utc_offset_hours"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl ReconcileConfig {
    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "config".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Resolved facility load identifier, `None` while pending.
    pub fn facility_load(&self) -> Option<Subsystem> {
        self.extraction
            .facility_load_field
            .as_deref()
            .and_then(Subsystem::from_name)
    }

    /// Resolved chart field, falling back to `ArbiterPower`.
    pub fn chart_field(&self) -> Subsystem {
        Subsystem::from_name(&self.output.chart_field).unwrap_or(Subsystem::ArbiterPower)
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let known = || Subsystem::names().collect::<Vec<_>>().join(", ");

        let i = &self.input;
        for (field, value) in [
            ("input.api_responses_dir", &i.api_responses_dir),
            ("input.synthetic_dir", &i.synthetic_dir),
            ("input.load_pattern", &i.load_pattern),
            ("input.solar_pattern", &i.solar_pattern),
        ] {
            if value.is_empty() {
                errors.push(ConfigError {
                    field: field.into(),
                    message: "must not be empty".into(),
                });
            }
        }
        if !i.load_pattern.is_empty() && i.load_pattern == i.solar_pattern {
            errors.push(ConfigError {
                field: "input.solar_pattern".into(),
                message: "must differ from input.load_pattern".into(),
            });
        }

        if !(-23..=23).contains(&self.alignment.utc_offset_hours) {
            errors.push(ConfigError {
                field: "alignment.utc_offset_hours".into(),
                message: "must be in [-23, 23]".into(),
            });
        }

        if let Some(name) = &self.extraction.facility_load_field {
            if Subsystem::from_name(name).is_none() {
                errors.push(ConfigError {
                    field: "extraction.facility_load_field".into(),
                    message: format!("unknown subsystem \"{name}\", expected one of: {}", known()),
                });
            }
        }

        let o = &self.output;
        for (field, value) in [
            ("output.extracted_csv", &o.extracted_csv),
            ("output.joined_csv", &o.joined_csv),
            ("output.chart", &o.chart),
        ] {
            if value.is_empty() {
                errors.push(ConfigError {
                    field: field.into(),
                    message: "must not be empty".into(),
                });
            }
        }
        if o.extracted_csv == o.joined_csv {
            errors.push(ConfigError {
                field: "output.joined_csv".into(),
                message: "must differ from output.extracted_csv".into(),
            });
        }
        if Subsystem::from_name(&o.chart_field).is_none() {
            errors.push(ConfigError {
                field: "output.chart_field".into(),
                message: format!(
                    "unknown subsystem \"{}\", expected one of: {}",
                    o.chart_field,
                    known()
                ),
            });
        }

        errors
    }
}
