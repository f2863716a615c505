//! SVG chart with four panels: synthetic inputs, a facility load candidate,
//! battery capacity with the charge/discharge indicator, and grid averages.

use std::fmt::Display;
use std::ops::Range;
use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::error::{ReconcileError, Result};
use crate::extract::{ApiSnapshot, Subsystem, charge_discharge_sign};
use crate::synthetic::SyntheticSample;

const SIZE: (u32, u32) = (1600, 1000);
const MINUTES_PER_DAY: f64 = 1440.0;

type Series = (&'static str, RGBColor, Vec<(f64, f64)>);

/// Data shown on the chart.
#[derive(Debug, Clone, Copy)]
pub struct ChartInput<'a> {
    pub synthetic: &'a [SyntheticSample],
    pub snapshots: &'a [ApiSnapshot],
    /// Subsystem drawn in the facility load panel.
    pub field: Subsystem,
}

fn plot_err(e: impl Display) -> ReconcileError {
    ReconcileError::Plot(e.to_string())
}

/// Renders the chart to an SVG file.
///
/// # Errors
///
/// Returns `Plot` if drawing or writing the file fails.
pub fn render_svg(input: &ChartInput<'_>, path: &Path) -> Result<()> {
    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    draw_panels(&root, input).map_err(plot_err)?;
    root.present().map_err(plot_err)
}

/// Renders the chart to an in-memory SVG document.
///
/// # Errors
///
/// Returns `Plot` if drawing fails.
pub fn render_svg_string(input: &ChartInput<'_>) -> Result<String> {
    let mut buf = String::new();
    {
        let root = SVGBackend::with_string(&mut buf, SIZE).into_drawing_area();
        draw_panels(&root, input).map_err(plot_err)?;
        root.present().map_err(plot_err)?;
    }
    Ok(buf)
}

fn draw_panels<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    input: &ChartInput<'_>,
) -> std::result::Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    root.fill(&WHITE)?;
    let panels = root.split_evenly((2, 2));

    let load: Vec<(f64, f64)> = input
        .synthetic
        .iter()
        .map(|s| (s.time_of_day.minutes_since_midnight(), s.load / 1000.0))
        .collect();
    let solar: Vec<(f64, f64)> = input
        .synthetic
        .iter()
        .map(|s| (s.time_of_day.minutes_since_midnight(), s.solar / 1000.0))
        .collect();
    draw_lines(
        &panels[0],
        "Synthetic inputs",
        "kW",
        &[
            ("Synthetic load", BLUE, load),
            ("Synthetic PV", RGBColor(230, 140, 0), solar),
        ],
    )?;

    let field_title = format!("{} over time", input.field);
    draw_lines(
        &panels[1],
        &field_title,
        "W",
        &[("Reported", RGBColor(200, 0, 100), snapshot_series(input.snapshots, input.field))],
    )?;

    draw_battery(&panels[2], input.snapshots)?;

    draw_lines(
        &panels[3],
        "Grid measurements",
        "W",
        &[
            ("MaxAvgGrid", RGBColor(34, 139, 34), snapshot_series(input.snapshots, Subsystem::MaxAvgGrid)),
            (
                "15MinGridAverager",
                RGBColor(30, 144, 255),
                snapshot_series(input.snapshots, Subsystem::GridAverager15Min),
            ),
        ],
    )?;
    Ok(())
}

/// Numeric points of one subsystem; non-numeric cells are skipped.
fn snapshot_series(snapshots: &[ApiSnapshot], field: Subsystem) -> Vec<(f64, f64)> {
    snapshots
        .iter()
        .filter_map(|s| {
            s.field(field)
                .as_f64()
                .map(|v| (s.key().minutes_since_midnight(), v))
        })
        .collect()
}

fn fmt_minutes(m: &f64) -> String {
    let total = m.rem_euclid(MINUTES_PER_DAY).floor() as u32;
    format!("{:02}:{:02}", total / 60, total % 60)
}

fn x_range(series: &[&[(f64, f64)]]) -> Range<f64> {
    padded(series.iter().flat_map(|s| s.iter().map(|p| p.0)), 0.0..MINUTES_PER_DAY)
}

fn y_range(series: &[&[(f64, f64)]]) -> Range<f64> {
    padded(series.iter().flat_map(|s| s.iter().map(|p| p.1)), 0.0..1.0)
}

fn padded(values: impl Iterator<Item = f64>, empty: Range<f64>) -> Range<f64> {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if lo > hi {
        return empty;
    }
    let pad = if hi > lo { (hi - lo) * 0.05 } else { 1.0 };
    (lo - pad)..(hi + pad)
}

fn draw_lines<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    title: &str,
    y_desc: &str,
    series: &[Series],
) -> std::result::Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let points: Vec<&[(f64, f64)]> = series.iter().map(|s| s.2.as_slice()).collect();
    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(70)
        .build_cartesian_2d(x_range(&points), y_range(&points))?;

    chart
        .configure_mesh()
        .x_desc("UTC time of day")
        .y_desc(y_desc)
        .x_label_formatter(&fmt_minutes)
        .draw()?;

    for (label, color, data) in series {
        let color = *color;
        chart
            .draw_series(LineSeries::new(data.iter().copied(), &color))?
            .label(*label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &color));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    Ok(())
}

fn draw_battery<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    snapshots: &[ApiSnapshot],
) -> std::result::Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    let capacity = snapshot_series(snapshots, Subsystem::Distributer1);
    let sign: Vec<(f64, f64)> = snapshots
        .iter()
        .filter_map(|s| {
            charge_discharge_sign(s.field(Subsystem::ChargeDischargeCounter))
                .map(|sign| (s.key().minutes_since_midnight(), f64::from(sign)))
        })
        .collect();

    let x = x_range(&[&capacity, &sign]);
    let mut chart = ChartBuilder::on(area)
        .caption("Battery capacity with charge/discharge signal", ("sans-serif", 20))
        .margin(10)
        .x_label_area_size(35)
        .y_label_area_size(70)
        .right_y_label_area_size(50)
        .build_cartesian_2d(x.clone(), y_range(&[&capacity]))?
        .set_secondary_coord(x, -1.5..1.5);

    chart
        .configure_mesh()
        .x_desc("UTC time of day")
        .y_desc("Wh")
        .x_label_formatter(&fmt_minutes)
        .draw()?;
    chart
        .configure_secondary_axes()
        .y_desc("charge / discharge")
        .draw()?;

    chart
        .draw_series(LineSeries::new(capacity, &BLUE))?
        .label("Available capacity")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));
    chart
        .draw_secondary_series(LineSeries::new(sign, &RED))?
        .label("Charge (+1) / discharge (-1)")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::TimeOfDayKey;
    use crate::extract::ResponseExtractor;
    use chrono::NaiveTime;
    use serde_json::json;

    fn snapshot(ts: &str, capacity: f64, counter: (u8, u8)) -> ApiSnapshot {
        let body = json!({
            "timestamp": ts,
            "api_response": {
                "Timestamp": ts,
                "Distributer1": {"AvailableCapacityWattHours": capacity},
                "ChargeDischargeCounter": {"C": counter.0, "D": counter.1},
                "ArbiterPower": {"SystemDirectorPowerRequest": 100},
                "MaxAvgGrid": {"MaxAverage": 4000},
                "15MinGridAverager": {"Averager": 3500}
            }
        });
        ResponseExtractor::default()
            .extract_str(Path::new("snap.json"), &body.to_string())
            .expect("snapshot should extract")
    }

    #[test]
    fn renders_all_panels() {
        let synthetic: Vec<SyntheticSample> = (0..5)
            .map(|m| SyntheticSample {
                time_of_day: TimeOfDayKey::new(
                    NaiveTime::from_hms_opt(9, 30 + m, 0).expect("valid time"),
                ),
                load: 2_000_000.0 + f64::from(m),
                solar: 500.0,
            })
            .collect();
        let snapshots = vec![
            snapshot("2023-05-02T09:31:10Z", 50_000.0, (1, 0)),
            snapshot("2023-05-02T09:32:10Z", 50_500.0, (0, 1)),
        ];
        let svg = render_svg_string(&ChartInput {
            synthetic: &synthetic,
            snapshots: &snapshots,
            field: Subsystem::ArbiterPower,
        })
        .expect("chart should render");

        assert!(svg.contains("<svg"));
        assert!(svg.contains("Synthetic inputs"));
        assert!(svg.contains("ArbiterPower over time"));
        assert!(svg.contains("Grid measurements"));
    }

    #[test]
    fn renders_with_no_data() {
        let svg = render_svg_string(&ChartInput {
            synthetic: &[],
            snapshots: &[],
            field: Subsystem::PvMeter,
        })
        .expect("empty chart should render");
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn minute_labels() {
        assert_eq!(fmt_minutes(&0.0), "00:00");
        assert_eq!(fmt_minutes(&576.4), "09:36");
        assert_eq!(fmt_minutes(&1445.0), "00:05");
    }

    #[test]
    fn ranges_pad_and_fall_back() {
        assert_eq!(padded(std::iter::empty(), 0.0..1.0), 0.0..1.0);
        assert_eq!(padded([5.0].into_iter(), 0.0..1.0), 4.0..6.0);
        let r = padded([0.0, 100.0].into_iter(), 0.0..1.0);
        assert!(r.start < 0.0 && r.end > 100.0);
    }
}
