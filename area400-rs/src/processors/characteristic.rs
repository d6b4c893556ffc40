//! Valve characteristic curves: flow percentage against stem opening.

use std::path::Path;

use anyhow::{Context, Result};

use crate::config::AnalysisConfig;
use crate::core::channels::{Meter, Valve};
use crate::core::loaders::{load_loop_data, LoopData};
use crate::core::transforms::{avg_flowrates, flow_percent, summarize, BucketAverage};
use crate::core::writers::{write_buckets_csv, write_series_csv};
use crate::visualization::{self, ChartLabels, Series};

use super::export_path;

/// Flow percentage of one meter against the stem opening of one valve.
#[derive(Debug, Clone)]
pub struct CharacteristicCurve {
    pub valve: Valve,
    pub meter: Meter,
    /// Stem opening (%), one entry per sample.
    pub stem: Vec<f64>,
    /// Flow as a percentage of the run maximum, one entry per sample.
    pub flow_pct: Vec<f64>,
    /// Flow percentage averaged per stem-opening bucket.
    pub buckets: Vec<BucketAverage>,
    /// The flow reading that maps to 100 %.
    pub max_flow_gpm: f64,
}

/// Build the characteristic curve of `valve` as seen by `meter`.
pub fn characteristic_curve(
    data: &LoopData,
    valve: Valve,
    meter: Meter,
    bucket_width: f64,
) -> Result<CharacteristicCurve> {
    let flow = data.flow(meter);
    let stem = data.valve(valve).to_vec();

    let flow_pct = flow_percent(flow).with_context(|| format!("{} has no usable flow", meter))?;
    let buckets = avg_flowrates(&stem, &flow_pct, bucket_width)?;

    Ok(CharacteristicCurve {
        valve,
        meter,
        stem,
        flow_pct,
        buckets,
        max_flow_gpm: summarize(flow).max,
    })
}

/// Load `input`, build the characteristic curve and chart it to `output`.
///
/// With `export_csv`, the per-sample curve and the bucket averages are
/// written next to the chart as `<chart>_points.csv` and `<chart>_buckets.csv`.
pub fn run_characteristic(
    input: &Path,
    output: &Path,
    valve: Valve,
    meter: Meter,
    export_csv: bool,
    config: &AnalysisConfig,
) -> Result<CharacteristicCurve> {
    let data = load_loop_data(input, config)
        .with_context(|| format!("Failed to load run: {}", input.display()))?;

    let curve = characteristic_curve(&data, valve, meter, config.plot.bucket_width)?;

    log::info!(
        "{}: {} vs {}, {} samples, {} buckets, max flow {:.3} GPM",
        input.display(),
        meter,
        valve,
        curve.stem.len(),
        curve.buckets.len(),
        curve.max_flow_gpm
    );

    let labels = ChartLabels::new(
        format!("{} characteristic ({})", valve, meter),
        "Stem Opening (%)",
        "Flow %",
    );
    let series = [Series::new(meter.tag(), curve.stem.clone(), curve.flow_pct.clone())];

    visualization::plot_error_bars(output, &series, &curve.buckets, &labels, &config.plot)
        .with_context(|| format!("Failed to plot {}", output.display()))?;

    if export_csv {
        let points = export_path(output, "points");
        write_series_csv(&points, &["stem_pct", "flow_pct"], &[curve.stem.as_slice(), curve.flow_pct.as_slice()])?;
        write_buckets_csv(&export_path(output, "buckets"), &curve.buckets)?;
        log::info!("Exported curve -> {}", points.display());
    }

    Ok(curve)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loaders::test_support::*;
    use crate::core::loaders::{extract_loop_data, SensorTable};
    use crate::config::TemperatureUnit;
    use tempfile::TempDir;

    fn sweep_data() -> LoopData {
        // Columns in the default layout; FIT-400B = stem / 5
        let rows: Vec<Vec<f64>> = (1..=5)
            .map(|i| {
                let stem = i as f64 * 10.0;
                let mut row = vec![f64::NAN; 15];
                row[2] = stem;
                row[6] = 0.0;
                row[11] = 1.0;
                row[12] = stem / 5.0;
                row[13] = 1.0;
                row[14] = 1.0;
                row
            })
            .collect();
        let table = SensorTable::from_rows(Vec::new(), &rows);
        extract_loop_data(&table, &AnalysisConfig::default().columns, TemperatureUnit::Celsius).unwrap()
    }

    #[test]
    fn test_characteristic_curve_percentages() {
        let curve = characteristic_curve(&sweep_data(), Valve::B, Meter::B, 10.0).unwrap();

        assert_eq!(curve.stem, vec![10.0, 20.0, 30.0, 40.0, 50.0]);
        assert_eq!(curve.flow_pct, vec![20.0, 40.0, 60.0, 80.0, 100.0]);
        assert_eq!(curve.max_flow_gpm, 10.0);
        assert_eq!(curve.buckets.len(), 5);
        assert_eq!(curve.buckets[4].mean, 100.0);
    }

    #[test]
    fn test_characteristic_curve_without_flow_fails() {
        let mut data = sweep_data();
        data.flows.insert(Meter::C, vec![0.0; 5]);

        let result = characteristic_curve(&data, Valve::B, Meter::C, 5.0);
        assert!(result.is_err());
    }

    #[test]
    fn test_run_characteristic_writes_chart_and_exports() {
        let temp_dir = TempDir::new().unwrap();
        let input = write_run_csv(temp_dir.path(), "AREA400-2025-04-30_FIC-400B_Obj2_Rep1.csv", &sweep_rows());
        let output = temp_dir.path().join("charts").join("curve.png");

        let mut config = AnalysisConfig::default();
        config.plot.width = 320;
        config.plot.height = 240;

        let curve = run_characteristic(&input, &output, Valve::B, Meter::B, true, &config).unwrap();

        assert_eq!(curve.flow_pct.last().copied(), Some(100.0));
        assert!(output.exists());
        assert!(temp_dir.path().join("charts").join("curve_points.csv").exists());
        assert!(temp_dir.path().join("charts").join("curve_buckets.csv").exists());
    }

    #[test]
    fn test_run_characteristic_missing_input() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("curve.png");

        let result = run_characteristic(
            &temp_dir.path().join("missing.csv"),
            &output,
            Valve::B,
            Meter::B,
            false,
            &AnalysisConfig::default(),
        );

        assert!(result.is_err());
        assert!(!output.exists());
    }
}
