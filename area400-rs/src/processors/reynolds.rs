//! Reynolds numbers of the metered flow against stem opening.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::AnalysisConfig;
use crate::core::channels::{Meter, Valve};
use crate::core::loaders::{load_loop_data, LoopData};
use crate::core::transforms::{avg_flowrates, reynolds_series, summarize, BucketAverage, ChannelSummary};
use crate::core::writers::{write_buckets_csv, write_series_csv};
use crate::visualization::{self, ChartLabels, Series};

use super::export_path;

/// Upper Reynolds number of laminar pipe flow.
pub const LAMINAR_LIMIT: f64 = 2300.0;

/// Lower Reynolds number of fully turbulent pipe flow.
pub const TURBULENT_LIMIT: f64 = 4000.0;

/// Pipe flow regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FlowRegime {
    Laminar,
    Transitional,
    Turbulent,
}

impl FlowRegime {
    /// Classify a Reynolds number; `None` if it is not finite.
    pub fn classify(re: f64) -> Option<Self> {
        if !re.is_finite() {
            None
        } else if re < LAMINAR_LIMIT {
            Some(FlowRegime::Laminar)
        } else if re <= TURBULENT_LIMIT {
            Some(FlowRegime::Transitional)
        } else {
            Some(FlowRegime::Turbulent)
        }
    }
}

impl fmt::Display for FlowRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FlowRegime::Laminar => "laminar",
            FlowRegime::Transitional => "transitional",
            FlowRegime::Turbulent => "turbulent",
        };
        f.write_str(name)
    }
}

/// Per-sample Reynolds numbers of one meter.
#[derive(Debug, Clone)]
pub struct ReynoldsAnalysis {
    pub meter: Meter,
    pub valve: Valve,
    pub stem: Vec<f64>,
    pub reynolds: Vec<f64>,
    pub buckets: Vec<BucketAverage>,
    pub summary: ChannelSummary,
    /// Number of samples in each regime.
    pub regimes: BTreeMap<FlowRegime, usize>,
    /// Whether a measured temperature was used (otherwise the configured default).
    pub measured_temperature: bool,
}

/// Compute Reynolds numbers of `meter`'s flow, bucketed by `valve` stem opening.
pub fn reynolds_analysis(
    data: &LoopData,
    meter: Meter,
    valve: Valve,
    config: &AnalysisConfig,
) -> Result<ReynoldsAnalysis> {
    let stem = data.valve(valve).to_vec();
    let temperature = data.temperature_c.as_deref();

    let reynolds = reynolds_series(data.flow(meter), temperature, &config.fluid)
        .with_context(|| format!("Reynolds numbers for {}", meter))?;
    let buckets = avg_flowrates(&stem, &reynolds, config.plot.bucket_width)?;
    let summary = summarize(&reynolds);

    let mut regimes = BTreeMap::new();
    for regime in reynolds.iter().filter_map(|&re| FlowRegime::classify(re)) {
        *regimes.entry(regime).or_insert(0) += 1;
    }

    Ok(ReynoldsAnalysis {
        meter,
        valve,
        stem,
        reynolds,
        buckets,
        summary,
        regimes,
        measured_temperature: temperature.is_some(),
    })
}

/// Load `input`, compute Reynolds numbers and chart them against stem opening.
pub fn run_reynolds(
    input: &Path,
    output: &Path,
    meter: Meter,
    valve: Valve,
    export_csv: bool,
    config: &AnalysisConfig,
) -> Result<ReynoldsAnalysis> {
    let data = load_loop_data(input, config)
        .with_context(|| format!("Failed to load run: {}", input.display()))?;

    if data.temperature_c.is_none() {
        log::warn!(
            "No temperature column mapped; using {} °C for every sample",
            config.fluid.default_temperature_c
        );
    }

    let analysis = reynolds_analysis(&data, meter, valve, config)?;

    log::info!(
        "{}: Re range [{:.0}, {:.0}], regimes {:?}",
        meter,
        analysis.summary.min,
        analysis.summary.max,
        analysis.regimes
    );

    let labels = ChartLabels::new(
        format!("Reynolds number of {} vs {}", meter, valve),
        "Stem Opening (%)",
        "Reynolds number",
    );
    let series = [Series::new(meter.tag(), analysis.stem.clone(), analysis.reynolds.clone())];

    visualization::plot_error_bars(output, &series, &analysis.buckets, &labels, &config.plot)
        .with_context(|| format!("Failed to plot {}", output.display()))?;

    if export_csv {
        let flow = data.flow(meter);
        let points = export_path(output, "points");
        write_series_csv(
            &points,
            &["stem_pct", "flow_gpm", "reynolds"],
            &[analysis.stem.as_slice(), flow, analysis.reynolds.as_slice()],
        )?;
        write_buckets_csv(&export_path(output, "buckets"), &analysis.buckets)?;
        log::info!("Exported Reynolds numbers -> {}", points.display());
    }

    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TemperatureUnit;
    use crate::core::loaders::test_support::*;
    use crate::core::transforms::reynolds_number;
    use tempfile::TempDir;

    #[test]
    fn test_classify_regimes() {
        assert_eq!(FlowRegime::classify(0.0), Some(FlowRegime::Laminar));
        assert_eq!(FlowRegime::classify(2299.9), Some(FlowRegime::Laminar));
        assert_eq!(FlowRegime::classify(2300.0), Some(FlowRegime::Transitional));
        assert_eq!(FlowRegime::classify(4000.0), Some(FlowRegime::Transitional));
        assert_eq!(FlowRegime::classify(4000.1), Some(FlowRegime::Turbulent));
        assert_eq!(FlowRegime::classify(f64::NAN), None);
    }

    #[test]
    fn test_run_reynolds_with_measured_temperature() {
        let temp_dir = TempDir::new().unwrap();
        let input = write_run_csv(temp_dir.path(), "run.csv", &sweep_rows());
        let output = temp_dir.path().join("reynolds.png");

        let mut config = AnalysisConfig::default();
        config.columns.temperature = Some(15);
        config.plot.width = 320;
        config.plot.height = 240;

        let analysis = run_reynolds(&input, &output, Meter::B, Valve::B, true, &config).unwrap();

        // 68 °F -> 20 °C row; FIT-400B reads 2..10 GPM
        let water_20c = config.fluid.properties[4];
        let expected = reynolds_number(10.0, &water_20c, config.fluid.pipe_inner_diameter_m);
        assert!((analysis.reynolds[4] - expected).abs() < 1e-6);
        assert!(analysis.measured_temperature);
        assert_eq!(analysis.regimes.values().sum::<usize>(), 5);
        assert_eq!(analysis.regimes.get(&FlowRegime::Turbulent), Some(&5));

        assert!(output.exists());
        assert!(temp_dir.path().join("reynolds_points.csv").exists());
        assert!(temp_dir.path().join("reynolds_buckets.csv").exists());
    }

    #[test]
    fn test_reynolds_analysis_default_temperature() {
        let temp_dir = TempDir::new().unwrap();
        let input = write_run_csv(temp_dir.path(), "run.csv", &sweep_rows());

        let mut config = AnalysisConfig::default();
        config.fluid.default_temperature_c = 60.0;

        let data = load_loop_data(&input, &config).unwrap();
        let analysis = reynolds_analysis(&data, Meter::B, Valve::B, &config).unwrap();

        let water_60c = config.fluid.properties[11];
        assert_eq!(water_60c.temperature_c, 60.0);
        let expected = reynolds_number(2.0, &water_60c, config.fluid.pipe_inner_diameter_m);
        assert!((analysis.reynolds[0] - expected).abs() < 1e-6);
        assert!(!analysis.measured_temperature);
    }

    #[test]
    fn test_default_temperature_ignores_column_unit() {
        let temp_dir = TempDir::new().unwrap();
        let input = write_run_csv(temp_dir.path(), "run.csv", &sweep_rows());

        let mut config = AnalysisConfig::default();
        config.fluid.temperature_unit = TemperatureUnit::Celsius;

        let data = load_loop_data(&input, &config).unwrap();
        let analysis = reynolds_analysis(&data, Meter::B, Valve::B, &config).unwrap();

        let water_20c = config.fluid.properties[4];
        assert_eq!(water_20c.temperature_c, 20.0);
        let expected = reynolds_number(2.0, &water_20c, config.fluid.pipe_inner_diameter_m);
        assert!((analysis.reynolds[0] - expected).abs() < 1e-6);
    }
}
