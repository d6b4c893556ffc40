//! Meter residuals: each flow meter's reading minus a reference meter's.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::AnalysisConfig;
use crate::core::channels::{Meter, Valve};
use crate::core::loaders::{load_loop_data, LoopData};
use crate::core::transforms::{avg_flowrates, residuals, summarize, BucketAverage, ChannelSummary};
use crate::core::writers::{write_buckets_csv, write_series_csv};
use crate::visualization::{self, ChartLabels, Series};

use super::export_path;

/// Residual series of one candidate meter.
#[derive(Debug, Clone)]
pub struct MeterResidual {
    pub meter: Meter,
    /// Candidate minus reference (GPM), one entry per sample.
    pub residual: Vec<f64>,
    /// Residual averaged per stem-opening bucket.
    pub buckets: Vec<BucketAverage>,
    pub summary: ChannelSummary,
}

/// Residuals of the candidate meters against one reference meter.
#[derive(Debug, Clone)]
pub struct ResidualAnalysis {
    pub reference: Meter,
    pub valve: Valve,
    /// Stem opening (%) the residuals are plotted against.
    pub stem: Vec<f64>,
    pub meters: Vec<MeterResidual>,
}

impl ResidualAnalysis {
    /// Residual of `meter`, if it was a candidate.
    pub fn get(&self, meter: Meter) -> Option<&MeterResidual> {
        self.meters.iter().find(|m| m.meter == meter)
    }
}

/// Compute residuals of `candidates` against `reference`.
///
/// An empty candidate list means every meter except the reference.
/// The reference itself is never a candidate, and repeated candidates
/// are analyzed once, in tag order.
pub fn meter_residuals(
    data: &LoopData,
    reference: Meter,
    candidates: &[Meter],
    valve: Valve,
    bucket_width: f64,
) -> Result<ResidualAnalysis> {
    let stem = data.valve(valve).to_vec();
    let reference_flow = data.flow(reference);

    let candidates: BTreeSet<Meter> = if candidates.is_empty() {
        reference.others().collect()
    } else {
        candidates.iter().copied().filter(|&m| m != reference).collect()
    };

    let mut meters = Vec::with_capacity(candidates.len());
    for meter in candidates {
        let residual = residuals(data.flow(meter), reference_flow)
            .with_context(|| format!("{} vs {}", meter, reference))?;
        let buckets = avg_flowrates(&stem, &residual, bucket_width)?;
        let summary = summarize(&residual);

        meters.push(MeterResidual {
            meter,
            residual,
            buckets,
            summary,
        });
    }

    Ok(ResidualAnalysis {
        reference,
        valve,
        stem,
        meters,
    })
}

/// Load `input`, compute residuals and chart them against stem opening.
///
/// With a single candidate the chart carries that meter's bucket error bars;
/// with several, one scatter series per meter.
pub fn run_residual(
    input: &Path,
    output: &Path,
    reference: Meter,
    candidates: &[Meter],
    valve: Valve,
    export_csv: bool,
    config: &AnalysisConfig,
) -> Result<ResidualAnalysis> {
    let data = load_loop_data(input, config)
        .with_context(|| format!("Failed to load run: {}", input.display()))?;

    let analysis = meter_residuals(&data, reference, candidates, valve, config.plot.bucket_width)?;
    if analysis.meters.is_empty() {
        anyhow::bail!("No candidate meters left after excluding reference {}", reference);
    }

    for m in &analysis.meters {
        log::info!(
            "{} - {}: mean {:.4} GPM, range [{:.4}, {:.4}] over {} samples",
            m.meter,
            reference,
            m.summary.mean,
            m.summary.min,
            m.summary.max,
            m.summary.finite
        );
    }

    let labels = ChartLabels::new(
        format!("Residual flow vs {} ({})", reference, valve),
        "Stem Opening (%)",
        "Residual (GPM)",
    );
    let series: Vec<Series> = analysis
        .meters
        .iter()
        .map(|m| Series::new(format!("{} - {}", m.meter, reference), analysis.stem.clone(), m.residual.clone()))
        .collect();

    let plotted = match analysis.meters.as_slice() {
        [single] => visualization::plot_error_bars(output, &series, &single.buckets, &labels, &config.plot),
        _ => visualization::plot_scatter(output, &series, &labels, &config.plot),
    };
    plotted.with_context(|| format!("Failed to plot {}", output.display()))?;

    if export_csv {
        let headers: Vec<String> = std::iter::once("stem_pct".to_string())
            .chain(analysis.meters.iter().map(|m| format!("{}_minus_{}", m.meter, reference)))
            .collect();
        let header_refs: Vec<&str> = headers.iter().map(String::as_str).collect();

        let mut columns: Vec<&[f64]> = vec![analysis.stem.as_slice()];
        columns.extend(analysis.meters.iter().map(|m| m.residual.as_slice()));

        let points = export_path(output, "points");
        write_series_csv(&points, &header_refs, &columns)?;

        for m in &analysis.meters {
            let suffix = format!("buckets_{}", m.meter.tag().to_lowercase());
            write_buckets_csv(&export_path(output, &suffix), &m.buckets)?;
        }
        log::info!("Exported residuals -> {}", points.display());
    }

    Ok(analysis)
}
