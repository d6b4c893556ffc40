//! Numeric transforms over flow loop channels.
//!
//! This module provides the derived quantities plotted by the analyses:
//! flow percentage, meter residuals, Reynolds numbers (with fluid
//! properties chosen by nearest temperature) and bucket averages of
//! readings grouped by valve stem opening.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use rayon::prelude::*;
use thiserror::Error;

use crate::config::{FluidConfig, FluidProperty};

/// One US gallon per minute in cubic meters per second.
pub const GPM_TO_M3_PER_S: f64 = 6.309_019_640e-5;

/// Errors that can occur while transforming channel data.
#[derive(Error, Debug, PartialEq)]
pub enum TransformError {
    #[error("series length mismatch: {left} vs {right} samples")]
    LengthMismatch { left: usize, right: usize },

    #[error("flow series has no positive finite maximum")]
    NoPositiveFlow,

    #[error("bucket width must be positive, got {0}")]
    InvalidBucketWidth(f64),

    #[error("fluid property table is empty")]
    EmptyPropertyTable,

    #[error("pipe inner diameter must be positive, got {0} m")]
    InvalidGeometry(f64),

    #[error("fluid property row at {temperature_c} °C needs positive density and viscosity")]
    InvalidProperty { temperature_c: f64 },
}

/// Result type for transform operations.
pub type Result<T> = std::result::Result<T, TransformError>;

fn check_lengths(left: &[f64], right: &[f64]) -> Result<()> {
    if left.len() != right.len() {
        return Err(TransformError::LengthMismatch {
            left: left.len(),
            right: right.len(),
        });
    }
    Ok(())
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Express each flow reading as a percentage of the series maximum.
///
/// The maximum is taken over finite values only; `NaN` readings stay `NaN`.
///
/// # Errors
///
/// Returns [`TransformError::NoPositiveFlow`] if no finite reading is positive.
pub fn flow_percent(flow: &[f64]) -> Result<Vec<f64>> {
    let max = flow
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);

    if !(max > 0.0) {
        return Err(TransformError::NoPositiveFlow);
    }

    Ok(flow.iter().map(|&v| v / max * 100.0).collect())
}

/// Element-wise `candidate - reference`.
pub fn residuals(candidate: &[f64], reference: &[f64]) -> Result<Vec<f64>> {
    check_lengths(candidate, reference)?;
    Ok(candidate
        .iter()
        .zip(reference)
        .map(|(&c, &r)| c - r)
        .collect())
}

/// Find the property row whose temperature is nearest to `temperature_c`.
///
/// Rows with a non-finite temperature are skipped. Ties resolve to the
/// earlier row. Returns `None` for an empty table or a non-finite temperature.
pub fn find_closest(table: &[FluidProperty], temperature_c: f64) -> Option<&FluidProperty> {
    if !temperature_c.is_finite() {
        return None;
    }

    let mut best: Option<(&FluidProperty, f64)> = None;
    for row in table.iter().filter(|r| r.temperature_c.is_finite()) {
        let distance = (row.temperature_c - temperature_c).abs();
        match best {
            Some((_, d)) if distance >= d => {}
            _ => best = Some((row, distance)),
        }
    }

    best.map(|(row, _)| row)
}

/// Reynolds number for `flow_gpm` through a pipe of `diameter_m`.
///
/// `Re = 4 ρ Q / (π D μ)` with `Q` in m³/s.
pub fn reynolds_number(flow_gpm: f64, property: &FluidProperty, diameter_m: f64) -> f64 {
    let q = flow_gpm * GPM_TO_M3_PER_S;
    4.0 * property.density_kg_m3 * q / (PI * diameter_m * property.viscosity_pa_s)
}

/// Reynolds number per sample.
///
/// Uses `temperature_c` per sample when given, otherwise the configured
/// default temperature for every sample. Samples with a non-finite flow or
/// temperature yield `NaN`.
///
/// # Errors
///
/// Returns an error if the property table is empty or has a row with a
/// non-positive density or viscosity, if the pipe diameter is not positive,
/// or if `temperature_c` differs in length from `flow_gpm`.
pub fn reynolds_series(
    flow_gpm: &[f64],
    temperature_c: Option<&[f64]>,
    fluid: &FluidConfig,
) -> Result<Vec<f64>> {
    if fluid.properties.is_empty() {
        return Err(TransformError::EmptyPropertyTable);
    }
    if let Some(row) = fluid
        .properties
        .iter()
        .find(|r| !is_positive(r.density_kg_m3) || !is_positive(r.viscosity_pa_s))
    {
        return Err(TransformError::InvalidProperty {
            temperature_c: row.temperature_c,
        });
    }

    let diameter = fluid.pipe_inner_diameter_m;
    if !is_positive(diameter) {
        return Err(TransformError::InvalidGeometry(diameter));
    }
    if let Some(temps) = temperature_c {
        check_lengths(flow_gpm, temps)?;
    }

    let default_c = fluid.default_temperature_c;

    let re = flow_gpm
        .par_iter()
        .enumerate()
        .map(|(i, &q)| {
            let t = temperature_c.map_or(default_c, |temps| temps[i]);
            match find_closest(&fluid.properties, t) {
                Some(property) if q.is_finite() => reynolds_number(q, property, diameter),
                _ => f64::NAN,
            }
        })
        .collect();

    Ok(re)
}

/// Mean and spread of the readings that fall in one valve-position bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketAverage {
    /// Bucket centre on the position axis.
    pub center: f64,
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

/// Group `value` readings by `position` into buckets of `bucket_width` and
/// average each bucket.
///
/// A reading lands in bucket `round(position / bucket_width)`, so bucket
/// centres are multiples of the width. Pairs with a non-finite member are
/// skipped. Buckets come back sorted by centre.
///
/// # Errors
///
/// Returns an error on mismatched lengths or a non-positive width.
pub fn avg_flowrates(position: &[f64], value: &[f64], bucket_width: f64) -> Result<Vec<BucketAverage>> {
    check_lengths(position, value)?;
    if !(bucket_width > 0.0) || !bucket_width.is_finite() {
        return Err(TransformError::InvalidBucketWidth(bucket_width));
    }

    let mut buckets: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
    for (&p, &v) in position.iter().zip(value) {
        if !p.is_finite() || !v.is_finite() {
            continue;
        }
        let key = (p / bucket_width).round() as i64;
        buckets.entry(key).or_default().push(v);
    }

    Ok(buckets
        .into_iter()
        .map(|(key, values)| {
            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let (min, max) = values
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));

            BucketAverage {
                center: key as f64 * bucket_width,
                mean,
                std_dev: variance.sqrt(),
                min,
                max,
                count: values.len(),
            }
        })
        .collect())
}

/// Summary statistics of one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelSummary {
    /// Number of samples, finite or not.
    pub samples: usize,
    /// Number of finite samples the statistics cover.
    pub finite: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// Count, min, max and mean over the finite values of `values`.
///
/// Statistics are `NaN` when no value is finite.
pub fn summarize(values: &[f64]) -> ChannelSummary {
    let mut finite = 0usize;
    let mut sum = 0.0;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;

    for &v in values.iter().filter(|v| v.is_finite()) {
        finite += 1;
        sum += v;
        min = min.min(v);
        max = max.max(v);
    }

    if finite == 0 {
        return ChannelSummary {
            samples: values.len(),
            finite,
            min: f64::NAN,
            max: f64::NAN,
            mean: f64::NAN,
        };
    }

    ChannelSummary {
        samples: values.len(),
        finite,
        min,
        max,
        mean: sum / finite as f64,
    }
}

/// Keep only the pairs where both `x` and `y` are finite.
pub fn finite_pairs(x: &[f64], y: &[f64]) -> (Vec<f64>, Vec<f64>) {
    x.iter()
        .zip(y)
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(&a, &b)| (a, b))
        .unzip()
}

/// Keep every Nth pair so that at most `max_points` remain.
///
/// Returns the inputs unchanged when they already fit.
pub fn apply_stride(x: &[f64], y: &[f64], max_points: usize) -> (Vec<f64>, Vec<f64>) {
    let n = x.len().min(y.len());
    if max_points == 0 || n <= max_points {
        return (x[..n].to_vec(), y[..n].to_vec());
    }

    let stride = (n + max_points - 1) / max_points;
    (0..n).step_by(stride).map(|i| (x[i], y[i])).unzip()
}
