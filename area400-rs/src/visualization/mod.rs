//! Chart rendering for flow loop analyses.
//!
//! This module draws PNG scatter charts and scatter charts with bucket
//! error bars using the plotters library. Text (captions, axis labels,
//! legend) is only drawn once a font has been registered with
//! [`register_font_file`]; otherwise charts carry the data and grid only.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use plotters::prelude::*;
use plotters::style::FontStyle;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::config::PlotConfig;
use crate::core::transforms::{apply_stride, finite_pairs, BucketAverage};

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("Invalid font file: {0}")]
    InvalidFont(String),

    #[error("Nothing to plot: every series is empty")]
    EmptySeries,
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Color palette for series, in draw order.
const SERIES_COLORS: &[(u8, u8, u8)] = &[
    (55, 126, 184),  // Blue
    (228, 26, 28),   // Red
    (77, 175, 74),   // Green
    (152, 78, 163),  // Purple
    (255, 127, 0),   // Orange
    (166, 86, 40),   // Brown
    (247, 129, 191), // Pink
    (0, 206, 209),   // Turquoise
];

/// Error bar and bucket-mean line color.
const BUCKET_COLOR: (u8, u8, u8) = (30, 30, 30);

static TEXT_ENABLED: AtomicBool = AtomicBool::new(false);

/// One named set of (x, y) points.
#[derive(Debug, Clone, Default)]
pub struct Series {
    pub label: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

impl Series {
    pub fn new(label: impl Into<String>, x: Vec<f64>, y: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            x,
            y,
        }
    }
}

/// Caption and axis descriptions of a chart.
#[derive(Debug, Clone, Default)]
pub struct ChartLabels {
    pub title: String,
    pub x_desc: String,
    pub y_desc: String,
}

impl ChartLabels {
    pub fn new(title: impl Into<String>, x_desc: impl Into<String>, y_desc: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            x_desc: x_desc.into(),
            y_desc: y_desc.into(),
        }
    }
}

/// Load a TTF/OTF font file and use it for all chart text.
///
/// The font data lives for the rest of the process.
pub fn register_font_file(path: &Path) -> Result<()> {
    let bytes = std::fs::read(path)?;
    let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());

    plotters::style::register_font("sans-serif", FontStyle::Normal, bytes)
        .map_err(|_| VisualizationError::InvalidFont(format!("{}: not a TTF/OTF font", path.display())))?;

    TEXT_ENABLED.store(true, Ordering::Relaxed);
    log::info!("Chart font loaded from {}", path.display());
    Ok(())
}

fn text_enabled() -> bool {
    TEXT_ENABLED.load(Ordering::Relaxed)
}

fn series_color(index: usize) -> RGBColor {
    let c = SERIES_COLORS[index % SERIES_COLORS.len()];
    RGBColor(c.0, c.1, c.2)
}

fn plotting_error<E: std::fmt::Display>(e: E) -> VisualizationError {
    VisualizationError::PlottingError(e.to_string())
}

/// Drop non-finite pairs and subsample each series to `max_points`.
fn prepare_series(series: &[Series], max_points: usize) -> Vec<(String, Vec<f64>, Vec<f64>)> {
    series
        .iter()
        .map(|s| {
            let (x, y) = finite_pairs(&s.x, &s.y);
            let (x, y) = apply_stride(&x, &y, max_points);
            (s.label.clone(), x, y)
        })
        .collect()
}

/// Plot one or more point series as a scatter chart and save as PNG.
///
/// # Arguments
///
/// * `output_path` - Path to save the PNG image
/// * `series` - Point series, drawn in palette order
/// * `labels` - Caption and axis descriptions (drawn only with a registered font)
/// * `config` - Chart size, marker size and point limit
pub fn plot_scatter(
    output_path: &Path,
    series: &[Series],
    labels: &ChartLabels,
    config: &PlotConfig,
) -> Result<()> {
    plot_chart(output_path, series, &[], labels, config)
}

/// Plot point series plus bucket means with ±1 standard deviation error bars.
///
/// Bucket means are joined by a line so the averaged curve reads through
/// the raw scatter.
pub fn plot_error_bars(
    output_path: &Path,
    series: &[Series],
    buckets: &[BucketAverage],
    labels: &ChartLabels,
    config: &PlotConfig,
) -> Result<()> {
    plot_chart(output_path, series, buckets, labels, config)
}

fn plot_chart(
    output_path: &Path,
    series: &[Series],
    buckets: &[BucketAverage],
    labels: &ChartLabels,
    config: &PlotConfig,
) -> Result<()> {
    let prepared = prepare_series(series, config.max_points);

    let mut extents: Vec<(f64, f64)> = prepared
        .iter()
        .flat_map(|(_, x, y)| x.iter().copied().zip(y.iter().copied()))
        .collect();
    for b in buckets {
        extents.push((b.center, b.mean - b.std_dev));
        extents.push((b.center, b.mean + b.std_dev));
    }

    if extents.is_empty() {
        return Err(VisualizationError::EmptySeries);
    }

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let (x_min, x_max, y_min, y_max) = compute_bounds(&extents);
    let x_padding = (x_max - x_min) * 0.05;
    let y_padding = (y_max - y_min) * 0.05;

    let with_text = text_enabled();

    let root = BitMapBackend::new(output_path, (config.width, config.height)).into_drawing_area();
    root.fill(&WHITE).map_err(plotting_error)?;

    let mut builder = ChartBuilder::on(&root);
    builder.margin(20);
    if with_text {
        builder
            .caption(&labels.title, ("sans-serif", 28))
            .x_label_area_size(50)
            .y_label_area_size(70);
    }

    let mut chart = builder
        .build_cartesian_2d(
            (x_min - x_padding)..(x_max + x_padding),
            (y_min - y_padding)..(y_max + y_padding),
        )
        .map_err(plotting_error)?;

    {
        let mut mesh = chart.configure_mesh();
        mesh.light_line_style(RGBColor(235, 235, 235));
        if with_text {
            mesh.x_desc(labels.x_desc.as_str()).y_desc(labels.y_desc.as_str());
        }
        mesh.draw().map_err(plotting_error)?;
    }

    let radius = config.point_size as i32;
    for (i, (label, x, y)) in prepared.iter().enumerate() {
        let color = series_color(i);
        chart
            .draw_series(
                x.iter()
                    .zip(y.iter())
                    .map(|(&px, &py)| Circle::new((px, py), radius, color.mix(0.6).filled())),
            )
            .map_err(plotting_error)?
            .label(label.as_str())
            .legend(move |(lx, ly)| Circle::new((lx, ly), 4, color.filled()));
    }

    if !buckets.is_empty() {
        let bucket_color = RGBColor(BUCKET_COLOR.0, BUCKET_COLOR.1, BUCKET_COLOR.2);

        chart
            .draw_series(LineSeries::new(
                buckets.iter().map(|b| (b.center, b.mean)),
                bucket_color.stroke_width(2),
            ))
            .map_err(plotting_error)?
            .label("bucket mean ± 1σ")
            .legend(move |(lx, ly)| PathElement::new(vec![(lx - 8, ly), (lx + 8, ly)], bucket_color.stroke_width(2)));

        chart
            .draw_series(buckets.iter().map(|b| {
                ErrorBar::new_vertical(
                    b.center,
                    b.mean - b.std_dev,
                    b.mean,
                    b.mean + b.std_dev,
                    bucket_color.filled(),
                    10,
                )
            }))
            .map_err(plotting_error)?;
    }

    if with_text {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.85))
            .border_style(BLACK)
            .draw()
            .map_err(plotting_error)?;
    }

    root.present().map_err(plotting_error)?;

    log::debug!("Chart written to {}", output_path.display());
    Ok(())
}

/// Compute the bounds (min/max) for x and y coordinates.
fn compute_bounds(points: &[(f64, f64)]) -> (f64, f64, f64, f64) {
    let mut x_min = f64::MAX;
    let mut x_max = f64::MIN;
    let mut y_min = f64::MAX;
    let mut y_max = f64::MIN;

    for &(x, y) in points {
        if x < x_min { x_min = x; }
        if x > x_max { x_max = x; }
        if y < y_min { y_min = y; }
        if y > y_max { y_max = y; }
    }

    if (x_max - x_min).abs() < f64::EPSILON {
        x_min -= 1.0;
        x_max += 1.0;
    }
    if (y_max - y_min).abs() < f64::EPSILON {
        y_min -= 1.0;
        y_max += 1.0;
    }

    (x_min, x_max, y_min, y_max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn small_config() -> PlotConfig {
        PlotConfig {
            width: 320,
            height: 240,
            ..PlotConfig::default()
        }
    }

    #[test]
    fn test_compute_bounds() {
        let bounds = compute_bounds(&[(0.0, 5.0), (10.0, -5.0), (4.0, 1.0)]);
        assert_eq!(bounds, (0.0, 10.0, -5.0, 5.0));
    }

    #[test]
    fn test_compute_bounds_degenerate() {
        let bounds = compute_bounds(&[(3.0, 7.0)]);
        assert_eq!(bounds, (2.0, 4.0, 6.0, 8.0));
    }

    #[test]
    fn test_prepare_series_drops_nan_and_subsamples() {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let mut y = x.clone();
        y[1] = f64::NAN;

        let prepared = prepare_series(&[Series::new("s", x, y)], 3);
        let (_, px, py) = &prepared[0];
        // 9 finite pairs, stride 3
        assert_eq!(px.len(), 3);
        assert!(py.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_plot_scatter_writes_png() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("charts").join("scatter.png");
        let series = vec![
            Series::new("FIT-400B", vec![10.0, 20.0, 30.0], vec![20.0, 55.0, 100.0]),
            Series::new("FIT-400C", vec![10.0, 20.0, 30.0], vec![18.0, 50.0, 97.0]),
        ];

        plot_scatter(&path, &series, &ChartLabels::default(), &small_config()).unwrap();

        assert!(path.exists());
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn test_plot_error_bars_writes_png() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bars.png");
        let series = vec![Series::new("raw", vec![9.0, 11.0, 19.0, 21.0], vec![1.0, 3.0, 4.0, 6.0])];
        let buckets = vec![
            BucketAverage { center: 10.0, mean: 2.0, std_dev: 1.0, min: 1.0, max: 3.0, count: 2 },
            BucketAverage { center: 20.0, mean: 5.0, std_dev: 1.0, min: 4.0, max: 6.0, count: 2 },
        ];

        plot_error_bars(&path, &series, &buckets, &ChartLabels::default(), &small_config()).unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_plot_scatter_empty_series() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.png");
        let series = vec![Series::new("nan", vec![f64::NAN], vec![1.0])];

        let result = plot_scatter(&path, &series, &ChartLabels::default(), &small_config());

        assert!(matches!(result, Err(VisualizationError::EmptySeries)));
        assert!(!path.exists());
    }

    #[test]
    fn test_register_font_file_rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("not-a-font.ttf");
        std::fs::write(&path, b"definitely not a font").unwrap();

        let result = register_font_file(&path);

        match result {
            Err(VisualizationError::InvalidFont(msg)) => {
                assert!(msg.contains("not-a-font.ttf"));
                assert!(msg.ends_with("not a TTF/OTF font"));
            }
            other => panic!("Expected InvalidFont, got {:?}", other),
        }
        assert!(!text_enabled());
    }
}
