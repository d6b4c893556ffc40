//! Analysis routines.
//!
//! Each routine follows the same shape: load a run CSV, extract the
//! channels it needs, compute a derived quantity and chart it.

pub mod batch;
pub mod characteristic;
pub mod inspect;
pub mod residual;
pub mod reynolds;

use std::path::{Path, PathBuf};

// Re-export key types for convenience
pub use batch::{find_runs, parse_run_name, run_batch, BatchAnalysis, BatchDefaults, BatchOutcome, RunInfo};
pub use characteristic::{characteristic_curve, run_characteristic, CharacteristicCurve};
pub use inspect::{inspect_run, ChannelReport, RunInspection};
pub use residual::{meter_residuals, run_residual, MeterResidual, ResidualAnalysis};
pub use reynolds::{reynolds_analysis, run_reynolds, FlowRegime, ReynoldsAnalysis};

/// Default chart path for `input`: `<dir>/<stem>_<suffix>.png`.
pub fn default_output(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "run".to_string());
    input.with_file_name(format!("{}_{}.png", stem, suffix))
}

/// Path next to `chart` with `_<suffix>.csv` appended to its stem.
pub fn export_path(chart: &Path, suffix: &str) -> PathBuf {
    let stem = chart
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "chart".to_string());
    chart.with_file_name(format!("{}_{}.csv", stem, suffix))
}
