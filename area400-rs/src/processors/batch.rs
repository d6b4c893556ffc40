//! Batch analysis over a directory of run exports.
//!
//! Historian exports are named after the run, e.g.
//! `AREA400-2025-04-30_FIC-400B_Obj2_Rep1.csv` or `AREA400-4-9-2025_Test1.csv`.
//! A valve tag in the name overrides the default valve for that run.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::Result;
use clap::ValueEnum;
use rayon::prelude::*;
use regex::Regex;
use thiserror::Error;

use crate::config::AnalysisConfig;
use crate::core::channels::{Meter, Valve};

use super::{characteristic, residual, reynolds};

/// Errors that can occur while collecting a batch.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("No run CSVs found in {0}")]
    NoRunsFound(PathBuf),
}

/// Analysis applied to every run of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BatchAnalysis {
    Characteristic,
    Residual,
    Reynolds,
}

impl BatchAnalysis {
    fn suffix(self) -> &'static str {
        match self {
            BatchAnalysis::Characteristic => "characteristic",
            BatchAnalysis::Residual => "residual",
            BatchAnalysis::Reynolds => "reynolds",
        }
    }
}

/// Instruments used when a run name does not say otherwise.
#[derive(Debug, Clone, Copy)]
pub struct BatchDefaults {
    pub valve: Valve,
    pub meter: Meter,
    pub reference: Meter,
    pub export_csv: bool,
}

/// Metadata parsed from a run file name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunInfo {
    pub date: Option<String>,
    pub valve: Option<Valve>,
    pub objective: Option<u32>,
    /// `RepN` or `TestN`.
    pub repetition: Option<u32>,
}

/// Result of one run in a batch.
#[derive(Debug)]
pub struct BatchOutcome {
    pub input: PathBuf,
    pub output: PathBuf,
    pub info: RunInfo,
    pub valve: Valve,
    /// Number of samples analyzed, or the error message.
    pub result: std::result::Result<usize, String>,
}

fn run_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)^AREA400-(?P<date>\d+(?:-\d+)*)(?:_(?P<valve>FIC-400[BC]))?(?:_Obj(?P<objective>\d+))?(?:_(?:Rep|Test)(?P<repetition>\d+))?",
        )
        .expect("run name pattern is valid")
    })
}

/// Parse run metadata from a file name; unknown names give an empty [`RunInfo`].
pub fn parse_run_name(path: &Path) -> RunInfo {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    let Some(captures) = run_name_pattern().captures(stem) else {
        return RunInfo::default();
    };

    let number = |name: &str| captures.name(name).and_then(|m| m.as_str().parse().ok());

    RunInfo {
        date: captures.name("date").map(|m| m.as_str().to_string()),
        valve: captures.name("valve").and_then(|m| Valve::from_tag(m.as_str())),
        objective: number("objective"),
        repetition: number("repetition"),
    }
}

/// List the CSV files directly inside `directory`, sorted by name.
pub fn find_runs(directory: &Path) -> Result<Vec<PathBuf>> {
    if !directory.is_dir() {
        return Err(BatchError::DirectoryNotFound(directory.to_path_buf()).into());
    }

    let mut csv_files: Vec<PathBuf> = fs::read_dir(directory)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("csv"))
                    .unwrap_or(false)
        })
        .collect();

    csv_files.sort();
    Ok(csv_files)
}

/// Run `analysis` over every run CSV in `input_dir` in parallel.
///
/// Charts land in `output_dir` as `<run>_<analysis>.png`. A failing run is
/// logged and reported in its [`BatchOutcome`]; it does not stop the batch.
pub fn run_batch(
    input_dir: &Path,
    output_dir: &Path,
    analysis: BatchAnalysis,
    defaults: BatchDefaults,
    config: &AnalysisConfig,
) -> Result<Vec<BatchOutcome>> {
    let runs = find_runs(input_dir)?;
    if runs.is_empty() {
        return Err(BatchError::NoRunsFound(input_dir.to_path_buf()).into());
    }

    log::info!("Batch {:?} over {} runs in {}", analysis, runs.len(), input_dir.display());

    let outcomes = runs
        .par_iter()
        .map(|input| {
            let info = parse_run_name(input);
            let valve = info.valve.unwrap_or(defaults.valve);
            let stem = input
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            let output = output_dir.join(format!("{}_{}.png", stem, analysis.suffix()));

            let result = match analysis {
                BatchAnalysis::Characteristic => characteristic::run_characteristic(
                    input,
                    &output,
                    valve,
                    defaults.meter,
                    defaults.export_csv,
                    config,
                )
                .map(|curve| curve.stem.len()),
                BatchAnalysis::Residual => residual::run_residual(
                    input,
                    &output,
                    defaults.reference,
                    &[],
                    valve,
                    defaults.export_csv,
                    config,
                )
                .map(|r| r.stem.len()),
                BatchAnalysis::Reynolds => reynolds::run_reynolds(
                    input,
                    &output,
                    defaults.meter,
                    valve,
                    defaults.export_csv,
                    config,
                )
                .map(|r| r.reynolds.len()),
            };

            let result = result.map_err(|e| {
                log::error!("{}: {:#}", input.display(), e);
                format!("{:#}", e)
            });

            BatchOutcome {
                input: input.clone(),
                output,
                info,
                valve,
                result,
            }
        })
        .collect();

    Ok(outcomes)
}
