//! Command-line interface for the AREA400 analysis.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::core::channels::{Meter, Valve};
use crate::processors::{self, BatchAnalysis, BatchDefaults, FlowRegime};
use crate::visualization;
use crate::AnalysisConfig;

#[derive(Parser)]
#[command(name = "area400")]
#[command(about = "AREA400 flow loop analysis: valve characteristics, meter residuals, Reynolds numbers", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize every mapped valve, flow and temperature channel of a run
    Inspect {
        /// Historian CSV export
        csv: PathBuf,
    },

    /// Plot flow percentage against valve stem opening
    Characteristic {
        /// Historian CSV export
        csv: PathBuf,
        /// Valve whose stem opening is the x axis
        #[arg(long, value_enum, default_value_t = Valve::B)]
        valve: Valve,
        /// Meter whose flow is the y axis
        #[arg(long, value_enum, default_value_t = Meter::B)]
        meter: Meter,
        /// Output PNG (defaults to <csv>_characteristic_<valve>.png)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Bucket width in percent stem opening
        #[arg(long)]
        bucket_width: Option<f64>,
        /// Also write the points and bucket averages as CSV
        #[arg(long)]
        export: bool,
    },

    /// Plot each meter's residual against a reference meter
    Residual {
        /// Historian CSV export
        csv: PathBuf,
        /// Reference meter
        #[arg(short, long, value_enum, default_value_t = Meter::A)]
        reference: Meter,
        /// Candidate meters (defaults to every other meter)
        #[arg(long = "candidate", value_enum)]
        candidates: Vec<Meter>,
        /// Valve whose stem opening is the x axis
        #[arg(long, value_enum, default_value_t = Valve::B)]
        valve: Valve,
        /// Output PNG (defaults to <csv>_residual_<reference>.png)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Bucket width in percent stem opening
        #[arg(long)]
        bucket_width: Option<f64>,
        /// Also write the residuals and bucket averages as CSV
        #[arg(long)]
        export: bool,
    },

    /// Plot the Reynolds number of a meter's flow against stem opening
    Reynolds {
        /// Historian CSV export
        csv: PathBuf,
        #[arg(long, value_enum, default_value_t = Meter::B)]
        meter: Meter,
        #[arg(long, value_enum, default_value_t = Valve::B)]
        valve: Valve,
        /// Output PNG (defaults to <csv>_reynolds_<meter>.png)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Pipe inner diameter in meters
        #[arg(long)]
        diameter: Option<f64>,
        /// Bucket width in percent stem opening
        #[arg(long)]
        bucket_width: Option<f64>,
        /// Also write the Reynolds numbers and bucket averages as CSV
        #[arg(long)]
        export: bool,
    },

    /// Run one analysis over every CSV in a directory
    Batch {
        /// Directory of historian CSV exports
        input_dir: PathBuf,
        /// Output directory for charts
        output_dir: PathBuf,
        #[arg(short, long, value_enum, default_value_t = BatchAnalysis::Characteristic)]
        analysis: BatchAnalysis,
        /// Valve used when the file name does not name one
        #[arg(long, value_enum, default_value_t = Valve::B)]
        valve: Valve,
        #[arg(long, value_enum, default_value_t = Meter::B)]
        meter: Meter,
        /// Reference meter for residuals
        #[arg(long, value_enum, default_value_t = Meter::A)]
        reference: Meter,
        #[arg(long)]
        export: bool,
    },

    /// Write the default configuration as YAML
    InitConfig {
        /// Destination file
        #[arg(default_value = "area400.yaml")]
        path: PathBuf,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            let head: String = value.chars().take(36).collect();
            format!("{}...", head)
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

fn fmt_stat(value: f64) -> String {
    if value.is_finite() {
        format!("{:.3}", value)
    } else {
        "n/a".to_string()
    }
}

/// Stop the spinner, log the failure and exit non-zero.
fn fail(spinner: &ProgressBar, what: &str, e: anyhow::Error) -> ! {
    spinner.finish_and_clear();
    error!("{} failed: {:#}", what, e);
    std::process::exit(1);
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match AnalysisConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!("Failed to load config from {}: {}, using defaults", path.display(), e);
                AnalysisConfig::default()
            }
        },
        None => AnalysisConfig::default(),
    };

    if let Some(font) = &config.plot.font_path {
        if let Err(e) = visualization::register_font_file(font) {
            warn!("{}; charts will be drawn without text", e);
        }
    }

    // Dispatch to subcommands
    match cli.command {
        Commands::Inspect { csv } => cmd_inspect(&csv, &config),
        Commands::Characteristic { csv, valve, meter, output, bucket_width, export } => {
            cmd_characteristic(&csv, valve, meter, output, bucket_width, export, config);
        }
        Commands::Residual { csv, reference, candidates, valve, output, bucket_width, export } => {
            cmd_residual(&csv, reference, &candidates, valve, output, bucket_width, export, config);
        }
        Commands::Reynolds { csv, meter, valve, output, diameter, bucket_width, export } => {
            cmd_reynolds(&csv, meter, valve, output, diameter, bucket_width, export, config);
        }
        Commands::Batch { input_dir, output_dir, analysis, valve, meter, reference, export } => {
            let defaults = BatchDefaults {
                valve,
                meter,
                reference,
                export_csv: export,
            };
            cmd_batch(&input_dir, &output_dir, analysis, defaults, &config);
        }
        Commands::InitConfig { path } => cmd_init_config(&path),
    }
}

fn with_bucket_width(mut config: AnalysisConfig, bucket_width: Option<f64>) -> AnalysisConfig {
    if let Some(width) = bucket_width {
        config.plot.bucket_width = width;
    }
    config
}

fn cmd_inspect(csv: &Path, config: &AnalysisConfig) {
    let start = Instant::now();
    let spinner = create_spinner("Reading run export...");

    let inspection = match processors::inspect_run(csv, config) {
        Ok(i) => i,
        Err(e) => fail(&spinner, "Inspect", e),
    };
    spinner.finish_and_clear();

    let mut items = vec![
        ("Input file", csv.display().to_string()),
        ("Rows x columns", format!("{} x {}", inspection.rows, inspection.columns)),
    ];
    for c in &inspection.channels {
        items.push((
            c.channel.as_str(),
            format!(
                "col {} min {} max {} mean {}",
                c.column,
                fmt_stat(c.summary.min),
                fmt_stat(c.summary.max),
                fmt_stat(c.summary.mean)
            ),
        ));
    }
    items.push(("Duration", format!("{:.2?}", start.elapsed())));

    print_summary("Run Inspection", &items);

    for c in &inspection.channels {
        if c.summary.finite < c.summary.samples {
            warn!(
                "{} (column {}, '{}'): {} of {} samples are not numeric",
                c.channel,
                c.column,
                c.header.as_deref().unwrap_or(""),
                c.summary.samples - c.summary.finite,
                c.summary.samples
            );
        }
    }
}

fn cmd_characteristic(
    csv: &Path,
    valve: Valve,
    meter: Meter,
    output: Option<PathBuf>,
    bucket_width: Option<f64>,
    export: bool,
    config: AnalysisConfig,
) {
    let start = Instant::now();
    let config = with_bucket_width(config, bucket_width);
    let output_path = output.unwrap_or_else(|| {
        processors::default_output(csv, &format!("characteristic_{}", valve.tag().to_lowercase()))
    });

    println!("Building characteristic curve...");
    println!("Input: {}", csv.display());
    println!("Output: {}", output_path.display());

    let spinner = create_spinner("Computing flow percentage...");

    match processors::run_characteristic(csv, &output_path, valve, meter, export, &config) {
        Ok(curve) => {
            spinner.finish_and_clear();

            print_summary(
                "Characteristic Curve Complete",
                &[
                    ("Input file", csv.display().to_string()),
                    ("Output PNG", output_path.display().to_string()),
                    ("Valve", valve.to_string()),
                    ("Meter", meter.to_string()),
                    ("Samples", curve.stem.len().to_string()),
                    ("100 % flow (GPM)", fmt_stat(curve.max_flow_gpm)),
                    ("Buckets", curve.buckets.len().to_string()),
                    ("Bucket width (%)", config.plot.bucket_width.to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => fail(&spinner, "Characteristic curve", e),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_residual(
    csv: &Path,
    reference: Meter,
    candidates: &[Meter],
    valve: Valve,
    output: Option<PathBuf>,
    bucket_width: Option<f64>,
    export: bool,
    config: AnalysisConfig,
) {
    let start = Instant::now();
    let config = with_bucket_width(config, bucket_width);
    let output_path = output.unwrap_or_else(|| {
        processors::default_output(csv, &format!("residual_{}", reference.tag().to_lowercase()))
    });

    println!("Computing meter residuals...");
    println!("Input: {}", csv.display());
    println!("Reference: {}", reference);

    let spinner = create_spinner("Comparing flow meters...");

    match processors::run_residual(csv, &output_path, reference, candidates, valve, export, &config) {
        Ok(analysis) => {
            spinner.finish_and_clear();

            let mut items = vec![
                ("Input file", csv.display().to_string()),
                ("Output PNG", output_path.display().to_string()),
                ("Reference", reference.to_string()),
                ("Valve", valve.to_string()),
            ];
            for m in &analysis.meters {
                items.push((
                    m.meter.tag(),
                    format!(
                        "mean {} min {} max {}",
                        fmt_stat(m.summary.mean),
                        fmt_stat(m.summary.min),
                        fmt_stat(m.summary.max)
                    ),
                ));
            }
            items.push(("Duration", format!("{:.2?}", start.elapsed())));

            print_summary("Residual Analysis Complete", &items);
        }
        Err(e) => fail(&spinner, "Residual analysis", e),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_reynolds(
    csv: &Path,
    meter: Meter,
    valve: Valve,
    output: Option<PathBuf>,
    diameter: Option<f64>,
    bucket_width: Option<f64>,
    export: bool,
    config: AnalysisConfig,
) {
    let start = Instant::now();
    let mut config = with_bucket_width(config, bucket_width);
    if let Some(d) = diameter {
        config.fluid.pipe_inner_diameter_m = d;
    }
    let output_path = output.unwrap_or_else(|| {
        processors::default_output(csv, &format!("reynolds_{}", meter.tag().to_lowercase()))
    });

    println!("Computing Reynolds numbers...");
    println!("Input: {}", csv.display());
    println!("Pipe inner diameter: {} m", config.fluid.pipe_inner_diameter_m);

    let spinner = create_spinner("Looking up fluid properties...");

    match processors::run_reynolds(csv, &output_path, meter, valve, export, &config) {
        Ok(analysis) => {
            spinner.finish_and_clear();

            let regime = |r: FlowRegime| analysis.regimes.get(&r).copied().unwrap_or(0).to_string();

            print_summary(
                "Reynolds Analysis Complete",
                &[
                    ("Input file", csv.display().to_string()),
                    ("Output PNG", output_path.display().to_string()),
                    ("Meter", meter.to_string()),
                    ("Temperature", if analysis.measured_temperature { "measured" } else { "default" }.to_string()),
                    ("Re min", fmt_stat(analysis.summary.min)),
                    ("Re max", fmt_stat(analysis.summary.max)),
                    ("Laminar samples", regime(FlowRegime::Laminar)),
                    ("Transitional samples", regime(FlowRegime::Transitional)),
                    ("Turbulent samples", regime(FlowRegime::Turbulent)),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => fail(&spinner, "Reynolds analysis", e),
    }
}

fn cmd_batch(
    input_dir: &Path,
    output_dir: &Path,
    analysis: BatchAnalysis,
    defaults: BatchDefaults,
    config: &AnalysisConfig,
) {
    let start = Instant::now();

    println!("Running {:?} analysis in batch mode...", analysis);
    println!("Input directory: {}", input_dir.display());
    println!("Output directory: {}", output_dir.display());

    let spinner = create_spinner("Analyzing runs...");

    match processors::run_batch(input_dir, output_dir, analysis, defaults, config) {
        Ok(outcomes) => {
            spinner.finish_and_clear();

            for outcome in &outcomes {
                let name = outcome.input.file_name().unwrap_or_default().to_string_lossy();
                match &outcome.result {
                    Ok(samples) => println!(
                        "  ok   {} [{}] -> {} ({} samples)",
                        name,
                        outcome.valve,
                        outcome.output.display(),
                        samples
                    ),
                    Err(e) => println!("  FAIL {}: {}", name, e),
                }
            }

            let failed = outcomes.iter().filter(|o| o.result.is_err()).count();

            print_summary(
                "Batch Analysis Complete",
                &[
                    ("Input directory", input_dir.display().to_string()),
                    ("Output directory", output_dir.display().to_string()),
                    ("Runs", outcomes.len().to_string()),
                    ("Failed", failed.to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );

            if failed > 0 {
                std::process::exit(1);
            }
        }
        Err(e) => fail(&spinner, "Batch analysis", e),
    }
}

fn cmd_init_config(path: &Path) {
    match AnalysisConfig::default().to_yaml(path) {
        Ok(()) => println!("Wrote default configuration to {}", path.display()),
        Err(e) => {
            error!("Failed to write {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_residual_candidates() {
        let cli = Cli::try_parse_from([
            "area400", "residual", "run.csv", "-r", "b", "--candidate", "c", "--candidate", "d", "-v",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Residual { reference, candidates, valve, .. } => {
                assert_eq!(reference, Meter::B);
                assert_eq!(candidates, vec![Meter::C, Meter::D]);
                assert_eq!(valve, Valve::B);
            }
            _ => panic!("Expected residual command"),
        }
    }

    #[test]
    fn test_parse_characteristic_defaults() {
        let cli = Cli::try_parse_from(["area400", "characteristic", "run.csv", "--valve", "c"]).unwrap();

        match cli.command {
            Commands::Characteristic { valve, meter, output, bucket_width, export, .. } => {
                assert_eq!(valve, Valve::C);
                assert_eq!(meter, Meter::B);
                assert!(output.is_none());
                assert!(bucket_width.is_none());
                assert!(!export);
            }
            _ => panic!("Expected characteristic command"),
        }
    }

    #[test]
    fn test_with_bucket_width_override() {
        let config = with_bucket_width(AnalysisConfig::default(), Some(2.0));
        assert_eq!(config.plot.bucket_width, 2.0);

        let config = with_bucket_width(AnalysisConfig::default(), None);
        assert_eq!(config.plot.bucket_width, 5.0);
    }
}
