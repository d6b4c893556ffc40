//! Configuration types for the AREA400 analysis.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::channels::{Meter, Valve, ValveSignal};

/// Zero-based column indices of each instrument channel in a historian CSV.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnConfig {
    /// FIC-400B BLOCK1 output
    #[serde(default = "default_fic_b_block")]
    pub fic_b_block: usize,

    /// FIC-400B PID1 output
    #[serde(default = "default_fic_b_pid")]
    pub fic_b_pid: usize,

    /// FIC-400C BLOCK1 output
    #[serde(default = "default_fic_c_block")]
    pub fic_c_block: usize,

    /// FIC-400C PID1 output
    #[serde(default = "default_fic_c_pid")]
    pub fic_c_pid: usize,

    /// FIT-400A..D flow rate (GPM)
    #[serde(default = "default_fit_a")]
    pub fit_a: usize,
    #[serde(default = "default_fit_b")]
    pub fit_b: usize,
    #[serde(default = "default_fit_c")]
    pub fit_c: usize,
    #[serde(default = "default_fit_d")]
    pub fit_d: usize,

    /// Fluid temperature column, if the export carries one
    #[serde(default)]
    pub temperature: Option<usize>,

    /// Valve position signal to read
    #[serde(default)]
    pub valve_signal: ValveSignal,
}

fn default_fic_b_block() -> usize {
    2
}

fn default_fic_b_pid() -> usize {
    3
}

fn default_fic_c_block() -> usize {
    6
}

fn default_fic_c_pid() -> usize {
    7
}

fn default_fit_a() -> usize {
    11
}

fn default_fit_b() -> usize {
    12
}

fn default_fit_c() -> usize {
    13
}

fn default_fit_d() -> usize {
    14
}

impl ColumnConfig {
    /// Column holding the configured position signal of `valve`.
    pub fn valve_column(&self, valve: Valve) -> usize {
        match (valve, self.valve_signal) {
            (Valve::B, ValveSignal::Block) => self.fic_b_block,
            (Valve::B, ValveSignal::Pid) => self.fic_b_pid,
            (Valve::C, ValveSignal::Block) => self.fic_c_block,
            (Valve::C, ValveSignal::Pid) => self.fic_c_pid,
        }
    }

    /// Column holding the flow rate of `meter`.
    pub fn meter_column(&self, meter: Meter) -> usize {
        match meter {
            Meter::A => self.fit_a,
            Meter::B => self.fit_b,
            Meter::C => self.fit_c,
            Meter::D => self.fit_d,
        }
    }
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            fic_b_block: default_fic_b_block(),
            fic_b_pid: default_fic_b_pid(),
            fic_c_block: default_fic_c_block(),
            fic_c_pid: default_fic_c_pid(),
            fit_a: default_fit_a(),
            fit_b: default_fit_b(),
            fit_c: default_fit_c(),
            fit_d: default_fit_d(),
            temperature: None,
            valve_signal: ValveSignal::default(),
        }
    }
}

/// Unit of the temperature channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Fahrenheit,
    Celsius,
}

impl TemperatureUnit {
    /// Convert a reading in this unit to degrees Celsius.
    pub fn to_celsius(self, value: f64) -> f64 {
        match self {
            TemperatureUnit::Fahrenheit => (value - 32.0) * 5.0 / 9.0,
            TemperatureUnit::Celsius => value,
        }
    }
}

/// One row of the fluid property table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FluidProperty {
    pub temperature_c: f64,
    pub density_kg_m3: f64,
    /// Dynamic viscosity
    pub viscosity_pa_s: f64,
}

/// Pipe geometry and fluid properties used for Reynolds numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FluidConfig {
    /// Inner diameter of the metered pipe in meters
    #[serde(default = "default_pipe_diameter")]
    pub pipe_inner_diameter_m: f64,

    #[serde(default)]
    pub temperature_unit: TemperatureUnit,

    /// Temperature in °C assumed when no temperature column is mapped
    #[serde(default = "default_temperature_c")]
    pub default_temperature_c: f64,

    /// Property table, searched by nearest temperature
    #[serde(default = "default_water_properties")]
    pub properties: Vec<FluidProperty>,
}

fn default_pipe_diameter() -> f64 {
    // 1" schedule 40
    0.02664
}

fn default_temperature_c() -> f64 {
    // 68 °F
    20.0
}

fn default_water_properties() -> Vec<FluidProperty> {
    const WATER: &[(f64, f64, f64)] = &[
        (0.0, 999.84, 1.792e-3),
        (5.0, 999.97, 1.519e-3),
        (10.0, 999.70, 1.307e-3),
        (15.0, 999.10, 1.138e-3),
        (20.0, 998.21, 1.002e-3),
        (25.0, 997.05, 0.890e-3),
        (30.0, 995.65, 0.797e-3),
        (35.0, 994.03, 0.719e-3),
        (40.0, 992.22, 0.653e-3),
        (45.0, 990.22, 0.596e-3),
        (50.0, 988.04, 0.547e-3),
        (60.0, 983.20, 0.466e-3),
        (70.0, 977.76, 0.404e-3),
        (80.0, 971.79, 0.354e-3),
        (90.0, 965.31, 0.315e-3),
        (100.0, 958.35, 0.282e-3),
    ];

    WATER
        .iter()
        .map(|&(temperature_c, density_kg_m3, viscosity_pa_s)| FluidProperty {
            temperature_c,
            density_kg_m3,
            viscosity_pa_s,
        })
        .collect()
}

impl Default for FluidConfig {
    fn default() -> Self {
        Self {
            pipe_inner_diameter_m: default_pipe_diameter(),
            temperature_unit: TemperatureUnit::default(),
            default_temperature_c: default_temperature_c(),
            properties: default_water_properties(),
        }
    }
}

/// Chart rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotConfig {
    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    /// Marker radius in pixels
    #[serde(default = "default_point_size")]
    pub point_size: u32,

    /// Bucket width for averaging, in percent stem opening
    #[serde(default = "default_bucket_width")]
    pub bucket_width: f64,

    /// Maximum points per series (subsamples if exceeded)
    #[serde(default = "default_plot_max_points")]
    pub max_points: usize,

    /// TTF/OTF font for captions and axis labels; charts carry no text without it
    #[serde(default)]
    pub font_path: Option<PathBuf>,
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    960
}

fn default_point_size() -> u32 {
    3
}

fn default_bucket_width() -> f64 {
    5.0
}

fn default_plot_max_points() -> usize {
    200_000
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            point_size: default_point_size(),
            bucket_width: default_bucket_width(),
            max_points: default_plot_max_points(),
            font_path: None,
        }
    }
}

/// Main analysis configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub columns: ColumnConfig,

    #[serde(default)]
    pub fluid: FluidConfig,

    #[serde(default)]
    pub plot: PlotConfig,
}

impl AnalysisConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: AnalysisConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_column_config() {
        let config = ColumnConfig::default();
        assert_eq!(config.valve_column(Valve::B), 2);
        assert_eq!(config.valve_column(Valve::C), 6);
        assert_eq!(config.meter_column(Meter::A), 11);
        assert_eq!(config.meter_column(Meter::D), 14);
        assert_eq!(config.temperature, None);
    }

    #[test]
    fn test_pid_signal_columns() {
        let config = ColumnConfig {
            valve_signal: ValveSignal::Pid,
            ..ColumnConfig::default()
        };
        assert_eq!(config.valve_column(Valve::B), 3);
        assert_eq!(config.valve_column(Valve::C), 7);
    }

    #[test]
    fn test_fahrenheit_to_celsius() {
        assert!((TemperatureUnit::Fahrenheit.to_celsius(212.0) - 100.0).abs() < 1e-9);
        assert!((TemperatureUnit::Fahrenheit.to_celsius(32.0)).abs() < 1e-9);
        assert_eq!(TemperatureUnit::Celsius.to_celsius(21.5), 21.5);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "columns:\n  fit_b: 20\n  temperature: 16\nfluid:\n  temperature_unit: celsius\n";
        let config: AnalysisConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.columns.fit_b, 20);
        assert_eq!(config.columns.fit_a, 11);
        assert_eq!(config.columns.temperature, Some(16));
        assert_eq!(config.fluid.temperature_unit, TemperatureUnit::Celsius);
        assert_eq!(config.fluid.properties.len(), 16);
        assert_eq!(config.plot.bucket_width, 5.0);
    }

    #[test]
    fn test_yaml_round_trip_through_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("area400.yaml");

        let mut config = AnalysisConfig::default();
        config.plot.bucket_width = 2.5;
        config.to_yaml(&path).unwrap();

        let loaded = AnalysisConfig::from_yaml(&path).unwrap();
        assert_eq!(loaded.plot.bucket_width, 2.5);
        assert_eq!(loaded.fluid.properties, config.fluid.properties);
    }

    #[test]
    fn test_celsius_unit_keeps_default_temperature() {
        let config: FluidConfig = serde_yaml::from_str("temperature_unit: celsius\n").unwrap();

        assert_eq!(config.temperature_unit, TemperatureUnit::Celsius);
        assert_eq!(config.default_temperature_c, 20.0);
    }
}
