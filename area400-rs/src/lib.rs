//! AREA400 flow loop analysis.
//!
//! This crate provides tools for:
//! - Loading historian CSV exports of the AREA400 loop (valve stem openings and flow meters)
//! - Building valve characteristic curves (flow percent vs stem opening)
//! - Comparing flow meters against a reference meter (residuals)
//! - Computing Reynolds numbers from water properties at the measured temperature
//! - Charting all of the above with bucketed error bars
//!
//! # Example
//!
//! ```no_run
//! use area400_analysis::{core::channels::{Meter, Valve}, processors::run_characteristic, AnalysisConfig};
//! use std::path::Path;
//!
//! let config = AnalysisConfig::default();
//! let curve = run_characteristic(
//!     Path::new("AREA400_Obj2_Rep1.csv"),
//!     Path::new("curve.png"),
//!     Valve::B,
//!     Meter::B,
//!     false,
//!     &config,
//! )
//! .unwrap();
//! println!("{} buckets", curve.buckets.len());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{AnalysisConfig, ColumnConfig, FluidConfig, FluidProperty, PlotConfig, TemperatureUnit};
pub use core::channels::{Meter, Valve, ValveSignal};
pub use core::loaders::{LoopData, SensorTable};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
