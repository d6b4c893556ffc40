//! Channel overview of a run export.

use std::path::Path;

use anyhow::{Context, Result};

use crate::config::AnalysisConfig;
use crate::core::channels::{Meter, Valve};
use crate::core::loaders::{extract_loop_data, load_sensor_csv};
use crate::core::transforms::{summarize, ChannelSummary};

/// Summary of one mapped channel.
#[derive(Debug, Clone)]
pub struct ChannelReport {
    /// Instrument tag or channel name.
    pub channel: String,
    /// Zero-based CSV column.
    pub column: usize,
    /// Header text of that column, if any.
    pub header: Option<String>,
    pub summary: ChannelSummary,
}

/// Channel overview of one run.
#[derive(Debug, Clone)]
pub struct RunInspection {
    pub rows: usize,
    pub columns: usize,
    pub channels: Vec<ChannelReport>,
}

/// Load `input` and summarize every channel the column map names.
pub fn inspect_run(input: &Path, config: &AnalysisConfig) -> Result<RunInspection> {
    let table = load_sensor_csv(input)
        .with_context(|| format!("Failed to load run: {}", input.display()))?;

    // Fails early if the column map does not fit this export
    let data = extract_loop_data(&table, &config.columns, config.fluid.temperature_unit)?;

    let report = |channel: String, column: usize, values: &[f64]| ChannelReport {
        channel,
        column,
        header: table.header(column).map(str::to_string),
        summary: summarize(values),
    };

    let mut channels = Vec::new();
    for valve in Valve::ALL {
        let column = config.columns.valve_column(valve);
        channels.push(report(valve.tag().to_string(), column, data.valve(valve)));
    }
    for meter in Meter::ALL {
        let column = config.columns.meter_column(meter);
        channels.push(report(meter.tag().to_string(), column, data.flow(meter)));
    }
    if let (Some(column), Some(temps)) = (config.columns.temperature, data.temperature_c.as_deref()) {
        channels.push(report("temperature (°C)".to_string(), column, temps));
    }

    for c in &channels {
        log::debug!("{} [col {}]: {:?}", c.channel, c.column, c.summary);
    }

    Ok(RunInspection {
        rows: table.num_rows(),
        columns: table.num_columns(),
        channels,
    })
}
