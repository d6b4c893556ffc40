//! Data loaders for AREA400 historian CSV exports.
//!
//! The historian writes one row per time sample and one column per
//! instrument channel. Loading happens in two steps:
//! - [`load_sensor_csv`] reads the whole export into a numeric [`SensorTable`]
//! - [`extract_loop_data`] pulls the valve, flow and temperature channels
//!   named by a [`ColumnConfig`] out of that table

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use thiserror::Error;

use crate::config::{AnalysisConfig, ColumnConfig, TemperatureUnit};
use crate::core::channels::{Meter, Valve, ValveSignal};

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("Column {index} ({channel}) is out of range: table has {available} columns")]
    ColumnOutOfRange {
        index: usize,
        channel: String,
        available: usize,
    },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// A numeric historian export, stored column by column.
///
/// Cells that do not parse as numbers (timestamps, blanks, status text) are
/// stored as `NaN`. Short rows are padded with `NaN`.
#[derive(Debug, Clone)]
pub struct SensorTable {
    /// Header names, one per column (empty for columns the header lacks).
    pub headers: Vec<String>,
    /// Column-major values. Every column has `num_rows()` entries.
    pub columns: Vec<Vec<f64>>,
    /// Source file path.
    pub source_path: Option<PathBuf>,
}

impl SensorTable {
    /// Builds a table from row-major records.
    pub fn from_rows(headers: Vec<String>, rows: &[Vec<f64>]) -> Self {
        let width = rows
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
            .max(headers.len());

        let mut columns = vec![Vec::with_capacity(rows.len()); width];
        for row in rows {
            for (j, column) in columns.iter_mut().enumerate() {
                column.push(row.get(j).copied().unwrap_or(f64::NAN));
            }
        }

        let mut headers = headers;
        headers.resize(width, String::new());

        Self {
            headers,
            columns,
            source_path: None,
        }
    }

    /// Returns the number of samples (rows).
    #[inline]
    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    #[inline]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Returns column `index`, labelling errors with `channel`.
    pub fn column(&self, index: usize, channel: &str) -> Result<&[f64]> {
        self.columns
            .get(index)
            .map(Vec::as_slice)
            .ok_or_else(|| LoaderError::ColumnOutOfRange {
                index,
                channel: channel.to_string(),
                available: self.num_columns(),
            })
    }

    /// Header name of column `index`, if any.
    pub fn header(&self, index: usize) -> Option<&str> {
        self.headers
            .get(index)
            .map(String::as_str)
            .filter(|h| !h.is_empty())
    }
}

/// The channels of one run, extracted from a [`SensorTable`].
///
/// All series have the same length (the table's row count).
#[derive(Debug, Clone)]
pub struct LoopData {
    /// Valve stem opening (%) per valve.
    pub valves: BTreeMap<Valve, Vec<f64>>,
    /// Flow rate (GPM) per meter.
    pub flows: BTreeMap<Meter, Vec<f64>>,
    /// Fluid temperature in degrees Celsius, if a temperature column is mapped.
    pub temperature_c: Option<Vec<f64>>,
    /// Which valve signal was read.
    pub signal: ValveSignal,
    /// Source file path.
    pub source_path: Option<PathBuf>,
}

impl LoopData {
    /// Returns the number of samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.flows.values().next().map_or(0, Vec::len)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stem opening series of `valve`.
    pub fn valve(&self, valve: Valve) -> &[f64] {
        self.valves.get(&valve).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Flow rate series of `meter`.
    pub fn flow(&self, meter: Meter) -> &[f64] {
        self.flows.get(&meter).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Parse one raw cell; anything that is not a number (including invalid UTF-8) is `NaN`.
fn parse_cell(cell: &[u8]) -> f64 {
    std::str::from_utf8(cell)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(f64::NAN)
}

/// Load a historian CSV export into a [`SensorTable`].
///
/// The first row is the header. Rows may have differing lengths.
///
/// # Errors
///
/// Returns an error if the file cannot be read or has no data rows.
pub fn load_sensor_csv<P: AsRef<Path>>(path: P) -> Result<SensorTable> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file));

    // Historian exports are often Latin-1 (e.g. "°F" in headers), so read raw bytes
    let headers: Vec<String> = reader
        .byte_headers()?
        .iter()
        .map(|h| String::from_utf8_lossy(h).trim().to_string())
        .collect();

    let mut rows = Vec::with_capacity(4096);
    for result in reader.byte_records() {
        let record = result?;

        // Blank lines come through as a single empty field
        if record.len() == 1 && record.get(0).map_or(true, |s| s.iter().all(u8::is_ascii_whitespace)) {
            continue;
        }

        let row: Vec<f64> = record.iter().map(parse_cell).collect();
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    log::debug!(
        "{}: {} rows x {} header columns",
        path.display(),
        rows.len(),
        headers.len()
    );

    let mut table = SensorTable::from_rows(headers, &rows);
    table.source_path = Some(path.to_path_buf());
    Ok(table)
}

/// Extract the valve, flow and temperature channels from `table`.
///
/// Temperatures are converted from `unit` to degrees Celsius.
///
/// # Errors
///
/// Returns [`LoaderError::ColumnOutOfRange`] if any mapped column is missing.
pub fn extract_loop_data(
    table: &SensorTable,
    columns: &ColumnConfig,
    unit: TemperatureUnit,
) -> Result<LoopData> {
    let mut valves = BTreeMap::new();
    for valve in Valve::ALL {
        let values = table.column(columns.valve_column(valve), valve.tag())?;
        valves.insert(valve, values.to_vec());
    }

    let mut flows = BTreeMap::new();
    for meter in Meter::ALL {
        let values = table.column(columns.meter_column(meter), meter.tag())?;
        flows.insert(meter, values.to_vec());
    }

    let temperature_c = match columns.temperature {
        Some(index) => {
            let values = table.column(index, "temperature")?;
            Some(values.iter().map(|&t| unit.to_celsius(t)).collect())
        }
        None => None,
    };

    Ok(LoopData {
        valves,
        flows,
        temperature_c,
        signal: columns.valve_signal,
        source_path: table.source_path.clone(),
    })
}

/// Load a run CSV and extract its channels in one step.
pub fn load_loop_data<P: AsRef<Path>>(path: P, config: &AnalysisConfig) -> Result<LoopData> {
    let table = load_sensor_csv(path)?;
    extract_loop_data(&table, &config.columns, config.fluid.temperature_unit)
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_load_sensor_csv_non_numeric_cells_are_nan() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Time,FIC,FIT").unwrap();
        writeln!(file, "10:00:00,12.5,3.0").unwrap();
        writeln!(file, "10:00:01,Bad,4.0").unwrap();
        file.flush().unwrap();

        let table = load_sensor_csv(file.path())?;
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.num_columns(), 3);
        assert!(table.columns[0].iter().all(|v| v.is_nan()));
        assert_eq!(table.columns[1][0], 12.5);
        assert!(table.columns[1][1].is_nan());
        assert_eq!(table.column(2, "FIT")?, &[3.0, 4.0]);
        assert_eq!(table.header(1), Some("FIC"));

        Ok(())
    }

    #[test]
    fn test_load_sensor_csv_pads_short_rows() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "a,b,c").unwrap();
        writeln!(file, "1,2,3").unwrap();
        writeln!(file, "4,5").unwrap();
        file.flush().unwrap();

        let table = load_sensor_csv(file.path())?;
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.columns[2][0], 3.0);
        assert!(table.columns[2][1].is_nan());

        Ok(())
    }

    #[test]
    fn test_load_sensor_csv_latin1_header() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"Time,FIT-400B,TT-400 (\xb0F)\n10:00:00,5.5,68.0\n").unwrap();
        file.flush().unwrap();

        let table = load_sensor_csv(file.path())?;
        assert_eq!(table.num_rows(), 1);
        assert_eq!(table.header(2), Some("TT-400 (\u{FFFD}F)"));
        assert_eq!(table.column(2, "temperature")?, &[68.0]);

        Ok(())
    }

    #[test]
    fn test_load_sensor_csv_latin1_cell_is_nan() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"Time,FIT-400B,TT-400\n10:00:00,5.5,68\xb0\n10:00:01,6.5,69\n").unwrap();
        file.flush().unwrap();

        let table = load_sensor_csv(file.path())?;
        assert_eq!(table.num_rows(), 2);
        assert!(table.columns[2][0].is_nan());
        assert_eq!(table.columns[2][1], 69.0);
        assert_eq!(table.columns[1], vec![5.5, 6.5]);

        Ok(())
    }

    #[test]
    fn test_load_sensor_csv_header_only_is_empty() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "a,b,c").unwrap();
        file.flush().unwrap();

        let result = load_sensor_csv(file.path());
        assert!(matches!(result, Err(LoaderError::EmptyFile(_))));
    }

    #[test]
    fn test_load_sensor_csv_missing_file() {
        let result = load_sensor_csv("/nonexistent/area400/run.csv");
        assert!(matches!(result, Err(LoaderError::Io(_))));
    }

    #[test]
    fn test_column_out_of_range_names_channel() {
        let table = SensorTable::from_rows(vec!["a".into()], &[vec![1.0]]);
        match table.column(5, "FIT-400D") {
            Err(LoaderError::ColumnOutOfRange {
                index,
                channel,
                available,
            }) => {
                assert_eq!(index, 5);
                assert_eq!(channel, "FIT-400D");
                assert_eq!(available, 1);
            }
            other => panic!("Expected ColumnOutOfRange, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_loop_data_default_layout() -> Result<()> {
        let dir = TempDir::new().unwrap();
        let path = write_run_csv(
            dir.path(),
            "run.csv",
            &[
                row(20.0, 30.0, [1.0, 2.0, 3.0, 4.0], 68.0),
                row(40.0, 60.0, [5.0, 6.0, 7.0, 8.0], 212.0),
            ],
        );

        let mut config = AnalysisConfig::default();
        config.columns.temperature = Some(15);
        let data = load_loop_data(&path, &config)?;

        assert_eq!(data.len(), 2);
        assert_eq!(data.valve(Valve::B), &[20.0, 40.0]);
        assert_eq!(data.valve(Valve::C), &[30.0, 60.0]);
        assert_eq!(data.flow(Meter::A), &[1.0, 5.0]);
        assert_eq!(data.flow(Meter::D), &[4.0, 8.0]);

        let temps = data.temperature_c.as_ref().unwrap();
        assert!((temps[0] - 20.0).abs() < 1e-9);
        assert!((temps[1] - 100.0).abs() < 1e-9);
        assert_eq!(data.source_path.as_deref(), Some(path.as_path()));

        Ok(())
    }

    #[test]
    fn test_extract_loop_data_pid_signal() -> Result<()> {
        let table = SensorTable::from_rows(
            Vec::new(),
            &[(0..15).map(|i| i as f64).collect::<Vec<f64>>()],
        );
        let columns = ColumnConfig {
            valve_signal: ValveSignal::Pid,
            ..ColumnConfig::default()
        };

        let data = extract_loop_data(&table, &columns, TemperatureUnit::Celsius)?;
        assert_eq!(data.valve(Valve::B), &[3.0]);
        assert_eq!(data.valve(Valve::C), &[7.0]);
        assert!(data.temperature_c.is_none());

        Ok(())
    }

    #[test]
    fn test_extract_loop_data_narrow_table_fails() {
        let table = SensorTable::from_rows(Vec::new(), &[vec![1.0; 12]]);
        let result = extract_loop_data(&table, &ColumnConfig::default(), TemperatureUnit::Celsius);
        assert!(matches!(
            result,
            Err(LoaderError::ColumnOutOfRange { index: 12, .. })
        ));
    }
}
