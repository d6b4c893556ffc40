//! CSV export of derived series.
//!
//! This module writes analysis results next to their charts:
//! - aligned numeric series (one column per series, one row per sample)
//! - bucket averages with their spread

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use thiserror::Error;

use super::transforms::BucketAverage;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// Header count does not match column count.
    #[error("{headers} headers given for {columns} columns")]
    HeaderMismatch { headers: usize, columns: usize },

    /// Columns of differing lengths.
    #[error("column '{column}' has {found} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
pub(crate) fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Opens a CSV writer on `path`, creating parent directories.
fn create_csv_writer(path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    ensure_parent_dirs(path)?;
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(csv::Writer::from_writer(BufWriter::new(file)))
}

/// Write aligned series to CSV, one column per series.
///
/// Values are written with six decimals; `NaN` is written as `NaN`.
///
/// # Errors
///
/// Returns an error if:
/// - `headers` and `columns` differ in count
/// - the columns differ in length
/// - the file cannot be created or written to
///
/// # Example
///
/// ```no_run
/// use area400_analysis::core::writers::write_series_csv;
/// use std::path::Path;
///
/// let stem = [10.0, 20.0];
/// let flow = [25.0, 50.0];
/// write_series_csv(Path::new("curve.csv"), &["stem_pct", "flow_pct"], &[&stem, &flow]).unwrap();
/// ```
pub fn write_series_csv(path: &Path, headers: &[&str], columns: &[&[f64]]) -> Result<()> {
    if headers.len() != columns.len() {
        return Err(WriteError::HeaderMismatch {
            headers: headers.len(),
            columns: columns.len(),
        });
    }

    let rows = columns.first().map_or(0, |c| c.len());
    for (header, column) in headers.iter().zip(columns) {
        if column.len() != rows {
            return Err(WriteError::LengthMismatch {
                column: header.to_string(),
                expected: rows,
                found: column.len(),
            });
        }
    }

    let mut csv_writer = create_csv_writer(path)?;
    let path_str = path.display().to_string();

    csv_writer
        .write_record(headers)
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for i in 0..rows {
        let record: Vec<String> = columns.iter().map(|c| format!("{:.6}", c[i])).collect();
        csv_writer
            .write_record(&record)
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

/// Write bucket averages to CSV.
///
/// Columns: `center,mean,std_dev,min,max,count`.
pub fn write_buckets_csv(path: &Path, buckets: &[BucketAverage]) -> Result<()> {
    let mut csv_writer = create_csv_writer(path)?;
    let path_str = path.display().to_string();

    csv_writer
        .write_record(["center", "mean", "std_dev", "min", "max", "count"])
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for bucket in buckets {
        csv_writer
            .write_record(&[
                format!("{:.6}", bucket.center),
                format!("{:.6}", bucket.mean),
                format!("{:.6}", bucket.std_dev),
                format!("{:.6}", bucket.min),
                format!("{:.6}", bucket.max),
                bucket.count.to_string(),
            ])
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}
