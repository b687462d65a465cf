//! # Telemetry Table
//!
//! Column-major storage of the CSV snapshot. Each cell is `Option<f64>`;
//! `None` means the unit did not report at that timestamp.

use std::path::Path;
use tracing::{debug, info};

use crate::error::{Result, ScanError};

/// Rectangular telemetry table with named columns
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryTable {
    headers: Vec<String>,
    columns: Vec<Vec<Option<f64>>>,
    rows: usize,
}

/// Parse a single cell; blanks, `nan` and non-numeric text are missing.
fn parse_cell(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<f64>() {
        Ok(value) if !value.is_nan() => Some(value),
        _ => None,
    }
}

impl TelemetryTable {
    /// Build a table from headers and equally long columns
    ///
    /// Columns shorter than the longest one are padded with missing values.
    pub fn from_columns(headers: Vec<String>, mut columns: Vec<Vec<Option<f64>>>) -> Self {
        let rows = columns.iter().map(Vec::len).max().unwrap_or(0);
        for column in &mut columns {
            column.resize(rows, None);
        }
        Self {
            headers,
            columns,
            rows,
        }
    }

    /// Load a comma-delimited table with a header row
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or a record has more fields
    /// than the header. Short records are padded with missing values.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fleet_fault_scan::telemetry::TelemetryTable;
    ///
    /// let table = TelemetryTable::load("/data/site/151105/log_b302.csv")?;
    /// println!("{} rows x {} columns", table.rows(), table.width());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)?;

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut columns: Vec<Vec<Option<f64>>> = vec![Vec::new(); headers.len()];

        let mut padded = 0usize;
        for record in reader.records() {
            let record = record?;
            if record.len() > headers.len() {
                return Err(ScanError::RecordTooLong {
                    line: record.position().map_or(0, |p| p.line()),
                    fields: record.len(),
                    columns: headers.len(),
                });
            }
            if record.len() < headers.len() {
                padded += 1;
            }
            for (index, column) in columns.iter_mut().enumerate() {
                column.push(record.get(index).and_then(parse_cell));
            }
        }
        if padded > 0 {
            debug!("Padded {} short records with missing values", padded);
        }

        let table = Self::from_columns(headers, columns);
        info!(
            "Loaded {} rows x {} columns from {}",
            table.rows,
            table.width(),
            path.display()
        );
        Ok(table)
    }

    /// Number of sample rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns
    pub fn width(&self) -> usize {
        self.headers.len()
    }

    /// Borrow a column by position
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::ColumnOutOfRange`] if `index` is past the last column.
    pub fn column(&self, index: usize) -> Result<&[Option<f64>]> {
        self.columns
            .get(index)
            .map(Vec::as_slice)
            .ok_or_else(|| {
                debug!("Column {} requested from {}-column table", index, self.width());
                ScanError::ColumnOutOfRange {
                    index,
                    columns: self.width(),
                }
            })
    }
}
