//! # Error Types
//!
//! Custom error types for Fleet Fault Scan using `thiserror`.
//!
//! Every variant is a fatal precondition: the run aborts before any report
//! is printed. Per-unit conditions (a silent unit, a missing MAC) are never
//! errors.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Fleet Fault Scan
#[derive(Debug, Error)]
pub enum ScanError {
    /// Input telemetry file does not exist
    #[error("File not found at {}", .0.display())]
    InputNotFound(PathBuf),

    /// Input is not a CSV table (for example a raw log file)
    #[error("Can't work with {} as input, need csv file instead", .0.display())]
    NotCsv(PathBuf),

    /// File name carries no `_b<block>` marker
    #[error("No block identifier in file name {0}")]
    BlockNotFound(String),

    /// Companion structure description is missing
    #[error("{} doesn't exist, can't work without structure xml", .0.display())]
    StructureNotFound(PathBuf),

    /// Column count does not fit the 4 + N*20 layout
    #[error("Malformed table: {columns} columns is not 4 + a multiple of 20")]
    MalformedTable { columns: usize },

    /// Column index past the end of the table
    #[error("Column {index} out of range for table with {columns} columns")]
    ColumnOutOfRange { index: usize, columns: usize },

    /// Serial number cannot be packed into a MAC address
    #[error("Invalid serial number: {0}")]
    InvalidSerial(String),

    /// Structure XML errors
    #[error("Structure XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Record carries more fields than the header names
    #[error("Telemetry record on line {line} has {fields} fields, header has {columns}")]
    RecordTooLong {
        line: u64,
        fields: usize,
        columns: usize,
    },

    /// Telemetry CSV errors
    #[error("Telemetry table error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Email delivery errors
    #[error("Notification error: {0}")]
    Notify(String),
}

/// Result type alias for Fleet Fault Scan
pub type Result<T> = std::result::Result<T, ScanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_table_message() {
        let err = ScanError::MalformedTable { columns: 25 };
        assert_eq!(
            err.to_string(),
            "Malformed table: 25 columns is not 4 + a multiple of 20"
        );
    }

    #[test]
    fn test_input_not_found_message() {
        let err = ScanError::InputNotFound(PathBuf::from("/data/site/log_b3.csv"));
        assert_eq!(err.to_string(), "File not found at /data/site/log_b3.csv");
    }

    #[test]
    fn test_csv_message_is_not_doubled() {
        let err: ScanError = csv::Error::from(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk gone",
        ))
        .into();
        let message = err.to_string();
        assert!(message.starts_with("Telemetry table error: "));
        assert!(message.ends_with("disk gone"));
        assert!(!message.contains("CSV error: CSV error"));
    }
}
