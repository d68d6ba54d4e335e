// src/error.rs
use thiserror::Error;

// --- Error Types ---

/// Errors raised by the attendance engine and its input/output boundary.
///
/// Only the configuration and I/O variants ever abort a run. The row-level
/// variants are recovered where they occur: a bad holiday string leaves the
/// set untouched, a bad timestamp turns a punch into a missing one, and a
/// structurally broken row is skipped and counted.
#[derive(Error, Debug)]
pub enum AttendanceError {
    #[error("Holiday date '{input}' is not in YYYY-MM-DD format")]
    HolidayFormat { input: String },

    #[error("Attendance group label '{label}' matches no configured group")]
    UnresolvedGroup { label: String },

    #[error("Punch time '{input}' is not a valid HH:MM timestamp")]
    MalformedTimestamp { input: String },

    #[error("Row {row} skipped: {reason}")]
    StructuralRow { row: usize, reason: String },

    #[error("Unknown attendance group: {key}")]
    UnknownGroup { key: String },

    #[error("Unknown {setting} setting: {value}")]
    InvalidSetting { setting: &'static str, value: String },

    #[error("Configuration error: {0}")]
    Config(#[from] envy::Error),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV processing failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = AttendanceError> = std::result::Result<T, E>;
