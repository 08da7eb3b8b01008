//! Error types for the ERA export tooling.
//!
//! - [`SnapshotError`] - reading the Jupiter snapshot
//! - [`ProfileError`] - loading or checking an export profile
//! - [`CsvError`] - reading CSV inputs for the tools
//! - [`ExportError`] - writing exports and reports
//! - [`ToolError`] - CSV utilities
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// Snapshot Errors
// =============================================================================

/// Errors while loading snapshot files.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Failed to read a snapshot file.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A snapshot file is not valid JSON.
    #[error("Invalid JSON in {path} (line {line}): {message}")]
    Json {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// The statistics table could not be parsed.
    #[error("Invalid statistics file {path}: {message}")]
    Statistics { path: PathBuf, message: String },
}

// =============================================================================
// Profile Errors
// =============================================================================

/// Errors related to export profiles.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// The profile has no columns.
    #[error("Export profile has no columns")]
    Empty,

    /// Two columns share the same header.
    #[error("Duplicate header in export profile: {0}")]
    DuplicateHeader(String),

    /// A replace operation carries an invalid regex.
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// The profile was written for another record type.
    #[error("Profile is for {found}, not {expected}")]
    KindMismatch { expected: String, found: String },

    /// Failed to read a profile file.
    #[error("Failed to read profile: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("Profile JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// CSV Input Errors
// =============================================================================

/// Errors while reading a CSV input.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Invalid CSV format.
    #[error("Invalid CSV format: {0}")]
    ParseError(String),

    /// Empty file.
    #[error("CSV file is empty")]
    EmptyFile,

    /// A column the caller relies on is missing.
    #[error("Column '{0}' not found in CSV headers")]
    MissingColumn(String),
}

impl From<csv::Error> for CsvError {
    fn from(err: csv::Error) -> Self {
        CsvError::ParseError(err.to_string())
    }
}

// =============================================================================
// Export Errors (top-level)
// =============================================================================

/// Errors raised while writing exports and reports.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Snapshot error.
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Profile error.
    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    /// CSV writer error.
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A blob referenced by an attachment is missing from the blob store.
    #[error("Blob '{key}' not found at {path}")]
    MissingBlob { key: String, path: PathBuf },

    /// JSON error while rendering a value.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An embedded record schema failed to compile.
    #[error("Invalid record schema: {0}")]
    Schema(String),
}

// =============================================================================
// Tool Errors
// =============================================================================

/// Errors from the CSV utilities.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Input CSV could not be read.
    #[error("CSV error: {0}")]
    Input(#[from] CsvError),

    /// Output CSV could not be written.
    #[error("CSV write error: {0}")]
    Output(#[from] csv::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Comparison options file is not valid JSON.
    #[error("Invalid options JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for snapshot operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Result type for profile operations.
pub type ProfileResult<T> = Result<T, ProfileError>;

/// Result type for CSV input operations.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for CSV tools.
pub type ToolResult<T> = Result<T, ToolError>;
