//! Error taxonomy for schema extraction, grid building, and record reassembly.
//!
//! Library functions return [`SheetError`]; the CLI wraps them in `anyhow`
//! with file context. None of these failures are retried: every variant is a
//! deterministic function of its inputs.

use thiserror::Error;

pub type Result<T, E = SheetError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SheetError {
    /// Invalid schema declaration (no static columns, several dynamic columns,
    /// colliding headers).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Caller misuse such as an empty batch or a missing destination.
    #[error("Usage error: {0}")]
    Usage(String),

    /// A required static column is absent from the grid being read.
    #[error("Column '{header}' not found in sheet")]
    ColumnNotFound { header: String },

    /// Record construction rejected the values read for a row.
    #[error("Validation failed at row {row}, field '{field}': {message}")]
    Validation {
        row: u32,
        field: String,
        message: String,
    },

    /// Failure raised by a user-supplied strategy (for example a cell styler).
    #[error(transparent)]
    Strategy(#[from] anyhow::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to write workbook: {0}")]
    XlsxWrite(#[from] rust_xlsxwriter::XlsxError),

    #[error("Failed to read workbook: {0}")]
    XlsxRead(#[from] calamine::XlsxError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid layout config: {0}")]
    Config(String),
}

impl SheetError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        SheetError::Configuration(message.into())
    }

    pub(crate) fn usage(message: impl Into<String>) -> Self {
        SheetError::Usage(message.into())
    }
}
