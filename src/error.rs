//! Error types for the scanning pipeline.

use thiserror::Error;

/// Errors that can occur while running the pair scan.
///
/// Per-pair analytic failures (too few points, degenerate regressions)
/// are deliberately *not* errors: they are recorded as failed rows in
/// the stage diagnostics and the run continues.
#[derive(Error, Debug)]
pub enum ScanError {
    /// A price series violates its invariants (unsorted dates,
    /// non-positive prices).
    #[error("Invalid price series: {0}")]
    InvalidSeries(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The caller supplied fewer than two instruments.
    #[error("Instrument universe is empty or has fewer than 2 symbols ({actual})")]
    EmptyUniverse { actual: usize },

    /// I/O error (checkpoint file operations)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Checkpoint serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
