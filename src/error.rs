//! Error types for mfvi.

use thiserror::Error;

/// mfvi error types.
#[derive(Error, Debug)]
pub enum MfviError {
    /// An array or vector did not have the width/length the network expects
    #[error("Shape mismatch in {context}: expected {expected}, got {got}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        got: usize,
    },

    /// Task index beyond the number of upper heads
    #[error("Task {task} out of range: model has {no_tasks} tasks")]
    TaskOutOfRange { task: usize, no_tasks: usize },

    /// Size specification with no layer widths at all
    #[error("Size specification must contain at least one layer width")]
    EmptySize,

    /// Training or prediction on zero rows
    #[error("Dataset is empty")]
    EmptyDataset,

    /// Rejected configuration or hyper-parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// ndarray could not build a view or array with the requested layout
    #[error("Array layout error: {0}")]
    Layout(#[from] ndarray::ShapeError),

    /// Snapshot (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Snapshot file error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for mfvi operations.
pub type Result<T> = std::result::Result<T, MfviError>;
