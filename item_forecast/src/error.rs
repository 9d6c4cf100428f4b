//! Error types for the item_forecast crate

use std::path::PathBuf;
use thiserror::Error;

/// Hard failures of the forecasting pipeline.
///
/// "Not enough data" is not an error: it is reported through
/// [`crate::service::ForecastOutcome::Unavailable`].
#[derive(Debug, Error)]
pub enum ForecastError {
    /// A model artifact could not be read or did not decode into a usable model
    #[error("Model artifact at {} is corrupt or missing: {reason}", path.display())]
    ArtifactCorruptOrMissing { path: PathBuf, reason: String },

    /// Fitting the network failed or diverged
    #[error("Training failed: {0}")]
    TrainingFailure(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error related to data validation or loading
    #[error("Data error: {0}")]
    DataError(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from JSON encoding or decoding
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Error from the CSV reader
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl ForecastError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ForecastError::ArtifactCorruptOrMissing {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
