//! Error types for the prediction_store crate

use crate::schema::SchemaDrift;
use polars::prelude::PolarsError;
use thiserror::Error;

/// Custom error types for the prediction_store crate
#[derive(Debug, Error)]
pub enum PredictionError {
    /// Configuration is missing or inconsistent for the requested operation
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// External payload no longer matches its expected structure
    #[error("Schema drift: {0}")]
    SchemaDriftError(SchemaDrift),

    /// Payload was valid but does not cover the configured horizon
    #[error("Data shortage: {0}")]
    DataShortageError(String),

    /// Network or HTTP failure while fetching from an external source
    #[error("Transport error: {0}")]
    TransportError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Field name not declared by the record schema
    #[error("Unknown record field: {0}")]
    UnknownField(String),

    /// A refresh of the same provider is already running
    #[error("Update in progress: {0}")]
    UpdateInProgress(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from JSON encoding or decoding
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Error from CSV import
    #[error("CSV error: {0}")]
    CsvError(String),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// Error from series math
    #[error("Math error: {0}")]
    MathError(#[from] series_math::MathError),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, PredictionError>;

impl From<SchemaDrift> for PredictionError {
    fn from(drift: SchemaDrift) -> Self {
        PredictionError::SchemaDriftError(drift)
    }
}

impl From<PolarsError> for PredictionError {
    fn from(err: PolarsError) -> Self {
        PredictionError::PolarsError(err.to_string())
    }
}

impl From<csv::Error> for PredictionError {
    fn from(err: csv::Error) -> Self {
        PredictionError::CsvError(err.to_string())
    }
}
