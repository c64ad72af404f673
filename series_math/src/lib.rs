//! # Series Math
//!
//! Numeric helpers for projecting sparse, time-keyed values onto fixed-step arrays.
//! This crate provides the bucket aggregations and gap fill policies used by the
//! prediction store resampler.

use thiserror::Error;

// Resampling modules
pub mod aggregate;
pub mod fill;

pub use aggregate::Aggregation;
pub use fill::FillPolicy;

/// Errors that can occur in series calculations
#[derive(Error, Debug)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for series math operations
pub type Result<T> = std::result::Result<T, MathError>;

/// Count the gaps (missing values) in a projected series
pub fn count_missing(values: &[Option<f64>]) -> usize {
    values.iter().filter(|v| v.is_none()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_missing() {
        assert_eq!(count_missing(&[Some(1.0), None, None, Some(2.0)]), 2);
        assert_eq!(count_missing(&[]), 0);
    }
}
