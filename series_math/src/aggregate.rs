//! Bucket aggregation
//!
//! When a requested step is coarser than the stored granularity, several stored
//! values fall into one output bucket. Each field declares how those values are
//! combined:
//! - Sum (power and energy style quantities)
//! - Mean (prices, ratios, temperatures)
//! - Min / Max
//! - First / Last

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rule combining the values that fall into one resampling bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Add all values
    Sum,
    /// Arithmetic mean of all values
    #[default]
    Mean,
    /// Smallest value
    Min,
    /// Largest value
    Max,
    /// Earliest value in the bucket
    First,
    /// Latest value in the bucket
    Last,
}

impl Aggregation {
    /// Combine the values of one bucket.
    ///
    /// Returns `None` for an empty bucket; an empty bucket is a gap, never zero.
    pub fn apply(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }

        let result = match self {
            Aggregation::Sum => values.iter().sum(),
            Aggregation::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Aggregation::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregation::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Aggregation::First => values[0],
            Aggregation::Last => values[values.len() - 1],
        };

        Some(result)
    }

    /// Name of the aggregation as used in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Sum => "sum",
            Aggregation::Mean => "mean",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
            Aggregation::First => "first",
            Aggregation::Last => "last",
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Aggregation {
    type Err = MathError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sum" => Ok(Aggregation::Sum),
            "mean" | "avg" | "average" => Ok(Aggregation::Mean),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            "first" => Ok(Aggregation::First),
            "last" => Ok(Aggregation::Last),
            other => Err(MathError::InvalidInput(format!(
                "Unsupported aggregation: {}",
                other
            ))),
        }
    }
}
