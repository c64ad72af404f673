//! Gap fill policies
//!
//! A projected series marks empty buckets as `None`. Gaps stay gaps unless a
//! policy explicitly asks for filling.

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How gaps in a projected series are treated
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillPolicy {
    /// Leave gaps as missing values
    #[default]
    Missing,
    /// Repeat the previous known value, including past the last known value
    ForwardFill,
    /// Linearly interpolate between known neighbours; leading and trailing gaps stay missing
    Interpolate,
    /// Replace every gap with a constant
    Constant(f64),
}

impl FillPolicy {
    /// Apply the policy in place
    pub fn apply(&self, values: &mut [Option<f64>]) {
        match self {
            FillPolicy::Missing => {}
            FillPolicy::ForwardFill => forward_fill(values),
            FillPolicy::Interpolate => interpolate_interior(values),
            FillPolicy::Constant(constant) => {
                for value in values.iter_mut().filter(|v| v.is_none()) {
                    *value = Some(*constant);
                }
            }
        }
    }
}

impl FromStr for FillPolicy {
    type Err = MathError;

    /// Parse `missing`, `ffill`, `interpolate` or `constant:<value>`
    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "missing" | "none" => Ok(FillPolicy::Missing),
            "ffill" | "forward_fill" => Ok(FillPolicy::ForwardFill),
            "interpolate" | "linear" => Ok(FillPolicy::Interpolate),
            other => match other.strip_prefix("constant:") {
                Some(raw) => raw.trim().parse::<f64>().map(FillPolicy::Constant).map_err(|e| {
                    MathError::InvalidInput(format!("Invalid constant fill value '{}': {}", raw, e))
                }),
                None => Err(MathError::InvalidInput(format!(
                    "Unsupported fill policy: {}",
                    other
                ))),
            },
        }
    }
}

/// Replace each gap with the last known value before it
pub fn forward_fill(values: &mut [Option<f64>]) {
    let mut last = None;
    for value in values.iter_mut() {
        match value {
            Some(v) => last = Some(*v),
            None => *value = last,
        }
    }
}

/// Linearly interpolate gaps enclosed by known values
pub fn interpolate_interior(values: &mut [Option<f64>]) {
    let mut previous: Option<(usize, f64)> = None;

    for i in 0..values.len() {
        let Some(current) = values[i] else {
            continue;
        };

        if let Some((j, start)) = previous {
            let gap = i - j;
            for k in 1..gap {
                let fraction = k as f64 / gap as f64;
                values[j + k] = Some(start + (current - start) * fraction);
            }
        }
        previous = Some((i, current));
    }
}

/// Ensure a series has no gaps, returning the dense values
pub fn require_dense(values: &[Option<f64>]) -> Result<Vec<f64>> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            v.ok_or_else(|| {
                MathError::InsufficientData(format!("Missing value at position {}", i))
            })
        })
        .collect()
}
