//! Projection of a prediction sequence onto fixed-step arrays
//!
//! The interval `[start, end)` is cut into `ceil((end - start) / step)` buckets.
//! Each bucket takes the records whose instant falls inside it and combines
//! their values with the aggregation declared for the field. An empty bucket
//! is a gap; it is never filled with zero and never filled from a neighbour
//! unless the caller asks for it through a [`FillPolicy`].

use crate::error::{PredictionError, Result};
use crate::sequence::PredictionSequence;
use crate::utils;
use chrono::{DateTime, Duration, Utc};
use series_math::{count_missing, fill, FillPolicy};
use tracing::debug;

/// Step and gap handling of a projection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResampleOptions {
    pub step: Duration,
    pub fill: FillPolicy,
}

impl Default for ResampleOptions {
    fn default() -> Self {
        Self {
            step: Duration::hours(1),
            fill: FillPolicy::Missing,
        }
    }
}

impl ResampleOptions {
    /// Hourly steps, gaps left missing
    pub fn hourly() -> Self {
        Self::default()
    }

    /// Options with a step given as text, e.g. `"15 minutes"`
    pub fn parse_step(step: &str) -> Result<Self> {
        Ok(Self {
            step: utils::parse_duration(step)?,
            ..Self::default()
        })
    }

    /// Replace the step
    pub fn with_step(self, step: Duration) -> Self {
        Self { step, ..self }
    }

    /// Replace the fill policy
    pub fn with_fill(self, fill: FillPolicy) -> Self {
        Self { fill, ..self }
    }
}

/// Number of steps needed to cover `[start, end)`
pub fn step_count(start: DateTime<Utc>, end: DateTime<Utc>, step: Duration) -> Result<usize> {
    if end <= start {
        return Err(PredictionError::InvalidParameter(format!(
            "End {} must be after start {}",
            end, start
        )));
    }
    let step_ms = step.num_milliseconds();
    if step_ms <= 0 {
        return Err(PredictionError::InvalidParameter(
            "Resampling step must be positive".to_string(),
        ));
    }

    let span_ms = (end - start).num_milliseconds();
    let whole = span_ms / step_ms;
    let partial = i64::from(span_ms % step_ms != 0);
    Ok((whole + partial) as usize)
}

/// Project a field onto buckets, `None` marking gaps
pub fn resample_key(
    sequence: &PredictionSequence,
    key: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    options: &ResampleOptions,
) -> Result<Vec<Option<f64>>> {
    let schema = sequence.schema();
    let aggregation = schema.aggregation(key).ok_or_else(|| {
        PredictionError::UnknownField(format!("'{}' is not a {} record field", key, schema.kind()))
    })?;

    let count = step_count(start, end, options.step)?;
    let step_ms = options.step.num_milliseconds();

    let mut values = Vec::with_capacity(count);
    for i in 0..count {
        let bucket_start = step_ms
            .checked_mul(i as i64)
            .and_then(|offset| start.checked_add_signed(Duration::milliseconds(offset)))
            .map_or(end, |t| t.min(end));
        let bucket_end = bucket_start
            .checked_add_signed(options.step)
            .map_or(end, |t| t.min(end));

        let bucket: Vec<f64> = sequence
            .records_between(bucket_start, bucket_end)
            .filter_map(|record| schema.evaluate(record, key))
            .collect();
        values.push(aggregation.apply(&bucket));
    }

    options.fill.apply(&mut values);
    let missing = count_missing(&values);
    if missing > 0 {
        debug!("{}: {} of {} buckets missing from {}", key, missing, count, start);
    }
    Ok(values)
}

/// Project a field onto a dense numeric array, NaN marking gaps
pub fn key_to_array(
    sequence: &PredictionSequence,
    key: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    options: &ResampleOptions,
) -> Result<Vec<f64>> {
    Ok(resample_key(sequence, key, start, end, options)?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Project a field onto a gap-free array; any missing bucket is a data shortage
pub fn key_to_dense_array(
    sequence: &PredictionSequence,
    key: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    options: &ResampleOptions,
) -> Result<Vec<f64>> {
    let values = resample_key(sequence, key, start, end, options)?;
    fill::require_dense(&values).map_err(|e| {
        PredictionError::DataShortageError(format!("{} from {} to {}: {}", key, start, end, e))
    })
}
