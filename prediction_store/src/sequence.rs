//! Datetime-keyed prediction sequence
//!
//! Records are kept in a `BTreeMap` keyed by instant, so there is at most one
//! record per instant and iteration is always ascending regardless of the order
//! values arrived in. Gaps are legal; consumers decide how to treat them.

use crate::error::{PredictionError, Result};
use crate::record::{PredictionKind, PredictionRecord, RecordSchema};
use crate::resample::{self, ResampleOptions};
use crate::utils;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Time window a sequence is maintained for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceWindow {
    start: DateTime<Utc>,
    horizon_hours: u32,
    retention_hours: u32,
}

impl SequenceWindow {
    /// Create a window starting at `start`
    pub fn new(start: DateTime<Utc>, horizon_hours: u32, retention_hours: u32) -> Self {
        Self {
            start,
            horizon_hours,
            retention_hours,
        }
    }

    /// Same window moved to another start
    pub fn with_start(self, start: DateTime<Utc>) -> Self {
        Self { start, ..self }
    }

    /// First instant of the prediction horizon (inclusive)
    pub fn start_datetime(&self) -> DateTime<Utc> {
        self.start
    }

    /// End of the prediction horizon (exclusive)
    pub fn end_datetime(&self) -> DateTime<Utc> {
        self.start + Duration::hours(i64::from(self.horizon_hours))
    }

    /// Oldest instant retained when pruning
    pub fn keep_datetime(&self) -> DateTime<Utc> {
        self.start - Duration::hours(i64::from(self.retention_hours))
    }

    /// Number of hours in the prediction horizon
    pub fn horizon_hours(&self) -> u32 {
        self.horizon_hours
    }

    /// Number of past hours retained
    pub fn retention_hours(&self) -> u32 {
        self.retention_hours
    }
}

/// Ordered, datetime-keyed collection of prediction records
#[derive(Debug, Clone)]
pub struct PredictionSequence {
    schema: Arc<RecordSchema>,
    records: BTreeMap<DateTime<Utc>, PredictionRecord>,
    window: SequenceWindow,
}

impl PredictionSequence {
    /// Create an empty sequence
    pub fn new(schema: RecordSchema, window: SequenceWindow) -> Self {
        Self {
            schema: Arc::new(schema),
            records: BTreeMap::new(),
            window,
        }
    }

    /// Create an empty sequence using the base schema of a kind
    pub fn for_kind(kind: PredictionKind, window: SequenceWindow) -> Self {
        Self::new(kind.base_schema(), window)
    }

    /// Record schema of the sequence
    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    /// Current window
    pub fn window(&self) -> SequenceWindow {
        self.window
    }

    /// Replace the window; records are left untouched until [`prune`](Self::prune)
    pub fn set_window(&mut self, window: SequenceWindow) {
        self.window = window;
    }

    /// Start of the prediction horizon
    pub fn start_datetime(&self) -> DateTime<Utc> {
        self.window.start_datetime()
    }

    /// End of the prediction horizon
    pub fn end_datetime(&self) -> DateTime<Utc> {
        self.window.end_datetime()
    }

    /// Oldest instant kept by [`prune`](Self::prune)
    pub fn keep_datetime(&self) -> DateTime<Utc> {
        self.window.keep_datetime()
    }

    /// Hours between start and end of the horizon
    pub fn total_hours(&self) -> u32 {
        self.window.horizon_hours()
    }

    /// Number of distinct instants held
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the sequence holds no record
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Upsert one field at an instant.
    ///
    /// An existing record keeps all its other fields. A new record is created
    /// only when a value is given; clearing a field of an absent instant is a no-op.
    pub fn update_value(
        &mut self,
        at: DateTime<Utc>,
        key: &str,
        value: impl Into<Option<f64>>,
    ) -> Result<()> {
        self.schema.check_stored(key)?;
        let value = value.into();

        match self.records.get_mut(&at) {
            Some(record) => record.set(key, value),
            None => {
                if value.is_some_and(|v| !v.is_nan()) {
                    let mut record = PredictionRecord::new(at);
                    record.set(key, value);
                    self.records.insert(at, record);
                }
            }
        }
        Ok(())
    }

    /// Upsert several fields at an instant.
    ///
    /// All keys are checked before anything is written.
    pub fn update_values<I, K>(&mut self, at: DateTime<Utc>, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, Option<f64>)>,
        K: AsRef<str>,
    {
        let values: Vec<(K, Option<f64>)> = values.into_iter().collect();
        for (key, _) in &values {
            self.schema.check_stored(key.as_ref())?;
        }
        for (key, value) in values {
            self.update_value(at, key.as_ref(), value)?;
        }
        Ok(())
    }

    /// Merge a whole record into the sequence
    pub fn insert_record(&mut self, record: PredictionRecord) -> Result<()> {
        for (key, _) in record.fields() {
            self.schema.check_stored(key)?;
        }
        match self.records.get_mut(&record.date_time()) {
            Some(existing) => existing.merge(&record),
            None => {
                if !record.is_empty() {
                    self.records.insert(record.date_time(), record);
                }
            }
        }
        Ok(())
    }

    /// Record at an exact instant
    pub fn record(&self, at: DateTime<Utc>) -> Option<&PredictionRecord> {
        self.records.get(&at)
    }

    /// All records in ascending order
    pub fn records(&self) -> impl Iterator<Item = &PredictionRecord> {
        self.records.values()
    }

    /// Records with `start <= date_time < end`
    pub fn records_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Iterator<Item = &PredictionRecord> {
        let end = end.max(start);
        self.records.range(start..end).map(|(_, r)| r)
    }

    /// All instants in ascending order
    pub fn datetimes(&self) -> impl Iterator<Item = DateTime<Utc>> + '_ {
        self.records.keys().copied()
    }

    /// Earliest instant held
    pub fn first_datetime(&self) -> Option<DateTime<Utc>> {
        self.records.keys().next().copied()
    }

    /// Latest instant held
    pub fn last_datetime(&self) -> Option<DateTime<Utc>> {
        self.records.keys().next_back().copied()
    }

    /// Value of a stored or computed field at an exact instant
    pub fn value(&self, at: DateTime<Utc>, key: &str) -> Result<Option<f64>> {
        match self.records.get(&at) {
            Some(record) => self.schema.resolve(record, key),
            None => {
                if self.schema.contains(key) {
                    Ok(None)
                } else {
                    Err(PredictionError::UnknownField(key.to_string()))
                }
            }
        }
    }

    /// Number of instants with `start <= date_time < end`
    pub fn count_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> usize {
        self.records_between(start, end).count()
    }

    /// Number of distinct hour slots with at least one record in `[start, end)`
    pub fn hours_covered(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> usize {
        self.records_between(start, end)
            .map(|r| utils::hour_floor(r.date_time()))
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Remove all records older than [`keep_datetime`](Self::keep_datetime).
    ///
    /// Returns the number of records removed.
    pub fn prune(&mut self) -> usize {
        let keep = self.keep_datetime();
        let retained = self.records.split_off(&keep);
        let removed = self.records.len();
        self.records = retained;
        removed
    }

    /// Remove all records
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Remove records with `start <= date_time < end`; open bounds are unbounded
    pub fn delete_by_datetime(
        &mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> usize {
        let before = self.records.len();
        self.records.retain(|at, _| !in_range(*at, start, end));
        before - self.records.len()
    }

    /// Clear one field on records with `start <= date_time < end`.
    ///
    /// Instants stay in the sequence even when no field is left.
    pub fn key_delete_by_datetime(
        &mut self,
        key: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<usize> {
        self.schema.check_stored(key)?;
        let mut cleared = 0;
        for (at, record) in self.records.iter_mut() {
            if in_range(*at, start, end) && record.get(key).is_some() {
                record.set(key, None);
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    /// Copy of the sequence restricted to `start <= date_time < end`
    pub fn filter_by_datetime(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> PredictionSequence {
        PredictionSequence {
            schema: Arc::clone(&self.schema),
            records: self
                .records
                .iter()
                .filter(|(at, _)| in_range(**at, start, end))
                .map(|(at, r)| (*at, r.clone()))
                .collect(),
            window: self.window,
        }
    }

    /// Raw `(instant, value)` pairs of a field, one per record in range
    pub fn key_to_series(
        &self,
        key: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<(DateTime<Utc>, Option<f64>)>> {
        if !self.schema.contains(key) {
            return Err(PredictionError::UnknownField(key.to_string()));
        }
        Ok(self
            .records
            .iter()
            .filter(|(at, _)| in_range(**at, start, end))
            .map(|(at, record)| (*at, self.schema.evaluate(record, key)))
            .collect())
    }

    /// Upsert a field from `(instant, value)` pairs
    pub fn key_from_series(&mut self, key: &str, series: &[(DateTime<Utc>, f64)]) -> Result<()> {
        self.schema.check_stored(key)?;
        for (at, value) in series {
            self.update_value(*at, key, *value)?;
        }
        Ok(())
    }

    /// Hourly array of a field over `[start, end)`, NaN marking gaps
    pub fn key_to_array(
        &self,
        key: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<f64>> {
        resample::key_to_array(self, key, start, end, &ResampleOptions::default())
    }

    /// Array of a field over `[start, end)` with explicit step and fill policy
    pub fn key_to_array_with(
        &self,
        key: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        options: &ResampleOptions,
    ) -> Result<Vec<f64>> {
        resample::key_to_array(self, key, start, end, options)
    }

    /// Like [`key_to_array_with`](Self::key_to_array_with), but a gap is a `DataShortageError`
    pub fn key_to_dense_array(
        &self,
        key: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        options: &ResampleOptions,
    ) -> Result<Vec<f64>> {
        resample::key_to_dense_array(self, key, start, end, options)
    }
}

fn in_range(at: DateTime<Utc>, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> bool {
    start.map_or(true, |s| at >= s) && end.map_or(true, |e| at < e)
}
