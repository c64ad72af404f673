//! Import and export of prediction sequences

use crate::error::{PredictionError, Result};
use crate::record::PredictionRecord;
use crate::sequence::PredictionSequence;
use crate::utils;
use polars::prelude::*;
use std::io::Read;

const DATE_TIME_COLUMN: &str = "date_time";

impl PredictionSequence {
    /// JSON array of all records in ascending order
    pub fn to_json(&self) -> Result<String> {
        let records: Vec<&PredictionRecord> = self.records().collect();
        Ok(serde_json::to_string(&records)?)
    }

    /// Merge records from a JSON array as produced by [`to_json`](Self::to_json).
    ///
    /// Every field is checked against the schema before anything is merged.
    /// Returns the number of records read.
    pub fn import_json(&mut self, text: &str) -> Result<usize> {
        let records: Vec<PredictionRecord> = serde_json::from_str(text)?;
        for record in &records {
            for (key, _) in record.fields() {
                self.schema().check_stored(key)?;
            }
        }
        let count = records.len();
        for record in records {
            self.insert_record(record)?;
        }
        Ok(count)
    }

    /// Merge rows of a CSV table with header `date_time,<field>,...`.
    ///
    /// An empty cell does not touch the field. Returns the number of rows read.
    pub fn import_csv<R: Read>(&mut self, reader: R) -> Result<usize> {
        let mut reader = csv::Reader::from_reader(reader);
        let headers = reader.headers()?.clone();

        match headers.get(0) {
            Some(first) if first.trim() == DATE_TIME_COLUMN => {}
            other => {
                return Err(PredictionError::CsvError(format!(
                    "first column must be '{}', found {:?}",
                    DATE_TIME_COLUMN, other
                )))
            }
        }
        let keys: Vec<String> = headers.iter().skip(1).map(|h| h.trim().to_string()).collect();
        for key in &keys {
            self.schema().check_stored(key)?;
        }

        let mut rows = Vec::new();
        for (line, row) in reader.records().enumerate() {
            let row = row?;
            let at = utils::parse_datetime(row.get(0).unwrap_or_default())?;
            let mut values = Vec::with_capacity(keys.len());
            for (key, cell) in keys.iter().zip(row.iter().skip(1)) {
                let cell = cell.trim();
                if cell.is_empty() {
                    continue;
                }
                let value = cell.parse::<f64>().map_err(|_| {
                    PredictionError::CsvError(format!(
                        "row {}: '{}' is not a number for {}",
                        line + 1,
                        cell,
                        key
                    ))
                })?;
                values.push((key.as_str(), Some(value)));
            }
            rows.push((at, values));
        }

        let count = rows.len();
        for (at, values) in rows {
            self.update_values(at, values)?;
        }
        Ok(count)
    }

    /// DataFrame with a UTC millisecond `date_time` column and one column per key.
    ///
    /// Computed keys are evaluated; absent values are null.
    pub fn to_dataframe(&self, keys: &[&str]) -> Result<DataFrame> {
        for key in keys {
            if !self.schema().contains(key) {
                return Err(PredictionError::UnknownField(key.to_string()));
            }
        }

        let date_series = Series::new(
            DATE_TIME_COLUMN,
            self.records()
                .map(|r| r.date_time().timestamp_millis())
                .collect::<Vec<i64>>(),
        )
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;

        let mut columns = vec![date_series];
        for key in keys {
            let values: Vec<Option<f64>> = self
                .records()
                .map(|r| self.schema().evaluate(r, key))
                .collect();
            columns.push(Series::new(key, values));
        }

        Ok(DataFrame::new(columns)?)
    }
}
