//! Prediction records and the field schemas that describe them
//!
//! A record is one instant plus a bag of optional named values. Which names are
//! legal, how they aggregate when resampled and which names are derived from
//! others is declared by a [`RecordSchema`] per prediction kind.

use crate::error::{PredictionError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use series_math::Aggregation;
use std::collections::BTreeMap;
use std::fmt;

/// Category of prediction a provider delivers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PredictionKind {
    /// Household load
    #[serde(rename = "load")]
    Load,
    /// Photovoltaic generation
    #[serde(rename = "pvforecast")]
    PvForecast,
    /// Electricity market price
    #[serde(rename = "elecprice")]
    ElecPrice,
}

impl PredictionKind {
    /// All prediction kinds
    pub const ALL: [PredictionKind; 3] = [
        PredictionKind::Load,
        PredictionKind::PvForecast,
        PredictionKind::ElecPrice,
    ];

    /// Configuration section name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionKind::Load => "load",
            PredictionKind::PvForecast => "pvforecast",
            PredictionKind::ElecPrice => "elecprice",
        }
    }

    /// Fields every provider of this kind delivers
    pub fn base_schema(&self) -> RecordSchema {
        match self {
            PredictionKind::Load => RecordSchema::new(*self)
                .with_field("load_mean", Aggregation::Mean, "Predicted load mean value (W)")
                .with_field(
                    "load_std",
                    Aggregation::Mean,
                    "Predicted load standard deviation (W)",
                )
                .with_field(
                    "load_mean_adjusted",
                    Aggregation::Mean,
                    "Predicted load mean value adjusted by load measurement (W)",
                ),
            PredictionKind::PvForecast => RecordSchema::new(*self)
                .with_field("pvforecast_dc_power", Aggregation::Sum, "Total DC power (W)")
                .with_field("pvforecast_ac_power", Aggregation::Sum, "Total AC power (W)"),
            PredictionKind::ElecPrice => RecordSchema::new(*self)
                .with_field(
                    "elecprice_marketprice_wh",
                    Aggregation::Mean,
                    "Electricity market price per Wh (€/Wh)",
                )
                .with_computed(
                    "elecprice_marketprice_kwh",
                    ComputedRule::Scaled {
                        source: "elecprice_marketprice_wh".to_string(),
                        factor: 1000.0,
                    },
                    Aggregation::Mean,
                    "Electricity market price per kWh (€/kWh)",
                ),
        }
    }
}

impl fmt::Display for PredictionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rule deriving a computed field from stored fields of the same record
#[derive(Debug, Clone, PartialEq)]
pub enum ComputedRule {
    /// Value of the first listed field that is set
    FirstPresent(Vec<String>),
    /// Stored field multiplied by a constant factor
    Scaled { source: String, factor: f64 },
}

impl ComputedRule {
    fn evaluate(&self, record: &PredictionRecord) -> Option<f64> {
        match self {
            ComputedRule::FirstPresent(sources) => sources.iter().find_map(|s| record.get(s)),
            ComputedRule::Scaled { source, factor } => record.get(source).map(|v| v * factor),
        }
    }
}

/// Declaration of a stored field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub description: String,
    pub aggregation: Aggregation,
}

/// Declaration of a computed field
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedDef {
    pub name: String,
    pub description: String,
    pub rule: ComputedRule,
    pub aggregation: Aggregation,
}

/// Legal fields of the records of one provider
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    kind: PredictionKind,
    fields: Vec<FieldDef>,
    computed: Vec<ComputedDef>,
}

impl RecordSchema {
    /// Create an empty schema for a prediction kind
    pub fn new(kind: PredictionKind) -> Self {
        Self {
            kind,
            fields: Vec::new(),
            computed: Vec::new(),
        }
    }

    /// Declare a stored field
    pub fn with_field(mut self, name: &str, aggregation: Aggregation, description: &str) -> Self {
        self.fields.push(FieldDef {
            name: name.to_string(),
            description: description.to_string(),
            aggregation,
        });
        self
    }

    /// Declare a computed field
    pub fn with_computed(
        mut self,
        name: &str,
        rule: ComputedRule,
        aggregation: Aggregation,
        description: &str,
    ) -> Self {
        self.computed.push(ComputedDef {
            name: name.to_string(),
            description: description.to_string(),
            rule,
            aggregation,
        });
        self
    }

    /// Prediction kind the schema belongs to
    pub fn kind(&self) -> PredictionKind {
        self.kind
    }

    /// Stored field declarations
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Computed field declarations
    pub fn computed(&self) -> &[ComputedDef] {
        &self.computed
    }

    /// Whether the name is a stored field
    pub fn is_stored(&self, key: &str) -> bool {
        self.fields.iter().any(|f| f.name == key)
    }

    /// Whether the name is a computed field
    pub fn is_computed(&self, key: &str) -> bool {
        self.computed.iter().any(|c| c.name == key)
    }

    /// Whether the name is known at all
    pub fn contains(&self, key: &str) -> bool {
        self.is_stored(key) || self.is_computed(key)
    }

    /// All known field names, stored first
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .map(|f| f.name.as_str())
            .chain(self.computed.iter().map(|c| c.name.as_str()))
    }

    /// Aggregation declared for a field
    pub fn aggregation(&self, key: &str) -> Option<Aggregation> {
        self.fields
            .iter()
            .find(|f| f.name == key)
            .map(|f| f.aggregation)
            .or_else(|| {
                self.computed
                    .iter()
                    .find(|c| c.name == key)
                    .map(|c| c.aggregation)
            })
    }

    /// Check that a field may be written
    pub fn check_stored(&self, key: &str) -> Result<()> {
        if self.is_stored(key) {
            Ok(())
        } else if self.is_computed(key) {
            Err(PredictionError::InvalidParameter(format!(
                "Field '{}' is computed and cannot be set",
                key
            )))
        } else {
            Err(PredictionError::UnknownField(format!(
                "'{}' is not a {} record field",
                key, self.kind
            )))
        }
    }

    /// Read a stored or computed field, `None` for unknown names
    pub fn evaluate(&self, record: &PredictionRecord, key: &str) -> Option<f64> {
        if self.is_stored(key) {
            return record.get(key);
        }
        self.computed
            .iter()
            .find(|c| c.name == key)
            .and_then(|c| c.rule.evaluate(record))
    }

    /// Read a stored or computed field, rejecting unknown names
    pub fn resolve(&self, record: &PredictionRecord, key: &str) -> Result<Option<f64>> {
        if !self.contains(key) {
            return Err(PredictionError::UnknownField(format!(
                "'{}' is not a {} record field",
                key, self.kind
            )));
        }
        Ok(self.evaluate(record, key))
    }
}

/// One timestamped set of optional named values
///
/// An absent field is unknown, not zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    date_time: DateTime<Utc>,
    #[serde(default)]
    values: BTreeMap<String, f64>,
}

impl PredictionRecord {
    /// Create a record without values
    pub fn new(date_time: DateTime<Utc>) -> Self {
        Self {
            date_time,
            values: BTreeMap::new(),
        }
    }

    /// Create a record from a list of values
    pub fn with_values<I, K>(date_time: DateTime<Utc>, values: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let mut record = Self::new(date_time);
        for (key, value) in values {
            record.set(&key.into(), Some(value));
        }
        record
    }

    /// Instant of the record
    pub fn date_time(&self) -> DateTime<Utc> {
        self.date_time
    }

    /// Stored value of a field
    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    /// Set or clear a field; NaN clears
    pub fn set(&mut self, key: &str, value: Option<f64>) {
        match value.filter(|v| !v.is_nan()) {
            Some(v) => {
                self.values.insert(key.to_string(), v);
            }
            None => {
                self.values.remove(key);
            }
        }
    }

    /// Overwrite the fields set on `other`, keeping all others
    pub fn merge(&mut self, other: &PredictionRecord) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), *value);
        }
    }

    /// Stored fields in name order
    pub fn fields(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of stored fields
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no field is stored
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
