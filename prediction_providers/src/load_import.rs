//! Load prediction imported from JSON
//!
//! The JSON object maps field names to hourly value lists starting at the
//! window start, e.g. `{"load_mean": [420.0, 380.5], "load_std": [30.0, 28.0]}`.
//! It comes from a file (`load.import_file_path`) or inline (`load.import_json`).

use chrono::Duration;
use prediction_store::{
    ForecastSource, ObjectShape, PayloadSchema, PredictionError, PredictionKind, Result, Shape,
    UpdateContext,
};
use std::collections::BTreeMap;
use tracing::{debug, error};

pub const PROVIDER_ID: &str = "LoadImport";

const FIELDS: [&str; 3] = ["load_mean", "load_std", "load_mean_adjusted"];

pub fn payload_schema() -> PayloadSchema {
    let series = || Shape::array_of(Shape::nullable(Shape::Number));
    let mut object = ObjectShape::new();
    for field in FIELDS {
        object = object.optional(field, series());
    }
    PayloadSchema::new("LoadImport", object.deny_unknown_fields())
}

/// Load import source
#[derive(Debug, Default)]
pub struct LoadImport;

impl LoadImport {
    pub fn new() -> Self {
        Self
    }

    fn read_payload(ctx: &UpdateContext<'_>) -> Result<Vec<u8>> {
        let settings = &ctx.config().load;
        if let Some(path) = &settings.import_file_path {
            debug!("LoadImport: reading {}", path.display());
            return Ok(std::fs::read(path)?);
        }
        if let Some(json) = &settings.import_json {
            return Ok(json.as_bytes().to_vec());
        }
        let message =
            "Requested load import, but neither import_file_path nor import_json is configured."
                .to_string();
        error!("{}", message);
        Err(PredictionError::ConfigurationError(message))
    }
}

impl ForecastSource for LoadImport {
    fn provider_id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn kind(&self) -> PredictionKind {
        PredictionKind::Load
    }

    fn update_data(&mut self, ctx: &mut UpdateContext<'_>) -> Result<()> {
        let body = Self::read_payload(ctx)?;
        let series: BTreeMap<String, Vec<Option<f64>>> = payload_schema().parse(&body)?;
        ctx.mark_fetched();

        let start = ctx.start_datetime();
        for (key, values) in &series {
            for (i, value) in values.iter().enumerate() {
                ctx.update_value(start + Duration::hours(i as i64), key, *value)?;
            }
        }
        debug!("LoadImport: imported {} series", series.len());
        Ok(())
    }
}
