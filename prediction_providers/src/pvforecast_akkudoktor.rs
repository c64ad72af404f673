//! PV power forecast from akkudoktor.net
//!
//! One request covers all configured planes. The response holds one value list
//! per plane; entries at the same index share a timestamp and are summed.

use crate::transport::HttpTransport;
use chrono::{DateTime, Duration};
use prediction_store::config::PredictionConfig;
use prediction_store::record::ComputedRule;
use prediction_store::{
    utils, Aggregation, CachedFetch, Fingerprint, ForecastSource, ObjectShape, PayloadSchema,
    PredictionError, PredictionKind, PredictionSequence, RecordSchema, Result, SchemaDrift, Shape,
    UpdateContext,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

pub const PROVIDER_ID: &str = "PVForecastAkkudoktor";

const BASE_URL: &str = "https://api.akkudoktor.net/forecast";
const CACHE_TTL_HOURS: i64 = 1;

pub const DC_POWER: &str = "pvforecast_dc_power";
pub const AC_POWER: &str = "pvforecast_ac_power";
pub const AC_POWER_MEASURED: &str = "pvforecastakkudoktor_ac_power_measured";
pub const WIND_SPEED_10M: &str = "pvforecastakkudoktor_wind_speed_10m";
pub const TEMP_AIR: &str = "pvforecastakkudoktor_temp_air";
pub const AC_POWER_ANY: &str = "pvforecastakkudoktor_ac_power_any";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AkkudoktorHorizon {
    pub altitude: f64,
    pub azimuth_from: f64,
    pub azimuth_to: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AkkudoktorMeta {
    pub lat: f64,
    pub lon: f64,
    pub power: Vec<f64>,
    pub azimuth: Vec<f64>,
    pub tilt: Vec<f64>,
    pub timezone: String,
    pub albedo: f64,
    pub past_days: i64,
    #[serde(rename = "inverterEfficiency")]
    pub inverter_efficiency: f64,
    #[serde(rename = "powerInverter")]
    pub power_inverter: Vec<f64>,
    #[serde(rename = "cellCoEff")]
    pub cell_coeff: f64,
    pub range: bool,
    pub horizont: Vec<Vec<AkkudoktorHorizon>>,
    #[serde(rename = "horizontString")]
    pub horizont_string: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AkkudoktorValue {
    pub datetime: String,
    #[serde(rename = "dcPower")]
    pub dc_power: f64,
    pub power: f64,
    #[serde(rename = "sunTilt")]
    pub sun_tilt: f64,
    #[serde(rename = "sunAzimuth")]
    pub sun_azimuth: f64,
    pub temperature: Option<f64>,
    pub relativehumidity_2m: Option<f64>,
    pub windspeed_10m: Option<f64>,
}

/// Response of the forecast endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AkkudoktorForecast {
    pub meta: AkkudoktorMeta,
    /// One list per plane
    pub values: Vec<Vec<AkkudoktorValue>>,
}

/// Structural contract of [`AkkudoktorForecast`]
pub fn payload_schema() -> PayloadSchema {
    let numbers = || Shape::array_of(Shape::Number);
    let horizon = ObjectShape::new()
        .field("altitude", Shape::Number)
        .field("azimuthFrom", Shape::Number)
        .field("azimuthTo", Shape::Number)
        .deny_unknown_fields();
    let meta = ObjectShape::new()
        .field("lat", Shape::Number)
        .field("lon", Shape::Number)
        .field("power", numbers())
        .field("azimuth", numbers())
        .field("tilt", numbers())
        .field("timezone", Shape::String)
        .field("albedo", Shape::Number)
        .field("past_days", Shape::Integer)
        .field("inverterEfficiency", Shape::Number)
        .field("powerInverter", numbers())
        .field("cellCoEff", Shape::Number)
        .field("range", Shape::Bool)
        .field("horizont", Shape::array_of(Shape::array_of(horizon.into())))
        .field("horizontString", Shape::array_of(Shape::String))
        .deny_unknown_fields();
    let value = ObjectShape::new()
        .field("datetime", Shape::String)
        .field("dcPower", Shape::Number)
        .field("power", Shape::Number)
        .field("sunTilt", Shape::Number)
        .field("sunAzimuth", Shape::Number)
        .field("temperature", Shape::nullable(Shape::Number))
        .field("relativehumidity_2m", Shape::nullable(Shape::Number))
        .field("windspeed_10m", Shape::nullable(Shape::Number))
        .deny_unknown_fields();

    PayloadSchema::new(
        "Akkudoktor",
        ObjectShape::new()
            .field("meta", meta)
            .field("values", Shape::array_of(Shape::array_of(value.into())))
            .deny_unknown_fields(),
    )
}

/// Record schema: PV base fields plus measurement and weather
pub fn record_schema() -> RecordSchema {
    PredictionKind::PvForecast
        .base_schema()
        .with_field(AC_POWER_MEASURED, Aggregation::Sum, "Total AC power measured (W)")
        .with_field(WIND_SPEED_10M, Aggregation::Mean, "Wind Speed 10m (kmph)")
        .with_field(TEMP_AIR, Aggregation::Mean, "Temperature (°C)")
        .with_computed(
            AC_POWER_ANY,
            ComputedRule::FirstPresent(vec![AC_POWER_MEASURED.to_string(), AC_POWER.to_string()]),
            Aggregation::Sum,
            "Measured AC power if available, forecast AC power otherwise (W)",
        )
}

/// Request URL for the configured location and planes
pub fn forecast_url(config: &PredictionConfig) -> String {
    let mut params = vec![
        format!("lat={}", config.general.latitude),
        format!("lon={}", config.general.longitude),
    ];

    for plane in &config.pvforecast.planes {
        params.push(format!("power={}", (plane.peakpower * 1000.0) as i64));
        params.push(format!("azimuth={}", plane.surface_azimuth as i64));
        params.push(format!("tilt={}", plane.surface_tilt as i64));
        if let Some(paco) = plane.inverter_paco {
            params.push(format!("powerInverter={}", paco as i64));
        }
        if let Some(horizon) = &plane.userhorizon {
            let angles: Vec<String> = horizon.iter().map(|h| (*h as i64).to_string()).collect();
            params.push(format!("horizont={}", angles.join(",")));
        }
    }

    params.extend([
        "past_days=5".to_string(),
        "cellCoEff=-0.36".to_string(),
        "inverterEfficiency=0.8".to_string(),
        "albedo=0.25".to_string(),
        format!("timezone={}", config.general.timezone),
        "hourly=relativehumidity_2m%2Cwindspeed_10m".to_string(),
    ]);

    format!("{}?{}", BASE_URL, params.join("&"))
}

fn url_fingerprint(url: &str) -> Fingerprint {
    Fingerprint::builder("pvforecast_akkudoktor::request_forecast")
        .arg("url", url)
        .build()
}

/// Akkudoktor PV forecast source
#[derive(Debug)]
pub struct PvForecastAkkudoktor {
    transport: Arc<dyn HttpTransport>,
    fetch: CachedFetch<str>,
}

impl PvForecastAkkudoktor {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            fetch: CachedFetch::new(Duration::hours(CACHE_TTL_HOURS), url_fingerprint),
        }
    }

    fn request_forecast(&self, url: &str) -> Result<AkkudoktorForecast> {
        let body = self.transport.get(url)?;
        payload_schema().parse(&body)
    }
}

impl ForecastSource for PvForecastAkkudoktor {
    fn provider_id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn kind(&self) -> PredictionKind {
        PredictionKind::PvForecast
    }

    fn schema(&self) -> RecordSchema {
        record_schema()
    }

    fn update_data(&mut self, ctx: &mut UpdateContext<'_>) -> Result<()> {
        if ctx.config().pvforecast.planes.is_empty() {
            let message = "Requested PV forecast, but no planes configured.".to_string();
            error!("{}", message);
            return Err(PredictionError::ConfigurationError(message));
        }

        let url = forecast_url(ctx.config());
        let outcome = self.fetch.call(ctx.cache(), url.as_str(), ctx.force_update(), |url| {
            self.request_forecast(url)
        })?;
        if outcome.is_fresh() {
            ctx.mark_fetched();
        }
        let forecast = outcome.value;

        let timezone = &ctx.config().general.timezone;
        if *timezone != forecast.meta.timezone {
            let drift = SchemaDrift::single(
                "Akkudoktor",
                "meta.timezone",
                format!("\"{}\"", timezone),
                format!("\"{}\"", forecast.meta.timezone),
            );
            error!("Akkudoktor schema change: {}", drift);
            return Err(drift.into());
        }

        let hours = ctx.config().prediction.hours as usize;
        let sets = forecast.values.iter().map(Vec::len).min().unwrap_or(0);
        if sets < hours {
            let message = format!(
                "The forecast must cover at least {} hours, but only {} data sets are given in forecast data.",
                hours, sets
            );
            error!("Akkudoktor: {}", message);
            return Err(PredictionError::DataShortageError(message));
        }

        let start = ctx.start_datetime();
        let mut skipped = 0;
        for i in 0..sets {
            let first = &forecast.values[0][i];
            let at = DateTime::parse_from_rfc3339(&first.datetime).map_err(|e| {
                PredictionError::from(SchemaDrift::single(
                    "Akkudoktor",
                    format!("values[0][{}].datetime", i),
                    "RFC 3339 datetime",
                    format!("\"{}\" ({})", first.datetime, e),
                ))
            })?;

            // Day boundary in the offset the source reports
            let day_start = utils::start_of_day(&start.with_timezone(at.offset()));
            if at < day_start {
                skipped += 1;
                continue;
            }

            let planes = forecast.values.iter().map(|plane| &plane[i]);
            let dc_power: f64 = planes.clone().map(|v| v.dc_power).sum();
            let ac_power: f64 = planes.map(|v| v.power).sum();

            ctx.update_values(
                at.with_timezone(&chrono::Utc),
                [
                    (DC_POWER, Some(dc_power)),
                    (AC_POWER, Some(ac_power)),
                    (WIND_SPEED_10M, first.windspeed_10m),
                    (TEMP_AIR, first.temperature),
                ],
            )?;
        }
        debug!("Akkudoktor: merged {} value sets, skipped {} outdated", sets - skipped, skipped);
        Ok(())
    }
}

fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{}", (v * 100.0).round() / 100.0),
        None => "N/A".to_string(),
    }
}

/// One line per record with forecast and measured AC power
pub fn report_ac_power_and_measurement(sequence: &PredictionSequence) -> String {
    let schema = sequence.schema();
    sequence
        .records()
        .map(|record| {
            format!(
                "Date&Time: {}, DC: {}, AC: {}, AC sampled: {}, AC any: {}",
                record.date_time(),
                format_value(record.get(DC_POWER)),
                format_value(record.get(AC_POWER)),
                format_value(record.get(AC_POWER_MEASURED)),
                format_value(schema.evaluate(record, AC_POWER_ANY)),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
