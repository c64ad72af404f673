//! Day-ahead electricity prices from energy-charts.info

use crate::transport::HttpTransport;
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use prediction_store::{
    CachedFetch, Fingerprint, ForecastSource, ObjectShape, PayloadSchema, PredictionError,
    PredictionKind, Result, SchemaDrift, Shape, UpdateContext,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

pub const PROVIDER_ID: &str = "ElecPriceEnergyCharts";

const BASE_URL: &str = "https://api.energy-charts.info/price";
const CACHE_TTL_HOURS: i64 = 1;
const PRICE_KEY: &str = "elecprice_marketprice_wh";

/// Response of the price endpoint; prices in EUR/MWh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyChartsElecPrice {
    pub license_info: String,
    pub unix_seconds: Vec<i64>,
    pub price: Vec<Option<f64>>,
    pub unit: String,
    pub deprecated: bool,
}

pub fn payload_schema() -> PayloadSchema {
    PayloadSchema::new(
        "Energy-Charts",
        ObjectShape::new()
            .field("license_info", Shape::String)
            .field("unix_seconds", Shape::array_of(Shape::Integer))
            .field("price", Shape::array_of(Shape::nullable(Shape::Number)))
            .field("unit", Shape::String)
            .field("deprecated", Shape::Bool)
            .deny_unknown_fields(),
    )
}

/// Effective query parameters; the fingerprint of a price request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnergyChartsQuery {
    pub bidding_zone: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl EnergyChartsQuery {
    /// Query spanning the retention window through the end of the horizon
    pub fn for_window(ctx: &UpdateContext<'_>) -> Self {
        Self {
            bidding_zone: ctx.config().elecprice.bidding_zone.clone(),
            start: ctx.keep_datetime().date_naive(),
            end: (ctx.end_datetime() + Duration::days(1)).date_naive(),
        }
    }

    pub fn url(&self) -> String {
        format!(
            "{}?bzn={}&start={}&end={}",
            BASE_URL,
            self.bidding_zone,
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::builder("elecprice_energycharts::request_forecast")
            .arg("bzn", &self.bidding_zone)
            .arg("start", self.start)
            .arg("end", self.end)
            .build()
    }
}

/// Market price in EUR/MWh to €/Wh, plus fixed charges given in €/kWh
pub fn price_wh(price_mwh: f64, charges_kwh: Option<f64>) -> f64 {
    price_mwh / 1_000_000.0 + charges_kwh.unwrap_or(0.0) / 1000.0
}

/// Energy-Charts price source
#[derive(Debug)]
pub struct ElecPriceEnergyCharts {
    transport: Arc<dyn HttpTransport>,
    fetch: CachedFetch<EnergyChartsQuery>,
}

impl ElecPriceEnergyCharts {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            fetch: CachedFetch::new(
                Duration::hours(CACHE_TTL_HOURS),
                EnergyChartsQuery::fingerprint,
            ),
        }
    }

    fn request_forecast(&self, query: &EnergyChartsQuery) -> Result<EnergyChartsElecPrice> {
        let body = self.transport.get(&query.url())?;
        payload_schema().parse(&body)
    }
}

impl ForecastSource for ElecPriceEnergyCharts {
    fn provider_id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn kind(&self) -> PredictionKind {
        PredictionKind::ElecPrice
    }

    fn update_data(&mut self, ctx: &mut UpdateContext<'_>) -> Result<()> {
        let query = EnergyChartsQuery::for_window(ctx);
        let outcome = self.fetch.call(ctx.cache(), &query, ctx.force_update(), |query| {
            self.request_forecast(query)
        })?;
        if outcome.is_fresh() {
            ctx.mark_fetched();
        }
        let prices = outcome.value;

        if prices.unix_seconds.len() != prices.price.len() {
            let drift = SchemaDrift::single(
                "Energy-Charts",
                "price",
                format!("array of {} values matching unix_seconds", prices.unix_seconds.len()),
                format!("array of {} values", prices.price.len()),
            );
            error!("Energy-Charts schema change: {}", drift);
            return Err(drift.into());
        }
        if prices.price.is_empty() {
            let message = format!(
                "Energy-Charts delivered no prices for {} from {} to {}",
                query.bidding_zone, query.start, query.end
            );
            error!("{}", message);
            return Err(PredictionError::DataShortageError(message));
        }

        let keep = ctx.keep_datetime();
        let charges = ctx.config().elecprice.charges_kwh;
        let mut merged = 0;
        for (i, (seconds, price)) in prices.unix_seconds.iter().zip(&prices.price).enumerate() {
            let at = Utc.timestamp_opt(*seconds, 0).single().ok_or_else(|| {
                PredictionError::from(SchemaDrift::single(
                    "Energy-Charts",
                    format!("unix_seconds[{}]", i),
                    "unix timestamp",
                    seconds.to_string(),
                ))
            })?;
            if at < keep {
                continue;
            }
            let Some(price) = price else {
                continue;
            };
            ctx.update_value(at, PRICE_KEY, price_wh(*price, charges))?;
            merged += 1;
        }
        debug!("Energy-Charts: merged {} of {} prices", merged, prices.price.len());
        Ok(())
    }
}
