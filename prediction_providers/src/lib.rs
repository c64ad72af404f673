//! # Prediction Providers
//!
//! Concrete forecast sources for `prediction_store`:
//!
//! - [`PvForecastAkkudoktor`]: PV power per plane from akkudoktor.net
//! - [`ElecPriceEnergyCharts`]: day-ahead market prices from energy-charts.info
//! - [`LoadImport`]: load predictions imported from JSON
//!
//! Network access goes through [`HttpTransport`]; the `http` feature (on by
//! default) provides [`ReqwestTransport`].

pub mod elecprice_energycharts;
pub mod load_import;
pub mod pvforecast_akkudoktor;
pub mod transport;

use prediction_store::{
    CacheFileStore, PredictionConfig, PredictionProvider, ProviderHandle, ProviderRegistry,
};
use std::sync::Arc;

pub use crate::elecprice_energycharts::ElecPriceEnergyCharts;
pub use crate::load_import::LoadImport;
pub use crate::pvforecast_akkudoktor::PvForecastAkkudoktor;
pub use crate::transport::HttpTransport;
#[cfg(feature = "http")]
pub use crate::transport::ReqwestTransport;

/// Register every provider of this crate; existing registrations are kept
pub fn register_providers(
    registry: &ProviderRegistry,
    config: Arc<PredictionConfig>,
    cache: Arc<CacheFileStore>,
    transport: Arc<dyn HttpTransport>,
) -> Vec<ProviderHandle> {
    let make = |source: Box<dyn prediction_store::ForecastSource>| {
        PredictionProvider::new(source, Arc::clone(&config), Arc::clone(&cache))
    };

    vec![
        registry.get_or_insert_with(pvforecast_akkudoktor::PROVIDER_ID, || {
            make(Box::new(PvForecastAkkudoktor::new(Arc::clone(&transport))))
        }),
        registry.get_or_insert_with(elecprice_energycharts::PROVIDER_ID, || {
            make(Box::new(ElecPriceEnergyCharts::new(Arc::clone(&transport))))
        }),
        registry.get_or_insert_with(load_import::PROVIDER_ID, || make(Box::new(LoadImport::new()))),
    ]
}
