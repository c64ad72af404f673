//! # Energy Forecast
//!
//! Prediction store, request cache and forecast providers for home energy
//! optimisation, re-exported from the workspace crates:
//!
//! - `prediction_store`: records, sequences, resampling, cache, provider lifecycle
//! - `prediction_providers`: PV, electricity price and load sources
//! - `series_math`: bucket aggregation and gap fill policies
//!
//! ## Example
//!
//! ```no_run
//! use energy_forecast::{bootstrap_from_file, PredictionKind};
//! use std::path::Path;
//!
//! # fn main() -> energy_forecast::Result<()> {
//! let forecast = bootstrap_from_file(Path::new("forecast.toml"))?;
//! forecast.update_all(false)?;
//!
//! let prices = forecast.key_to_array_for_horizon("elecprice_marketprice_wh", PredictionKind::ElecPrice)?;
//! println!("{} hourly prices", prices.len());
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use tracing::info;

pub use prediction_providers::{
    register_providers, ElecPriceEnergyCharts, HttpTransport, LoadImport, PvForecastAkkudoktor,
};
#[cfg(feature = "http")]
pub use prediction_providers::ReqwestTransport;
pub use prediction_store::logging::init_tracing;
pub use series_math;
pub use prediction_store::{
    CacheFileStore, FillPolicy, PredictionConfig, PredictionError, PredictionKind,
    PredictionProvider, ProviderHandle, ProviderRegistry, ProviderState, ResampleOptions, Result,
    UpdateOutcome,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Wired-up configuration, cache and providers of the process
#[derive(Debug)]
pub struct EnergyForecast {
    config: Arc<PredictionConfig>,
    cache: Arc<CacheFileStore>,
    registry: &'static ProviderRegistry,
}

impl EnergyForecast {
    pub fn config(&self) -> &Arc<PredictionConfig> {
        &self.config
    }

    pub fn cache(&self) -> &Arc<CacheFileStore> {
        &self.cache
    }

    pub fn registry(&self) -> &'static ProviderRegistry {
        self.registry
    }

    /// Swap the configuration of every registered provider
    pub fn apply_config(&mut self, config: PredictionConfig) -> Result<()> {
        config.validate()?;
        self.config = Arc::new(config);
        self.registry.apply_config(Arc::clone(&self.config));
        Ok(())
    }

    /// Refresh every enabled provider
    pub fn update_all(&self, force_update: bool) -> Result<Vec<(String, UpdateOutcome)>> {
        self.registry.update_all(false, force_update)
    }

    /// Hourly array of `key` over the horizon of the enabled provider of `kind`
    pub fn key_to_array_for_horizon(&self, key: &str, kind: PredictionKind) -> Result<Vec<f64>> {
        let handle = self.enabled_provider(kind)?;
        let provider = prediction_store::registry::lock_provider(&handle);
        provider.key_to_array(key, provider.start_datetime(), provider.end_datetime())
    }

    /// Like [`key_to_array_for_horizon`](Self::key_to_array_for_horizon), rejecting any gap
    pub fn dense_array_for_horizon(&self, key: &str, kind: PredictionKind) -> Result<Vec<f64>> {
        let handle = self.enabled_provider(kind)?;
        let provider = prediction_store::registry::lock_provider(&handle);
        provider.key_to_dense_array(key)
    }

    fn enabled_provider(&self, kind: PredictionKind) -> Result<ProviderHandle> {
        self.registry.enabled_provider(kind).ok_or_else(|| {
            PredictionError::ConfigurationError(format!("No {} provider enabled", kind))
        })
    }
}

/// Initialise logging, open the cache and register all providers in the global registry.
///
/// Expired cache entries are cleared on the way. Providers left over from an
/// earlier bootstrap are dropped and registered again on the new cache and
/// transport; handles taken before stay valid but are no longer registered.
pub fn bootstrap(
    config: PredictionConfig,
    transport: Arc<dyn HttpTransport>,
) -> Result<EnergyForecast> {
    init_tracing();
    config.validate()?;

    let config = Arc::new(config);
    let cache = Arc::new(CacheFileStore::open(&config.cache.directory)?);
    let expired = cache.clear(false)?;

    let registry = ProviderRegistry::global();
    registry.reset();
    register_providers(registry, Arc::clone(&config), Arc::clone(&cache), transport);

    info!(
        "{} {} ready: {} providers, cache at {} ({} expired entries removed)",
        NAME,
        VERSION,
        registry.len(),
        cache.directory().display(),
        expired
    );
    Ok(EnergyForecast {
        config,
        cache,
        registry,
    })
}

/// [`bootstrap`] with a TOML configuration file and the reqwest transport
#[cfg(feature = "http")]
pub fn bootstrap_from_file(path: &std::path::Path) -> Result<EnergyForecast> {
    let config = PredictionConfig::load(path)?;
    bootstrap(config, Arc::new(ReqwestTransport::new()?))
}
