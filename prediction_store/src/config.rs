//! Configuration snapshot handed to providers
//!
//! Resolution order (highest priority first):
//! 1. Explicit overrides (`PREDICTION_*` environment variables or caller pairs)
//! 2. TOML file
//! 3. Compiled defaults
//!
//! Providers never read ambient configuration; each one holds an
//! `Arc<PredictionConfig>` that can be swapped at runtime.

use crate::error::{PredictionError, Result};
use crate::record::PredictionKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

const ENV_PREFIX: &str = "PREDICTION_";

/// Location and timezone of the installation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            latitude: 52.52,
            longitude: 13.405,
            timezone: "Europe/Berlin".to_string(),
        }
    }
}

/// Prediction horizon and retention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionSettings {
    /// Hours predicted from the start instant
    pub hours: u32,
    /// Hours of past records kept before the start instant
    pub historic_hours: u32,
}

impl Default for PredictionSettings {
    fn default() -> Self {
        Self {
            hours: 48,
            historic_hours: 48,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub directory: PathBuf,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            directory: std::env::temp_dir().join("energy_forecast_cache"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadSettings {
    pub provider: Option<String>,
    /// Inline JSON object of hourly arrays, keyed by field name
    pub import_json: Option<String>,
    /// File holding the same JSON object
    pub import_file_path: Option<PathBuf>,
}

/// One PV plane (module array) of the installation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PvPlane {
    /// Peak power in kW
    pub peakpower: f64,
    pub surface_azimuth: f64,
    pub surface_tilt: f64,
    /// Horizon elevation angles, in degrees
    pub userhorizon: Option<Vec<f64>>,
    /// Inverter nominal AC power in W
    pub inverter_paco: Option<f64>,
}

impl Default for PvPlane {
    fn default() -> Self {
        Self {
            peakpower: 5.0,
            surface_azimuth: 180.0,
            surface_tilt: 30.0,
            userhorizon: None,
            inverter_paco: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PvForecastSettings {
    pub provider: Option<String>,
    pub planes: Vec<PvPlane>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElecPriceSettings {
    pub provider: Option<String>,
    /// Fixed charges added to the market price, in €/kWh
    pub charges_kwh: Option<f64>,
    pub bidding_zone: String,
}

impl Default for ElecPriceSettings {
    fn default() -> Self {
        Self {
            provider: None,
            charges_kwh: None,
            bidding_zone: "DE-LU".to_string(),
        }
    }
}

/// Complete configuration snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionConfig {
    pub general: GeneralSettings,
    pub prediction: PredictionSettings,
    pub cache: CacheSettings,
    pub load: LoadSettings,
    pub pvforecast: PvForecastSettings,
    pub elecprice: ElecPriceSettings,
}

impl PredictionConfig {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| {
            PredictionError::ConfigurationError(format!("Invalid TOML configuration: {}", e))
        })
    }

    /// Load a TOML file, apply `PREDICTION_*` environment overrides and validate
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PredictionError::ConfigurationError(format!(
                "Cannot read configuration {}: {}",
                path.display(),
                e
            ))
        })?;
        let mut config = Self::from_toml(&text)?;
        config.apply_env_overrides()?;
        config.validate()?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply `PREDICTION_*` variables of the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(std::env::vars().filter(|(name, _)| name.starts_with(ENV_PREFIX)))
    }

    /// Apply `(variable, value)` overrides.
    ///
    /// Recognised variables:
    /// `PREDICTION_LOAD_PROVIDER`, `PREDICTION_PVFORECAST_PROVIDER`,
    /// `PREDICTION_ELECPRICE_PROVIDER`, `PREDICTION_HOURS`,
    /// `PREDICTION_HISTORIC_HOURS`, `PREDICTION_TIMEZONE`, `PREDICTION_CACHE_DIR`.
    /// Other names are ignored; `PREDICTION_LOG` belongs to logging.
    pub fn apply_overrides<I, K, V>(&mut self, overrides: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in overrides {
            let name = name.as_ref();
            let value = value.as_ref().trim();
            match name {
                "PREDICTION_LOAD_PROVIDER" => self.load.provider = provider_value(value),
                "PREDICTION_PVFORECAST_PROVIDER" => {
                    self.pvforecast.provider = provider_value(value)
                }
                "PREDICTION_ELECPRICE_PROVIDER" => self.elecprice.provider = provider_value(value),
                "PREDICTION_HOURS" => self.prediction.hours = parse_hours(name, value)?,
                "PREDICTION_HISTORIC_HOURS" => {
                    self.prediction.historic_hours = parse_hours(name, value)?
                }
                "PREDICTION_TIMEZONE" => self.general.timezone = value.to_string(),
                "PREDICTION_CACHE_DIR" => self.cache.directory = PathBuf::from(value),
                _ => continue,
            }
            debug!("Configuration override {} = {}", name, value);
        }
        Ok(())
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.prediction.hours == 0 {
            return Err(invalid("prediction.hours", "must be greater than 0"));
        }
        if !(-90.0..=90.0).contains(&self.general.latitude) {
            return Err(invalid("general.latitude", "must be between -90 and 90"));
        }
        if !(-180.0..=180.0).contains(&self.general.longitude) {
            return Err(invalid("general.longitude", "must be between -180 and 180"));
        }
        if self.general.timezone.trim().is_empty() {
            return Err(invalid("general.timezone", "must not be empty"));
        }
        for (i, plane) in self.pvforecast.planes.iter().enumerate() {
            if plane.peakpower.is_nan() || plane.peakpower <= 0.0 {
                return Err(invalid(
                    &format!("pvforecast.planes[{}].peakpower", i),
                    "must be greater than 0",
                ));
            }
        }
        Ok(())
    }

    /// Provider id configured for a prediction kind
    pub fn provider_for(&self, kind: PredictionKind) -> Option<&str> {
        match kind {
            PredictionKind::Load => self.load.provider.as_deref(),
            PredictionKind::PvForecast => self.pvforecast.provider.as_deref(),
            PredictionKind::ElecPrice => self.elecprice.provider.as_deref(),
        }
    }

    /// Copy with another provider selected for a kind
    pub fn with_provider(mut self, kind: PredictionKind, provider_id: Option<&str>) -> Self {
        let provider = provider_id.map(str::to_string);
        match kind {
            PredictionKind::Load => self.load.provider = provider,
            PredictionKind::PvForecast => self.pvforecast.provider = provider,
            PredictionKind::ElecPrice => self.elecprice.provider = provider,
        }
        self
    }
}

fn provider_value(value: &str) -> Option<String> {
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(value.to_string())
    }
}

fn parse_hours(name: &str, value: &str) -> Result<u32> {
    value.parse().map_err(|_| {
        PredictionError::ConfigurationError(format!(
            "{} must be a non-negative whole number of hours, got '{}'",
            name, value
        ))
    })
}

fn invalid(field: &str, message: &str) -> PredictionError {
    PredictionError::ConfigurationError(format!("{} {}", field, message))
}
