use chrono::{DateTime, Duration, TimeZone, Utc};
use energy_forecast::{
    bootstrap, CacheFileStore, HttpTransport, PredictionConfig, PredictionKind, ProviderState,
    Result, UpdateOutcome,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tempfile::TempDir;

// Both tests drive the process-wide registry
static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug)]
struct PriceTransport {
    body: Vec<u8>,
}

impl HttpTransport for PriceTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        assert!(url.starts_with("https://api.energy-charts.info/price"));
        Ok(self.body.clone())
    }
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 12, 11, 0, 0, 0).unwrap()
}

fn price_config(cache_dir: &Path) -> PredictionConfig {
    let mut config = PredictionConfig::default()
        .with_provider(PredictionKind::ElecPrice, Some("ElecPriceEnergyCharts"));
    config.prediction.hours = 24;
    config.prediction.historic_hours = 0;
    config.cache.directory = cache_dir.to_path_buf();
    config
}

fn price_transport() -> Arc<PriceTransport> {
    let seconds: Vec<i64> = (0..24)
        .map(|h| (start() + Duration::hours(h)).timestamp())
        .collect();
    let body = serde_json::to_vec(&json!({
        "license_info": "",
        "unix_seconds": seconds,
        "price": vec![100.0; 24],
        "unit": "EUR / MWh",
        "deprecated": false
    }))
    .unwrap();
    Arc::new(PriceTransport { body })
}

#[test]
fn test_bootstrap_wires_global_registry() {
    let _guard = serial();
    let dir = TempDir::new().unwrap();

    let forecast = bootstrap(price_config(&dir.path().join("cache")), price_transport()).unwrap();
    let registry = forecast.registry();
    assert_eq!(
        registry.provider_ids(),
        vec!["ElecPriceEnergyCharts", "LoadImport", "PVForecastAkkudoktor"]
    );

    registry.set_start_datetime(start());
    let outcomes = forecast.update_all(false).unwrap();
    assert!(outcomes.contains(&(
        "ElecPriceEnergyCharts".to_string(),
        UpdateOutcome::Updated { fetched: true }
    )));
    assert!(outcomes.contains(&("LoadImport".to_string(), UpdateOutcome::Skipped)));

    let prices = forecast
        .key_to_array_for_horizon("elecprice_marketprice_wh", PredictionKind::ElecPrice)
        .unwrap();
    assert_eq!(prices.len(), 24);
    assert!(prices.iter().all(|p| (p - 1e-4).abs() < 1e-12));
    assert_eq!(
        forecast
            .dense_array_for_horizon("elecprice_marketprice_wh", PredictionKind::ElecPrice)
            .unwrap(),
        prices
    );

    let handle = registry.get("ElecPriceEnergyCharts").unwrap();
    assert_eq!(handle.lock().unwrap().state(), ProviderState::Fresh);

    assert!(forecast
        .key_to_array_for_horizon("load_mean", PredictionKind::Load)
        .is_err());

    registry.reset();
}

#[test]
fn test_second_bootstrap_uses_new_cache() {
    let _guard = serial();
    let first_dir = TempDir::new().unwrap();
    let second_dir = TempDir::new().unwrap();

    let first = bootstrap(price_config(first_dir.path()), price_transport()).unwrap();
    let first_handle = first.registry().get("ElecPriceEnergyCharts").unwrap();

    let second = bootstrap(price_config(second_dir.path()), price_transport()).unwrap();
    let second_handle = second.registry().get("ElecPriceEnergyCharts").unwrap();
    assert!(!Arc::ptr_eq(&first_handle, &second_handle));

    second.registry().set_start_datetime(start());
    second.update_all(true).unwrap();

    assert_eq!(second.cache().len(), 1);
    assert_eq!(CacheFileStore::open(first_dir.path()).unwrap().len(), 0);

    second.registry().reset();
}
