mod common;

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use common::{fixture, provider, MockTransport};
use pretty_assertions::assert_eq;
use prediction_providers::pvforecast_akkudoktor::{
    forecast_url, report_ac_power_and_measurement, AC_POWER, AC_POWER_ANY, AC_POWER_MEASURED,
    DC_POWER, PROVIDER_ID, TEMP_AIR,
};
use prediction_providers::PvForecastAkkudoktor;
use prediction_store::config::PvPlane;
use prediction_store::{PredictionConfig, PredictionError, PredictionKind, UpdateOutcome};
use serde_json::{json, Value};

fn day() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 12, 11, 0, 0, 0).unwrap()
}

fn config() -> PredictionConfig {
    let mut config =
        PredictionConfig::default().with_provider(PredictionKind::PvForecast, Some(PROVIDER_ID));
    config.prediction.hours = 48;
    config.prediction.historic_hours = 24;
    config.general.timezone = "Europe/Berlin".to_string();
    config.pvforecast.planes = vec![
        PvPlane {
            peakpower: 5.0,
            surface_azimuth: -10.0,
            surface_tilt: 7.0,
            userhorizon: Some(vec![20.0, 27.0, 22.0, 20.0]),
            inverter_paco: Some(10000.0),
        },
        PvPlane {
            peakpower: 4.8,
            surface_azimuth: -90.0,
            surface_tilt: 7.0,
            userhorizon: Some(vec![30.0, 30.0, 30.0, 50.0]),
            inverter_paco: Some(10000.0),
        },
    ];
    config
}

fn value(at: DateTime<FixedOffset>, dc_power: f64) -> Value {
    json!({
        "datetime": at.format("%Y-%m-%dT%H:%M:%S%.3f%:z").to_string(),
        "dcPower": dc_power,
        "power": dc_power * 0.8,
        "sunTilt": -30.5,
        "sunAzimuth": 120.0,
        "temperature": 4.2,
        "relativehumidity_2m": 81.0,
        "windspeed_10m": 12.5
    })
}

/// Two planes with `count` hourly entries from 2024-12-10 00:00 +01:00
fn payload_value(timezone: &str, count: usize) -> Value {
    let offset = FixedOffset::east_opt(3600).unwrap();
    let first = offset.with_ymd_and_hms(2024, 12, 10, 0, 0, 0).unwrap();
    let plane = |base: f64| -> Vec<Value> {
        (0..count)
            .map(|i| value(first + Duration::hours(i as i64), base + i as f64))
            .collect()
    };

    json!({
        "meta": {
            "lat": 52.52,
            "lon": 13.405,
            "power": [5000, 4800],
            "azimuth": [-10, -90],
            "tilt": [7, 7],
            "timezone": timezone,
            "albedo": 0.25,
            "past_days": 5,
            "inverterEfficiency": 0.8,
            "powerInverter": [10000, 10000],
            "cellCoEff": -0.36,
            "range": false,
            "horizont": [
                [{"altitude": 20, "azimuthFrom": 0, "azimuthTo": 90}],
                [{"altitude": 30, "azimuthFrom": 0, "azimuthTo": 90}]
            ],
            "horizontString": ["20,27,22,20", "30,30,30,50"]
        },
        "values": [plane(1000.0), plane(500.0)]
    })
}

fn payload(timezone: &str, count: usize) -> Vec<u8> {
    serde_json::to_vec(&payload_value(timezone, count)).unwrap()
}

#[test]
fn test_url_contains_planes() {
    let url = forecast_url(&config());

    assert!(url.starts_with("https://api.akkudoktor.net/forecast?lat=52.52&lon=13.405&"));
    assert!(url.contains("power=5000&azimuth=-10&tilt=7&powerInverter=10000&horizont=20,27,22,20"));
    assert!(url.contains("power=4800&azimuth=-90&tilt=7&powerInverter=10000&horizont=30,30,30,50"));
    assert!(url.ends_with("timezone=Europe/Berlin&hourly=relativehumidity_2m%2Cwindspeed_10m"));
}

#[test]
fn test_update_data_sums_planes_and_skips_previous_days() {
    let fx = fixture();
    let transport = MockTransport::new(payload("Europe/Berlin", 80));
    let mut provider = provider(
        &fx,
        config(),
        Box::new(PvForecastAkkudoktor::new(transport.clone())),
        day(),
    );

    let outcome = provider.update_data(false, false).unwrap();
    assert_eq!(outcome, UpdateOutcome::Updated { fetched: true });
    assert_eq!(transport.calls(), 1);

    // Entries before 2024-12-11 00:00 +01:00 are outdated
    assert_eq!(provider.len(), 56);
    assert_eq!(provider.sequence().first_datetime(), Some(day() - Duration::hours(1)));

    // Entry 25 is 2024-12-11 00:00 UTC
    let seq = provider.sequence();
    assert_eq!(seq.value(day(), DC_POWER).unwrap(), Some(1025.0 + 525.0));
    let ac = seq.value(day(), AC_POWER).unwrap().unwrap();
    assert!((ac - 1240.0).abs() < 1e-9);
    assert_eq!(seq.value(day(), TEMP_AIR).unwrap(), Some(4.2));

    let array = provider
        .key_to_array(AC_POWER, provider.start_datetime(), provider.end_datetime())
        .unwrap();
    assert_eq!(array.len(), 48);
    assert!(array.iter().all(|v| !v.is_nan()));
}

#[test]
fn test_cache_is_keyed_by_url() {
    let fx = fixture();
    let transport = MockTransport::new(payload("Europe/Berlin", 80));
    let mut first = provider(
        &fx,
        config(),
        Box::new(PvForecastAkkudoktor::new(transport.clone())),
        day(),
    );
    first.update_data(false, false).unwrap();
    let again = first.update_data(false, false).unwrap();
    assert_eq!(again, UpdateOutcome::Updated { fetched: false });
    assert_eq!(transport.calls(), 1);

    let mut changed = config();
    changed.pvforecast.planes[1].surface_tilt = 30.0;
    let mut second = provider(
        &fx,
        changed,
        Box::new(PvForecastAkkudoktor::new(transport.clone())),
        day(),
    );
    second.update_data(false, false).unwrap();
    assert_eq!(transport.calls(), 2);
}

#[test]
fn test_no_planes_is_configuration_error() {
    let fx = fixture();
    let transport = MockTransport::new(payload("Europe/Berlin", 80));
    let mut config = config();
    config.pvforecast.planes.clear();
    let mut provider = provider(
        &fx,
        config,
        Box::new(PvForecastAkkudoktor::new(transport.clone())),
        day(),
    );

    let result = provider.update_data(false, false);
    assert!(matches!(result, Err(PredictionError::ConfigurationError(_))));
    assert_eq!(transport.calls(), 0);
}

#[test]
fn test_timezone_mismatch_is_schema_drift_before_merge() {
    let fx = fixture();
    let transport = MockTransport::new(payload("UTC", 80));
    let mut provider = provider(
        &fx,
        config(),
        Box::new(PvForecastAkkudoktor::new(transport)),
        day(),
    );

    match provider.update_data(false, true) {
        Err(PredictionError::SchemaDriftError(drift)) => {
            assert!(drift.mentions("meta.timezone"));
            assert_eq!(drift.violations[0].expected, "\"Europe/Berlin\"");
            assert_eq!(drift.violations[0].received, "\"UTC\"");
        }
        other => panic!("Expected SchemaDriftError, got {:?}", other),
    }
    assert!(provider.is_empty());
}

#[test]
fn test_short_forecast_is_data_shortage() {
    let fx = fixture();
    let transport = MockTransport::new(payload("Europe/Berlin", 40));
    let mut provider = provider(
        &fx,
        config(),
        Box::new(PvForecastAkkudoktor::new(transport)),
        day(),
    );

    match provider.update_data(false, true) {
        Err(PredictionError::DataShortageError(message)) => {
            assert!(message.contains("only 40 data sets"));
        }
        other => panic!("Expected DataShortageError, got {:?}", other),
    }
    assert!(provider.is_empty());
}

#[test]
fn test_structural_change_names_every_field() {
    let fx = fixture();
    let mut body = payload_value("Europe/Berlin", 80);
    body["values"][1][3]
        .as_object_mut()
        .unwrap()
        .remove("dcPower");
    body["meta"]["range"] = json!("no");
    let transport = MockTransport::new(serde_json::to_vec(&body).unwrap());
    let mut provider = provider(
        &fx,
        config(),
        Box::new(PvForecastAkkudoktor::new(transport)),
        day(),
    );

    match provider.update_data(false, true) {
        Err(PredictionError::SchemaDriftError(drift)) => {
            assert_eq!(drift.violations.len(), 2);
            assert!(drift.mentions("values[1][3].dcPower"));
            assert!(drift.mentions("meta.range"));
        }
        other => panic!("Expected SchemaDriftError, got {:?}", other),
    }
}

#[test]
fn test_measurement_overrides_forecast_in_any_field() {
    let fx = fixture();
    let transport = MockTransport::new(payload("Europe/Berlin", 80));
    let mut provider = provider(
        &fx,
        config(),
        Box::new(PvForecastAkkudoktor::new(transport)),
        day(),
    );
    provider.update_data(false, false).unwrap();

    provider.update_value(day(), AC_POWER_MEASURED, 1234.0).unwrap();

    let any = provider
        .key_to_array(AC_POWER_ANY, day(), day() + Duration::hours(2))
        .unwrap();
    assert_eq!(any[0], 1234.0);
    assert!((any[1] - (1026.0 + 526.0) * 0.8).abs() < 1e-9);
    assert!(provider.update_value(day(), AC_POWER_ANY, 1.0).is_err());

    let report = report_ac_power_and_measurement(provider.sequence());
    let line = report
        .lines()
        .find(|l| l.starts_with(&format!("Date&Time: {},", day())))
        .unwrap();
    assert_eq!(
        line,
        format!(
            "Date&Time: {}, DC: 1550, AC: 1240, AC sampled: 1234, AC any: 1234",
            day()
        )
    );
    assert_eq!(report.lines().count(), provider.len());
    assert!(report.contains("AC sampled: N/A"));
}

#[test]
fn test_unexpected_fields_are_schema_drift() {
    let fx = fixture();
    let mut body = payload_value("Europe/Berlin", 80);
    body["meta"]["elevation"] = json!(34);
    body["values"][0][5]["snowDepth"] = json!(0.0);
    let transport = MockTransport::new(serde_json::to_vec(&body).unwrap());
    let mut provider = provider(
        &fx,
        config(),
        Box::new(PvForecastAkkudoktor::new(transport)),
        day(),
    );

    match provider.update_data(false, true) {
        Err(PredictionError::SchemaDriftError(drift)) => {
            assert_eq!(drift.violations.len(), 2);
            assert!(drift.mentions("meta.elevation"));
            assert!(drift.mentions("values[0][5].snowDepth"));
        }
        other => panic!("Expected SchemaDriftError, got {:?}", other),
    }
    assert!(provider.is_empty());
}
