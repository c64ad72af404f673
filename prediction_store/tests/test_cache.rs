use chrono::{Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use prediction_store::{
    CacheFileStore, CacheOrigin, CachedFetch, Fingerprint, PredictionError,
};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fs;
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Query {
    zone: String,
    days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Payload {
    prices: Vec<f64>,
}

fn query_fingerprint(query: &Query) -> Fingerprint {
    Fingerprint::builder("fetch_prices")
        .arg("zone", &query.zone)
        .arg("days", query.days)
        .build()
}

fn store() -> (TempDir, CacheFileStore) {
    let dir = TempDir::new().unwrap();
    let store = CacheFileStore::open(dir.path().join("cache")).unwrap();
    (dir, store)
}

fn entry_path(store: &CacheFileStore, key: &Fingerprint) -> std::path::PathBuf {
    store.directory().join(format!("{}.json", key.as_str()))
}

#[test]
fn test_repeated_call_within_ttl_fetches_once() {
    let (_dir, store) = store();
    let cached = CachedFetch::new(Duration::hours(1), query_fingerprint);
    let query = Query { zone: "DE-LU".to_string(), days: 2 };
    let calls = Cell::new(0);

    let fetch = |_: &Query| {
        calls.set(calls.get() + 1);
        Ok(Payload { prices: vec![1.0, 2.0] })
    };

    let first = cached.call(&store, &query, false, fetch).unwrap();
    let second = cached.call(&store, &query, false, fetch).unwrap();

    assert_eq!(calls.get(), 1);
    assert_eq!(first.origin, CacheOrigin::Miss);
    assert_eq!(second.origin, CacheOrigin::Hit);
    assert_eq!(first.value, second.value);
    assert!(!second.is_fresh());
}

#[test]
fn test_force_update_always_fetches() {
    let (_dir, store) = store();
    let cached = CachedFetch::new(Duration::hours(1), query_fingerprint);
    let query = Query { zone: "DE-LU".to_string(), days: 2 };
    let calls = Cell::new(0);

    for expected in 1..=2 {
        let outcome = cached
            .call(&store, &query, true, |_| {
                calls.set(calls.get() + 1);
                Ok(Payload { prices: vec![expected as f64] })
            })
            .unwrap();
        assert_eq!(outcome.origin, CacheOrigin::Forced);
    }
    assert_eq!(calls.get(), 2);

    let stored: Payload = store.get(&cached.fingerprint(&query)).unwrap();
    assert_eq!(stored.prices, vec![2.0]);
}

#[test]
fn test_distinct_arguments_get_distinct_entries() {
    let (_dir, store) = store();
    let cached = CachedFetch::new(Duration::hours(1), query_fingerprint);
    let calls = Cell::new(0);

    for zone in ["DE-LU", "AT", "DE-LU"] {
        let query = Query { zone: zone.to_string(), days: 1 };
        cached
            .call(&store, &query, false, |q| {
                calls.set(calls.get() + 1);
                Ok(Payload { prices: vec![q.zone.len() as f64] })
            })
            .unwrap();
    }

    assert_eq!(calls.get(), 2);
    assert_eq!(store.len(), 2);
}

#[test]
fn test_expired_entry_is_a_miss() {
    let (_dir, store) = store();
    let key = Fingerprint::builder("f").arg("x", 1).build();
    let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    store
        .create_at(&key, &vec![1.0, 2.0], Duration::minutes(30), created)
        .unwrap();

    let fresh: Option<Vec<f64>> = store.get_at(&key, created + Duration::minutes(29));
    let stale: Option<Vec<f64>> = store.get_at(&key, created + Duration::minutes(30));
    assert_eq!(fresh, Some(vec![1.0, 2.0]));
    assert_eq!(stale, None);
}

#[test]
fn test_corrupted_entry_is_a_miss_and_repaired() {
    let (_dir, store) = store();
    let cached = CachedFetch::new(Duration::hours(1), query_fingerprint);
    let query = Query { zone: "DE-LU".to_string(), days: 2 };
    let key = cached.fingerprint(&query);
    fs::write(entry_path(&store, &key), b"{\"key\": \"trunc").unwrap();

    let calls = Cell::new(0);
    let outcome = cached
        .call(&store, &query, false, |_| {
            calls.set(calls.get() + 1);
            Ok(Payload { prices: vec![3.0] })
        })
        .unwrap();

    assert_eq!(calls.get(), 1);
    assert_eq!(outcome.origin, CacheOrigin::Miss);
    let repaired: Payload = store.get(&key).unwrap();
    assert_eq!(repaired.prices, vec![3.0]);
}

#[test]
fn test_entry_of_wrong_type_is_a_miss() {
    let (_dir, store) = store();
    let key = Fingerprint::builder("f").build();
    store.create(&key, &"not a payload", Duration::hours(1)).unwrap();

    let read: Option<Payload> = store.get(&key);
    assert_eq!(read, None);
}

#[test]
fn test_fetch_error_leaves_cache_untouched() {
    let (_dir, store) = store();
    let cached = CachedFetch::new(Duration::hours(1), query_fingerprint);
    let query = Query { zone: "DE-LU".to_string(), days: 2 };

    let result = cached.call(&store, &query, false, |_| -> prediction_store::Result<Payload> {
        Err(PredictionError::TransportError("connection refused".to_string()))
    });

    assert!(matches!(result, Err(PredictionError::TransportError(_))));
    assert!(store.is_empty());
}

#[test]
fn test_clear_expired_and_all() {
    let (_dir, store) = store();
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    let old = Fingerprint::builder("f").arg("n", 1).build();
    let live = Fingerprint::builder("f").arg("n", 2).build();

    store.create_at(&old, &1, Duration::hours(1), now - Duration::hours(2)).unwrap();
    store.create_at(&live, &2, Duration::hours(1), now).unwrap();
    fs::write(store.directory().join("garbage.json"), b"???").unwrap();

    assert_eq!(store.clear_at(false, now).unwrap(), 2);
    assert_eq!(store.len(), 1);
    assert_eq!(store.get_at::<i32>(&live, now), Some(2));

    assert_eq!(store.clear(true).unwrap(), 1);
    assert!(store.is_empty());
}

#[test]
fn test_create_overwrites_and_remove() {
    let (_dir, store) = store();
    let key = Fingerprint::from_args("f", &("DE-LU", 2)).unwrap();

    store.create(&key, &1, Duration::hours(1)).unwrap();
    store.create(&key, &2, Duration::hours(1)).unwrap();
    assert_eq!(store.get::<i32>(&key), Some(2));
    assert_eq!(store.len(), 1);

    assert!(store.remove(&key).unwrap());
    assert!(!store.remove(&key).unwrap());
}

#[test]
fn test_non_positive_ttl_is_rejected() {
    let (_dir, store) = store();
    let key = Fingerprint::builder("f").build();

    let result = store.create(&key, &1, Duration::zero());
    assert!(matches!(result, Err(PredictionError::InvalidParameter(_))));
}

#[test]
fn test_concurrent_writers_on_shared_directory() {
    let (_dir, first) = store();
    let second = CacheFileStore::open(first.directory()).unwrap();
    let key = Fingerprint::builder("fetch_prices").arg("zone", "DE-LU").build();

    std::thread::scope(|scope| {
        for (writer, cache) in [&first, &second, &first, &second].into_iter().enumerate() {
            let key = &key;
            scope.spawn(move || {
                for round in 0..25 {
                    let payload = Payload {
                        prices: vec![writer as f64; 64 + round],
                    };
                    cache.create(key, &payload, Duration::hours(1)).unwrap();
                }
            });
        }
    });

    let stored: Payload = second.get(&key).unwrap();
    assert!(stored.prices.len() >= 64);
    assert!(stored.prices.iter().all(|p| *p == stored.prices[0]));
    assert_eq!(first.len(), 1);

    let leftovers = fs::read_dir(first.directory())
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .file_name()
                .to_string_lossy()
                .ends_with(".tmp")
        })
        .count();
    assert_eq!(leftovers, 0);
}
