#![allow(dead_code)]

use chrono::{DateTime, Utc};
use prediction_providers::HttpTransport;
use prediction_store::{
    CacheFileStore, ForecastSource, PredictionConfig, PredictionError, PredictionProvider, Result,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Transport answering every GET with a canned body
#[derive(Debug)]
pub struct MockTransport {
    body: Mutex<std::result::Result<Vec<u8>, String>>,
    calls: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new(body: impl Into<Vec<u8>>) -> Arc<Self> {
        Arc::new(Self {
            body: Mutex::new(Ok(body.into())),
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            body: Mutex::new(Err(message.to_string())),
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        })
    }

    pub fn set_body(&self, body: impl Into<Vec<u8>>) {
        *self.body.lock().unwrap() = Ok(body.into());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_url(&self) -> Option<String> {
        self.urls.lock().unwrap().last().cloned()
    }
}

impl HttpTransport for MockTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());
        self.body
            .lock()
            .unwrap()
            .clone()
            .map_err(PredictionError::TransportError)
    }
}

pub struct Fixture {
    pub dir: TempDir,
    pub cache: Arc<CacheFileStore>,
}

pub fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let cache = Arc::new(CacheFileStore::open(dir.path().join("cache")).unwrap());
    Fixture { dir, cache }
}

pub fn provider(
    fx: &Fixture,
    config: PredictionConfig,
    source: Box<dyn ForecastSource>,
    start: DateTime<Utc>,
) -> PredictionProvider {
    let mut provider = PredictionProvider::new(source, Arc::new(config), Arc::clone(&fx.cache));
    provider.set_start_datetime(start);
    provider
}
