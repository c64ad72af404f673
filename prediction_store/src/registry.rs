//! Process-wide provider registry
//!
//! There is one live provider per provider id. Handles are shared
//! `Arc<Mutex<_>>`s, so the lock doubles as the guard against concurrent
//! refreshes of the same provider: [`lock_provider`] waits for a running
//! refresh, [`try_update_data`] rejects instead.
//!
//! The global registry lives until [`ProviderRegistry::reset`] empties it.

use crate::config::PredictionConfig;
use crate::error::{PredictionError, Result};
use crate::provider::{PredictionProvider, UpdateOutcome};
use crate::record::PredictionKind;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use tracing::debug;

/// Shared handle of a registered provider
pub type ProviderHandle = Arc<Mutex<PredictionProvider>>;

static GLOBAL: Lazy<ProviderRegistry> = Lazy::new(ProviderRegistry::new);

/// Lock a provider, waiting for a running refresh to finish
pub fn lock_provider(handle: &ProviderHandle) -> MutexGuard<'_, PredictionProvider> {
    handle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Refresh a provider unless another refresh of it is running
pub fn try_update_data(
    handle: &ProviderHandle,
    force_enable: bool,
    force_update: bool,
) -> Result<UpdateOutcome> {
    let mut provider = match handle.try_lock() {
        Ok(guard) => guard,
        Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        Err(TryLockError::WouldBlock) => {
            return Err(PredictionError::UpdateInProgress(
                "provider is already being updated".to_string(),
            ))
        }
    };
    provider.update_data(force_enable, force_update)
}

/// Registry of providers keyed by provider id
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    providers: Mutex<BTreeMap<String, (PredictionKind, ProviderHandle)>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry
    pub fn global() -> &'static ProviderRegistry {
        &GLOBAL
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, (PredictionKind, ProviderHandle)>> {
        self.providers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Handle registered for `provider_id`, creating it with `make` on first use.
    ///
    /// Every call for the same id returns the same instance.
    pub fn get_or_insert_with<F>(&self, provider_id: &str, make: F) -> ProviderHandle
    where
        F: FnOnce() -> PredictionProvider,
    {
        let mut entries = self.entries();
        if let Some((_, handle)) = entries.get(provider_id) {
            return Arc::clone(handle);
        }
        let provider = make();
        let kind = provider.kind();
        let handle = Arc::new(Mutex::new(provider));
        entries.insert(provider_id.to_string(), (kind, Arc::clone(&handle)));
        debug!("Registered provider {} for {}", provider_id, kind);
        handle
    }

    pub fn get(&self, provider_id: &str) -> Option<ProviderHandle> {
        self.entries()
            .get(provider_id)
            .map(|(_, handle)| Arc::clone(handle))
    }

    /// Registered ids in ascending order
    pub fn provider_ids(&self) -> Vec<String> {
        self.entries().keys().cloned().collect()
    }

    fn handles(&self) -> Vec<(String, PredictionKind, ProviderHandle)> {
        self.entries()
            .iter()
            .map(|(id, (kind, handle))| (id.clone(), *kind, Arc::clone(handle)))
            .collect()
    }

    /// The enabled provider of a kind, if any
    pub fn enabled_provider(&self, kind: PredictionKind) -> Option<ProviderHandle> {
        self.handles()
            .into_iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, handle)| handle)
            .find(|handle| lock_provider(handle).enabled())
    }

    /// Hand a new configuration snapshot to every provider
    pub fn apply_config(&self, config: Arc<PredictionConfig>) {
        for (_, _, handle) in self.handles() {
            lock_provider(&handle).apply_config(Arc::clone(&config));
        }
    }

    /// Move the window start of every provider
    pub fn set_start_datetime(&self, start: DateTime<Utc>) {
        for (_, _, handle) in self.handles() {
            lock_provider(&handle).set_start_datetime(start);
        }
    }

    /// Refresh every provider in id order; the first error stops the run
    pub fn update_all(
        &self,
        force_enable: bool,
        force_update: bool,
    ) -> Result<Vec<(String, UpdateOutcome)>> {
        let mut outcomes = Vec::new();
        for (id, _, handle) in self.handles() {
            let outcome = lock_provider(&handle).update_data(force_enable, force_update)?;
            outcomes.push((id, outcome));
        }
        Ok(outcomes)
    }

    /// Hourly array of `key` from the enabled provider whose schema declares it
    pub fn key_to_array(
        &self,
        key: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<f64>> {
        for (_, _, handle) in self.handles() {
            let provider = lock_provider(&handle);
            if provider.enabled() && provider.schema().contains(key) {
                return provider.key_to_array(key, start, end);
            }
        }
        Err(PredictionError::UnknownField(format!(
            "{} is not served by any enabled provider",
            key
        )))
    }

    /// Drop every registered provider
    pub fn reset(&self) {
        self.entries().clear();
        debug!("Provider registry reset");
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
