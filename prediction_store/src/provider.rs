//! Provider lifecycle around a prediction sequence
//!
//! A [`PredictionProvider`] owns one [`PredictionSequence`] and the configuration
//! snapshot it was built from. The provider-specific part (fetching and
//! normalizing an external payload) is a [`ForecastSource`].
//!
//! Refreshes are staged: the source writes into a copy of the sequence that is
//! pruned to the new window, coverage of the horizon is verified, and only then
//! does the copy replace the live sequence. A failing refresh leaves the live
//! sequence exactly as it was.

use crate::cache::CacheFileStore;
use crate::config::PredictionConfig;
use crate::error::{PredictionError, Result};
use crate::record::{PredictionKind, RecordSchema};
use crate::resample::ResampleOptions;
use crate::sequence::{PredictionSequence, SequenceWindow};
use crate::utils;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Provider-specific fetch and normalization
pub trait ForecastSource: Send + fmt::Debug {
    /// Identifier matched against the configured provider selection
    fn provider_id(&self) -> &'static str;

    /// Prediction kind served
    fn kind(&self) -> PredictionKind;

    /// Record schema of the sequence; the base schema of the kind unless extended
    fn schema(&self) -> RecordSchema {
        self.kind().base_schema()
    }

    /// Fetch (through the cache) and merge records into the staged sequence
    fn update_data(&mut self, ctx: &mut UpdateContext<'_>) -> Result<()>;
}

/// What a source sees during one refresh
pub struct UpdateContext<'a> {
    config: &'a PredictionConfig,
    cache: &'a CacheFileStore,
    sequence: &'a mut PredictionSequence,
    force_update: bool,
    fetched: bool,
}

impl<'a> UpdateContext<'a> {
    /// Context over a staged sequence
    pub fn new(
        config: &'a PredictionConfig,
        cache: &'a CacheFileStore,
        sequence: &'a mut PredictionSequence,
        force_update: bool,
    ) -> Self {
        Self {
            config,
            cache,
            sequence,
            force_update,
            fetched: false,
        }
    }

    pub fn config(&self) -> &PredictionConfig {
        self.config
    }

    pub fn cache(&self) -> &CacheFileStore {
        self.cache
    }

    /// Whether the cache must be bypassed
    pub fn force_update(&self) -> bool {
        self.force_update
    }

    pub fn start_datetime(&self) -> DateTime<Utc> {
        self.sequence.start_datetime()
    }

    pub fn end_datetime(&self) -> DateTime<Utc> {
        self.sequence.end_datetime()
    }

    pub fn keep_datetime(&self) -> DateTime<Utc> {
        self.sequence.keep_datetime()
    }

    /// Staged sequence
    pub fn sequence(&self) -> &PredictionSequence {
        self.sequence
    }

    /// Upsert one field of the staged sequence
    pub fn update_value(
        &mut self,
        at: DateTime<Utc>,
        key: &str,
        value: impl Into<Option<f64>>,
    ) -> Result<()> {
        self.sequence.update_value(at, key, value)
    }

    /// Upsert several fields of the staged sequence at one instant
    pub fn update_values<I, K>(&mut self, at: DateTime<Utc>, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, Option<f64>)>,
        K: AsRef<str>,
    {
        self.sequence.update_values(at, values)
    }

    /// Record that the external source was actually contacted
    pub fn mark_fetched(&mut self) {
        self.fetched = true;
    }

    pub fn fetched(&self) -> bool {
        self.fetched
    }
}

/// Lifecycle state of a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    /// Not the provider selected for its kind
    Disabled,
    /// Selected, but no successful refresh for the current window
    Stale,
    /// Selected, and the current window was refreshed successfully
    Fresh,
}

/// Result of [`PredictionProvider::update_data`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Provider disabled and not forced; nothing happened
    Skipped,
    /// Sequence refreshed; `fetched` tells whether the external source was contacted
    Updated { fetched: bool },
}

/// Whether `provider_id` is the provider selected for `kind`
pub fn is_enabled(kind: PredictionKind, provider_id: &str, config: &PredictionConfig) -> bool {
    config.provider_for(kind) == Some(provider_id)
}

/// Stateful controller of one prediction sequence
#[derive(Debug)]
pub struct PredictionProvider {
    source: Box<dyn ForecastSource>,
    config: Arc<PredictionConfig>,
    cache: Arc<CacheFileStore>,
    sequence: PredictionSequence,
    update_datetime: Option<DateTime<Utc>>,
    fresh_window: Option<SequenceWindow>,
}

impl PredictionProvider {
    /// Create a provider whose window starts at the current hour
    pub fn new(
        source: Box<dyn ForecastSource>,
        config: Arc<PredictionConfig>,
        cache: Arc<CacheFileStore>,
    ) -> Self {
        let window = SequenceWindow::new(
            utils::hour_floor(Utc::now()),
            config.prediction.hours,
            config.prediction.historic_hours,
        );
        let sequence = PredictionSequence::new(source.schema(), window);
        Self {
            source,
            config,
            cache,
            sequence,
            update_datetime: None,
            fresh_window: None,
        }
    }

    pub fn provider_id(&self) -> &'static str {
        self.source.provider_id()
    }

    pub fn kind(&self) -> PredictionKind {
        self.source.kind()
    }

    /// Whether this provider is the one selected by its configuration snapshot
    pub fn enabled(&self) -> bool {
        is_enabled(self.kind(), self.provider_id(), &self.config)
    }

    /// Configuration snapshot in use
    pub fn config(&self) -> &Arc<PredictionConfig> {
        &self.config
    }

    /// Swap the configuration snapshot.
    ///
    /// Horizon and retention follow the new snapshot; the start instant stays.
    pub fn apply_config(&mut self, config: Arc<PredictionConfig>) {
        let window = SequenceWindow::new(
            self.sequence.start_datetime(),
            config.prediction.hours,
            config.prediction.historic_hours,
        );
        self.sequence.set_window(window);
        self.config = config;
        debug!(
            "{} configuration swapped (enabled = {})",
            self.provider_id(),
            self.enabled()
        );
    }

    /// Move the window start; data becomes stale until the next refresh
    pub fn set_start_datetime(&mut self, start: DateTime<Utc>) {
        let window = self.sequence.window().with_start(start);
        self.sequence.set_window(window);
    }

    pub fn start_datetime(&self) -> DateTime<Utc> {
        self.sequence.start_datetime()
    }

    pub fn end_datetime(&self) -> DateTime<Utc> {
        self.sequence.end_datetime()
    }

    pub fn keep_datetime(&self) -> DateTime<Utc> {
        self.sequence.keep_datetime()
    }

    /// Instant of the last successful refresh
    pub fn update_datetime(&self) -> Option<DateTime<Utc>> {
        self.update_datetime
    }

    pub fn state(&self) -> ProviderState {
        if !self.enabled() {
            ProviderState::Disabled
        } else if self.fresh_window == Some(self.sequence.window()) {
            ProviderState::Fresh
        } else {
            ProviderState::Stale
        }
    }

    /// Refresh the sequence from the source.
    ///
    /// Does nothing when the provider is disabled and `force_enable` is not set.
    /// `force_update` bypasses the fetch cache.
    pub fn update_data(&mut self, force_enable: bool, force_update: bool) -> Result<UpdateOutcome> {
        if !self.enabled() && !force_enable {
            debug!("{} is disabled, update skipped", self.provider_id());
            return Ok(UpdateOutcome::Skipped);
        }

        let mut staged = self.sequence.clone();
        let pruned = staged.prune();
        if pruned > 0 {
            debug!("{} pruned {} records before {}", self.provider_id(), pruned, staged.keep_datetime());
        }

        let mut ctx = UpdateContext::new(&self.config, &self.cache, &mut staged, force_update);
        self.source.update_data(&mut ctx)?;
        let fetched = ctx.fetched();

        self.check_coverage(&staged)?;

        self.sequence = staged;
        self.update_datetime = Some(Utc::now());
        self.fresh_window = Some(self.sequence.window());
        info!(
            "{} updated {} records for {} .. {} (fetched = {})",
            self.provider_id(),
            self.sequence.len(),
            self.sequence.start_datetime(),
            self.sequence.end_datetime(),
            fetched
        );
        Ok(UpdateOutcome::Updated { fetched })
    }

    fn check_coverage(&self, staged: &PredictionSequence) -> Result<()> {
        let required = staged.total_hours() as usize;
        let covered = staged.hours_covered(staged.start_datetime(), staged.end_datetime());
        if covered < required {
            let message = format!(
                "The forecast must cover at least {} hours, but only {} hours starting from {} were predicted.",
                required,
                covered,
                staged.start_datetime()
            );
            error!("{}: {}", self.provider_id(), message);
            return Err(PredictionError::DataShortageError(message));
        }
        Ok(())
    }

    /// Upsert one field of the live sequence, e.g. a measurement
    pub fn update_value(
        &mut self,
        at: DateTime<Utc>,
        key: &str,
        value: impl Into<Option<f64>>,
    ) -> Result<()> {
        self.sequence.update_value(at, key, value)
    }

    /// Hourly array of a field over `[start, end)`, NaN marking gaps
    pub fn key_to_array(&self, key: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<f64>> {
        self.sequence.key_to_array(key, start, end)
    }

    pub fn key_to_array_with(
        &self,
        key: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        options: &ResampleOptions,
    ) -> Result<Vec<f64>> {
        self.sequence.key_to_array_with(key, start, end, options)
    }

    /// Gap-free hourly array over the horizon; a gap is a `DataShortageError`
    pub fn key_to_dense_array(&self, key: &str) -> Result<Vec<f64>> {
        self.sequence.key_to_dense_array(
            key,
            self.start_datetime(),
            self.end_datetime(),
            &ResampleOptions::default(),
        )
    }

    pub fn sequence(&self) -> &PredictionSequence {
        &self.sequence
    }

    pub fn schema(&self) -> &RecordSchema {
        self.sequence.schema()
    }

    /// Number of distinct instants held
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn total_hours(&self) -> u32 {
        self.sequence.total_hours()
    }
}
