//! # Prediction Store
//!
//! Time-indexed prediction storage for energy forecasts (PV generation,
//! electricity price, household load).
//!
//! ## Features
//!
//! - Datetime-keyed record sequences with upsert, retention and pruning
//! - Fixed-step array projection with per-field aggregation and explicit gap policies
//! - File-backed TTL cache with deterministic fingerprints
//! - Provider lifecycle with staged refreshes and horizon coverage checks
//! - Payload schema validation with per-field drift diagnostics
//! - JSON, CSV and DataFrame import/export
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use prediction_store::{PredictionKind, PredictionSequence, SequenceWindow};
//!
//! # fn main() -> prediction_store::Result<()> {
//! let start = Utc.with_ymd_and_hms(2024, 12, 11, 0, 0, 0).unwrap();
//! let window = SequenceWindow::new(start, 48, 24);
//! let mut sequence = PredictionSequence::for_kind(PredictionKind::Load, window);
//!
//! sequence.update_value(start, "load_mean", 420.0)?;
//! sequence.update_value(start, "load_std", 35.0)?;
//! assert_eq!(sequence.len(), 1);
//!
//! let array = sequence.key_to_array("load_mean", start, sequence.end_datetime())?;
//! assert_eq!(array.len(), 48);
//! assert!(array[1].is_nan());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod interchange;
pub mod logging;
pub mod provider;
pub mod record;
pub mod registry;
pub mod resample;
pub mod schema;
pub mod sequence;
pub mod utils;

// Re-export commonly used types
pub use crate::cache::{CacheFileStore, CacheOrigin, CacheOutcome, CachedFetch, Fingerprint};
pub use crate::config::PredictionConfig;
pub use crate::error::{PredictionError, Result};
pub use crate::provider::{
    is_enabled, ForecastSource, PredictionProvider, ProviderState, UpdateContext, UpdateOutcome,
};
pub use crate::record::{PredictionKind, PredictionRecord, RecordSchema};
pub use crate::registry::{ProviderHandle, ProviderRegistry};
pub use crate::resample::ResampleOptions;
pub use crate::schema::{ObjectShape, PayloadSchema, SchemaDrift, Shape};
pub use crate::sequence::{PredictionSequence, SequenceWindow};
pub use series_math::{Aggregation, FillPolicy};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
