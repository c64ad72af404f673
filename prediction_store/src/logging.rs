//! Tracing initialization

use std::sync::Once;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "PREDICTION_LOG";

/// Filter used when `PREDICTION_LOG` is unset or invalid
pub const DEFAULT_FILTER: &str = "prediction_store=info,prediction_providers=info";

/// Install the global fmt subscriber.
///
/// Reads per-target levels from `PREDICTION_LOG`, e.g.
/// `PREDICTION_LOG=prediction_store::cache=debug,prediction_providers=warn`.
/// Only the first call has an effect.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let installed = tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_line_number(true))
            .with(filter)
            .try_init();

        if installed.is_err() {
            tracing::debug!("A global tracing subscriber is already installed");
        }
    });
}
