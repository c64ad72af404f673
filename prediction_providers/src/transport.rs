//! Blocking HTTP transport seam
//!
//! Sources fetch through [`HttpTransport`] so tests can substitute a canned
//! transport for the network.

use prediction_store::Result;
use std::fmt;

/// Request timeout of the reqwest transport
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Single-shot HTTP GET returning the response body
pub trait HttpTransport: Send + Sync + fmt::Debug {
    /// Fetch `url`; non-success status codes are transport errors
    fn get(&self, url: &str) -> Result<Vec<u8>>;
}

#[cfg(feature = "http")]
pub use self::reqwest_transport::ReqwestTransport;

#[cfg(feature = "http")]
mod reqwest_transport {
    use super::{HttpTransport, DEFAULT_TIMEOUT_SECS};
    use prediction_store::{PredictionError, Result};
    use std::time::Duration;
    use tracing::debug;

    fn transport_err(e: reqwest::Error) -> PredictionError {
        PredictionError::TransportError(e.to_string())
    }

    /// reqwest blocking client with timeout and gzip
    #[derive(Debug, Clone)]
    pub struct ReqwestTransport {
        client: reqwest::blocking::Client,
    }

    impl ReqwestTransport {
        pub fn new() -> Result<Self> {
            Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        }

        pub fn with_timeout(timeout: Duration) -> Result<Self> {
            let client = reqwest::blocking::Client::builder()
                .timeout(timeout)
                .gzip(true)
                .build()
                .map_err(transport_err)?;
            Ok(Self { client })
        }
    }

    impl HttpTransport for ReqwestTransport {
        fn get(&self, url: &str) -> Result<Vec<u8>> {
            debug!("GET {}", url);
            let response = self.client.get(url).send().map_err(transport_err)?;
            let status = response.status();
            if !status.is_success() {
                return Err(PredictionError::TransportError(format!(
                    "HTTP {} from {}",
                    status, url
                )));
            }
            let body = response.bytes().map_err(transport_err)?;
            Ok(body.to_vec())
        }
    }
}
