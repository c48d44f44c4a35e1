//! Reading fetcher: one GET against the Nightscout endpoint per call.

use std::future::Future;
use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::StatusCode;
use tracing::debug;

use crate::endpoint::Endpoint;
use crate::error::FetchError;
use crate::models::{parse_entries, Reading};

// ---

/// Anything that can produce the current reading.
///
/// The scheduler is generic over this so tests can substitute a scripted
/// source for the HTTP client.
pub trait ReadingSource: Send + Sync + 'static {
    fn fetch(&self) -> impl Future<Output = Result<Reading, FetchError>> + Send;
}

/// HTTP client for the Nightscout `current.json` endpoint.
///
/// No retries: a failed call is reported and the next scheduled tick is the
/// retry.
#[derive(Debug, Clone)]
pub struct NightscoutClient {
    // ---
    client: reqwest::Client,
    endpoint: Endpoint,
}

impl NightscoutClient {
    pub fn new(endpoint: Endpoint, timeout: Duration) -> Result<Self> {
        // ---
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(NightscoutClient { client, endpoint })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Fetch and validate the current reading.
    pub async fn fetch_current(&self) -> Result<Reading, FetchError> {
        // ---
        debug!("Fetching current entry from: {}", self.endpoint.redacted_url());

        let response = self
            .client
            .get(self.endpoint.request_url())
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            debug!("Endpoint answered with status {}", status);
            return Err(FetchError::BadStatus(status.as_u16()));
        }

        let body = response.text().await?;
        debug!("Raw response: {}", body);

        let reading = parse_entries(&body)?;
        debug!(
            "Parsed reading: sgv={} delta={} at {} ({})",
            reading.sgv,
            reading.delta,
            reading.timestamp,
            reading.direction.code()
        );
        Ok(reading)
    }
}

impl ReadingSource for NightscoutClient {
    fn fetch(&self) -> impl Future<Output = Result<Reading, FetchError>> + Send {
        self.fetch_current()
    }
}
