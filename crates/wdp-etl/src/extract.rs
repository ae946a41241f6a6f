//! Extract stage
//!
//! Fetches the current observation for each configured city and writes the
//! provider response, unmodified, as one JSON file per city into the raw
//! zone. Provider auth is a plain API-key query parameter; rate limiting
//! and provider-side retries are out of scope. Any fetch or write failure
//! fails the whole stage so the scheduler withholds transform and load.

use std::time::Duration;

use chrono::Utc;
use tracing::info;

use crate::config::ProviderConfig;
use crate::error::{EtlError, Result};
use crate::staging::{StagingStore, RAW_EXTENSION};

/// Outcome of one extract run
#[derive(Debug)]
pub struct ExtractOutcome {
    /// Raw files written, one per city
    pub fetched: usize,
}

/// Extractor over a staging store
pub struct Extractor<S> {
    staging: S,
    config: ProviderConfig,
    api_key: String,
    client: reqwest::Client,
}

impl<S: StagingStore> Extractor<S> {
    /// Build an extractor. Fails when no API key is configured — the
    /// other stages run without one, but extract cannot.
    pub fn new(staging: S, config: ProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| EtlError::config("WDP_API_KEY is required for the extract stage"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;

        Ok(Self {
            staging,
            config,
            api_key,
            client,
        })
    }

    /// Fetch every configured city and stage the responses.
    pub async fn run(&self) -> Result<ExtractOutcome> {
        info!(cities = self.config.cities.len(), "Starting extraction");

        let mut fetched = 0;
        for city in &self.config.cities {
            let body = self.fetch_city(city).await?;
            let name = raw_file_name(city);
            self.staging.write_raw(&name, &body)?;
            info!(city = %city, file = %name, "Staged raw observation");
            fetched += 1;
        }

        info!(fetched, "Extraction completed");
        Ok(ExtractOutcome { fetched })
    }

    async fn fetch_city(&self, city: &str) -> Result<String> {
        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[("q", city), ("appid", &self.api_key)])
            .send()
            .await?
            .error_for_status()?;

        Ok(response.text().await?)
    }
}

/// Raw file name for one city fetch: city slug + UTC timestamp.
fn raw_file_name(city: &str) -> String {
    let slug: String = city
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!(
        "weather_{}_{}.{}",
        slug,
        Utc::now().format("%Y%m%d_%H%M%S"),
        RAW_EXTENSION
    )
}

// ============================================================================
// Tests
// ============================================================================
