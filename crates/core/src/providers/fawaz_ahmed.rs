use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use super::http::{build_client, ensure_positive, get_json, trim_base, DEFAULT_TIMEOUT};
use super::traits::{FiatRateProvider, Provider};
use crate::errors::ProviderError;
use crate::models::price::RatePoint;

const BASE_URL: &str = "https://cdn.jsdelivr.net/npm/@fawazahmed0/currency-api@latest/v1";
const NAME: &str = "Fawaz Ahmed";

/// Fawaz Ahmed currency API, served as static JSON from the jsDelivr CDN.
///
/// No key, no rate limits, daily updates. One file per base currency:
/// `/currencies/usd.json` → `{ "date": "...", "usd": { "eur": 0.92, ... } }`.
/// Codes are lowercase on this API.
pub struct FawazAhmedProvider {
    client: Client,
    base_url: String,
}

impl FawazAhmedProvider {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL, DEFAULT_TIMEOUT)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            base_url: trim_base(base_url),
        }
    }
}

impl Default for FawazAhmedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for FawazAhmedProvider {
    fn name(&self) -> &str {
        NAME
    }
}

#[async_trait]
impl FiatRateProvider for FawazAhmedProvider {
    async fn fetch_rate(&self, from: &str, to: &str) -> Result<RatePoint, ProviderError> {
        let base = from.to_lowercase();
        let target = to.to_lowercase();
        let url = format!("{}/currencies/{base}.json", self.base_url);

        // Keyed by the base code itself, so decode dynamically.
        let resp: Value = get_json(&self.client, NAME, &url, &[]).await?;

        let rate = resp
            .get(&base)
            .and_then(|rates| rates.get(&target))
            .and_then(Value::as_f64)
            .ok_or_else(|| {
                ProviderError::missing_field(NAME, format!("Rate not found for {from}/{to}"))
            })?;

        Ok(RatePoint {
            rate: ensure_positive(NAME, rate, "rate")?,
            timestamp: chrono::Utc::now().timestamp_millis(),
        })
    }
}
