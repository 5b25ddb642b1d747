use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::http::{build_client, ensure_positive, get_json, trim_base, DEFAULT_TIMEOUT};
use super::traits::{CurrencyListProvider, FiatRateProvider, Provider};
use crate::errors::ProviderError;
use crate::models::asset::CurrencyInfo;
use crate::models::price::RatePoint;

const BASE_URL: &str = "https://v6.exchangerate-api.com/v6";
const NAME: &str = "ExchangeRate-API";

/// ExchangeRate-API v6.
///
/// - **Requires**: API key (set via settings as "exchange_rate_api" or the
///   `EXCHANGE_RATE_API_KEY` environment variable).
/// - **Endpoints**: `/{key}/pair/{from}/{to}`, `/{key}/codes`
///
/// The key travels in the path, so error messages never include the URL.
/// Failures come back as HTTP 200 with `"result": "error"`.
pub struct ExchangeRateApiProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ExchangeRateApiProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(BASE_URL, api_key, DEFAULT_TIMEOUT)
    }

    pub fn with_base_url(base_url: &str, api_key: String, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            base_url: trim_base(base_url),
            api_key,
        }
    }
}

#[derive(Deserialize)]
struct PairResponse {
    result: String,
    conversion_rate: Option<f64>,
    time_last_update_unix: Option<i64>,
    #[serde(rename = "error-type")]
    error_type: Option<String>,
}

#[derive(Deserialize)]
struct CodesResponse {
    result: String,
    #[serde(default)]
    supported_codes: Vec<(String, String)>,
    #[serde(rename = "error-type")]
    error_type: Option<String>,
}

fn upstream_error(error_type: Option<String>, fallback: &str) -> ProviderError {
    ProviderError::upstream(NAME, error_type.unwrap_or_else(|| fallback.to_string()))
}

impl Provider for ExchangeRateApiProvider {
    fn name(&self) -> &str {
        NAME
    }
}

#[async_trait]
impl FiatRateProvider for ExchangeRateApiProvider {
    async fn fetch_rate(&self, from: &str, to: &str) -> Result<RatePoint, ProviderError> {
        let url = format!(
            "{}/{}/pair/{}/{}",
            self.base_url,
            self.api_key,
            from.to_uppercase(),
            to.to_uppercase()
        );
        let resp: PairResponse = get_json(&self.client, NAME, &url, &[]).await?;

        if resp.result != "success" {
            return Err(upstream_error(resp.error_type, "Failed to fetch rate"));
        }

        let rate = resp.conversion_rate.ok_or_else(|| {
            ProviderError::missing_field(NAME, format!("No conversion_rate for {from}/{to}"))
        })?;

        // The API reports seconds; normalize to milliseconds like every other source.
        let timestamp = resp
            .time_last_update_unix
            .map(|secs| secs * 1000)
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());

        Ok(RatePoint {
            rate: ensure_positive(NAME, rate, "rate")?,
            timestamp,
        })
    }
}

#[async_trait]
impl CurrencyListProvider for ExchangeRateApiProvider {
    /// `supported_codes: [["AED", "UAE Dirham"], ...]`
    async fn fetch_currencies(&self) -> Result<Vec<CurrencyInfo>, ProviderError> {
        let url = format!("{}/{}/codes", self.base_url, self.api_key);
        let resp: CodesResponse = get_json(&self.client, NAME, &url, &[]).await?;

        if resp.result != "success" {
            return Err(upstream_error(resp.error_type, "Failed to fetch codes"));
        }
        if resp.supported_codes.is_empty() {
            return Err(ProviderError::missing_field(NAME, "Empty supported_codes"));
        }

        Ok(resp
            .supported_codes
            .into_iter()
            .map(|(code, name)| CurrencyInfo::new(code, name))
            .collect())
    }
}
