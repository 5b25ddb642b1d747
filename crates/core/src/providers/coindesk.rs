use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use super::http::{build_client, ensure_positive, get_json, trim_base, DEFAULT_TIMEOUT};
use super::symbols::to_fiat_quote;
use super::traits::{CryptoPriceProvider, Provider};
use crate::errors::ProviderError;
use crate::models::price::PricePoint;

const BASE_URL: &str = "https://api.coindesk.com";
const NAME: &str = "CoinDesk";

/// CoinDesk Bitcoin Price Index. BTC only; the fallback of last resort.
pub struct CoinDeskProvider {
    client: Client,
    base_url: String,
}

impl CoinDeskProvider {
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

impl Default for CoinDeskProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct CurrentPriceResponse {
    time: Option<BpiTime>,
    #[serde(default)]
    bpi: HashMap<String, BpiEntry>,
}

#[derive(Deserialize)]
struct BpiTime {
    #[serde(rename = "updatedISO")]
    updated_iso: Option<String>,
}

#[derive(Deserialize)]
struct BpiEntry {
    rate_float: Option<f64>,
}

impl Provider for CoinDeskProvider {
    fn name(&self) -> &str {
        NAME
    }
}

#[async_trait]
impl CryptoPriceProvider for CoinDeskProvider {
    async fn fetch_price(&self, symbol: &str, quote: &str) -> Result<PricePoint, ProviderError> {
        if !symbol.eq_ignore_ascii_case("BTC") {
            return Err(ProviderError::unsupported(NAME, "CoinDesk only supports BTC"));
        }

        let quote = to_fiat_quote(quote);
        let url = format!("{}/v1/bpi/currentprice.json", self.base_url);
        let resp: CurrentPriceResponse = get_json(&self.client, NAME, &url, &[]).await?;

        let price = resp
            .bpi
            .get(&quote)
            .and_then(|e| e.rate_float)
            .ok_or_else(|| ProviderError::missing_field(NAME, format!("{quote} not available")))?;

        let timestamp = resp
            .time
            .and_then(|t| t.updated_iso)
            .and_then(|iso| chrono::DateTime::parse_from_rfc3339(&iso).ok())
            .map(|dt| dt.timestamp_millis())
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());

        Ok(PricePoint {
            price: ensure_positive(NAME, price, "price")?,
            timestamp,
            provider: NAME.to_string(),
        })
    }
}
