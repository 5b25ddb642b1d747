use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::http::{build_client, get_json, parse_price, trim_base, DEFAULT_TIMEOUT};
use super::symbols::to_fiat_quote;
use super::traits::{CryptoPriceProvider, Provider};
use crate::errors::ProviderError;
use crate::models::price::PricePoint;

const BASE_URL: &str = "https://api.coinbase.com";
const NAME: &str = "Coinbase";

/// Coinbase public spot price API (`/v2/prices/{BASE}-{QUOTE}/spot`).
///
/// Quotes are fiat, so a `USDT` quote is asked for as `USD`.
pub struct CoinbaseProvider {
    client: Client,
    base_url: String,
}

impl CoinbaseProvider {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL, DEFAULT_TIMEOUT)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            base_url: trim_base(base_url),
        }
    }

    pub fn pair(symbol: &str, quote: &str) -> String {
        format!("{}-{}", symbol.to_uppercase(), to_fiat_quote(quote))
    }
}

impl Default for CoinbaseProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct SpotResponse {
    data: Option<SpotData>,
}

#[derive(Deserialize)]
struct SpotData {
    amount: Option<String>,
}

impl Provider for CoinbaseProvider {
    fn name(&self) -> &str {
        NAME
    }
}

#[async_trait]
impl CryptoPriceProvider for CoinbaseProvider {
    async fn fetch_price(&self, symbol: &str, quote: &str) -> Result<PricePoint, ProviderError> {
        let pair = Self::pair(symbol, quote);
        let url = format!("{}/v2/prices/{pair}/spot", self.base_url);

        let resp: SpotResponse = get_json(&self.client, NAME, &url, &[]).await?;
        let raw = resp
            .data
            .and_then(|d| d.amount)
            .ok_or_else(|| ProviderError::missing_field(NAME, format!("No amount for {pair}")))?;

        Ok(PricePoint {
            price: parse_price(NAME, &raw, "price")?,
            timestamp: chrono::Utc::now().timestamp_millis(),
            provider: NAME.to_string(),
        })
    }
}
