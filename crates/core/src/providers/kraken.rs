use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use super::http::{build_client, get_json, parse_price, trim_base, DEFAULT_TIMEOUT};
use super::symbols::{kraken_symbol, to_fiat_quote};
use super::traits::{CryptoPriceProvider, Provider};
use crate::errors::ProviderError;
use crate::models::price::PricePoint;

const BASE_URL: &str = "https://api.kraken.com";
const NAME: &str = "Kraken";

/// Kraken public ticker (`/0/public/Ticker?pair=XBTUSD`).
///
/// Kraken keeps legacy asset codes (BTC is XBT) and answers with its own pair key
/// (`XXBTZUSD`), so the first entry of `result` is taken whatever its name.
pub struct KrakenProvider {
    client: Client,
    base_url: String,
}

impl KrakenProvider {
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
        format!("{}{}", kraken_symbol(symbol), to_fiat_quote(quote))
    }
}

impl Default for KrakenProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct TickerResponse {
    #[serde(default)]
    error: Vec<String>,
    #[serde(default)]
    result: HashMap<String, TickerInfo>,
}

#[derive(Deserialize)]
struct TickerInfo {
    /// Last trade closed: `[price, lot volume]`.
    c: Vec<String>,
}

impl Provider for KrakenProvider {
    fn name(&self) -> &str {
        NAME
    }
}

#[async_trait]
impl CryptoPriceProvider for KrakenProvider {
    async fn fetch_price(&self, symbol: &str, quote: &str) -> Result<PricePoint, ProviderError> {
        let pair = Self::pair(symbol, quote);
        let url = format!("{}/0/public/Ticker", self.base_url);

        let resp: TickerResponse =
            get_json(&self.client, NAME, &url, &[("pair", pair.clone())]).await?;

        if !resp.error.is_empty() {
            return Err(ProviderError::upstream(NAME, resp.error.join(", ")));
        }

        let last = resp
            .result
            .values()
            .next()
            .and_then(|t| t.c.first())
            .ok_or_else(|| ProviderError::missing_field(NAME, format!("No ticker for {pair}")))?;

        Ok(PricePoint {
            price: parse_price(NAME, last, "price")?,
            timestamp: chrono::Utc::now().timestamp_millis(),
            provider: NAME.to_string(),
        })
    }
}
