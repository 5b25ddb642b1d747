use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use super::http::{build_client, get_json, parse_price, trim_base, DEFAULT_TIMEOUT};
use super::symbols::{to_stablecoin_quote, BRIDGE_QUOTE};
use super::traits::{CryptoListProvider, CryptoPriceProvider, HistoryProvider, Provider};
use crate::errors::ProviderError;
use crate::models::asset::CryptoAsset;
use crate::models::price::{HistoryPoint, PricePoint};

const BASE_URL: &str = "https://api.binance.com";
const NAME: &str = "Binance";

/// Binance caps `limit` on klines at 1000 candles.
const MAX_KLINES: u32 = 1000;

/// Binance public REST API.
///
/// - **Free**: no API key for market data.
/// - **Endpoints**: `/api/v3/ticker/price`, `/api/v3/klines`, `/api/v3/exchangeInfo`
///
/// Binance only lists stablecoin pairs, so a `USD` quote is asked for as `USDT`.
/// Some jurisdictions receive HTTP 451 here; that is an ordinary failure and the
/// chain moves on.
pub struct BinanceProvider {
    client: Client,
    base_url: String,
}

impl BinanceProvider {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL, DEFAULT_TIMEOUT)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            base_url: trim_base(base_url),
        }
    }

    /// Exchange pair for a symbol/quote, e.g. (`btc`, `USD`) → `BTCUSDT`.
    pub fn pair(symbol: &str, quote: &str) -> String {
        format!("{}{}", symbol.to_uppercase(), to_stablecoin_quote(quote))
    }

    /// Candle interval and count for a history window of `days`.
    /// Hourly candles up to a month, daily beyond.
    pub fn kline_params(days: u32) -> (&'static str, u32) {
        let (interval, limit) = if days > 30 {
            ("1d", days)
        } else {
            ("1h", days.saturating_mul(24))
        };
        (interval, limit.min(MAX_KLINES))
    }
}

impl Default for BinanceProvider {
    fn default() -> Self {
        Self::new()
    }
}

// ── Binance API response types ──────────────────────────────────────

#[derive(Deserialize)]
struct TickerPrice {
    price: Option<String>,
}

#[derive(Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SymbolInfo {
    symbol: String,
    status: String,
    base_asset: String,
    quote_asset: String,
}

/// Kline rows are heterogeneous arrays: `[openTime, open, high, low, close, volume, ...]`.
fn parse_kline(row: &[Value]) -> Result<HistoryPoint, ProviderError> {
    let timestamp = row
        .first()
        .and_then(Value::as_i64)
        .ok_or_else(|| ProviderError::missing_field(NAME, "Kline without open time"))?;
    let close = row
        .get(4)
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::missing_field(NAME, "Kline without close price"))?;
    Ok(HistoryPoint {
        timestamp,
        price: parse_price(NAME, close, "close price")?,
    })
}

impl Provider for BinanceProvider {
    fn name(&self) -> &str {
        NAME
    }
}

#[async_trait]
impl CryptoPriceProvider for BinanceProvider {
    async fn fetch_price(&self, symbol: &str, quote: &str) -> Result<PricePoint, ProviderError> {
        let pair = Self::pair(symbol, quote);
        let url = format!("{}/api/v3/ticker/price", self.base_url);

        let resp: TickerPrice =
            get_json(&self.client, NAME, &url, &[("symbol", pair.clone())]).await?;

        let raw = resp
            .price
            .ok_or_else(|| ProviderError::missing_field(NAME, format!("No price for {pair}")))?;

        Ok(PricePoint {
            price: parse_price(NAME, &raw, "price")?,
            timestamp: chrono::Utc::now().timestamp_millis(),
            provider: NAME.to_string(),
        })
    }
}

#[async_trait]
impl HistoryProvider for BinanceProvider {
    async fn fetch_history(
        &self,
        symbol: &str,
        quote: &str,
        days: u32,
    ) -> Result<Vec<HistoryPoint>, ProviderError> {
        let pair = Self::pair(symbol, quote);
        let (interval, limit) = Self::kline_params(days);
        let url = format!("{}/api/v3/klines", self.base_url);

        let rows: Vec<Vec<Value>> = get_json(
            &self.client,
            NAME,
            &url,
            &[
                ("symbol", pair),
                ("interval", interval.to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await?;

        if rows.is_empty() {
            return Err(ProviderError::missing_field(NAME, "Empty price series"));
        }
        rows.iter().map(|row| parse_kline(row)).collect()
    }
}

#[async_trait]
impl CryptoListProvider for BinanceProvider {
    /// Base assets of every actively trading USDT pair, first listing wins.
    async fn fetch_cryptos(&self) -> Result<Vec<CryptoAsset>, ProviderError> {
        let url = format!("{}/api/v3/exchangeInfo", self.base_url);
        let info: ExchangeInfo = get_json(&self.client, NAME, &url, &[]).await?;

        let mut seen = std::collections::HashSet::new();
        let cryptos: Vec<CryptoAsset> = info
            .symbols
            .into_iter()
            .filter(|s| s.quote_asset == BRIDGE_QUOTE && s.status == "TRADING")
            .filter(|s| seen.insert(s.base_asset.clone()))
            .map(|s| CryptoAsset {
                name: s.base_asset.clone(),
                symbol: s.base_asset,
                trading_symbol: Some(s.symbol),
            })
            .collect();

        if cryptos.is_empty() {
            return Err(ProviderError::missing_field(NAME, "No trading USDT pairs listed"));
        }
        Ok(cryptos)
    }
}
