use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::http::{build_client, ensure_positive, get_json, trim_base, DEFAULT_TIMEOUT};
use super::symbols::{coingecko_id, to_fiat_quote};
use super::traits::{
    CryptoListProvider, CryptoPriceProvider, HistoryProvider, MarketDataProvider, Provider,
};
use crate::errors::ProviderError;
use crate::models::asset::CryptoAsset;
use crate::models::price::{HistoryPoint, MarketSnapshot, PricePoint};

const BASE_URL: &str = "https://api.coingecko.com/api/v3";
const NAME: &str = "CoinGecko";

/// Size of the market-cap ranked list used as "supported cryptos".
const MARKETS_PAGE_SIZE: u32 = 100;

/// CoinGecko public API.
///
/// - **Free tier**: 10–30 calls/minute, so this adapter leans on the cache.
/// - **Ids**: CoinGecko addresses coins by slug (`bitcoin`), not ticker. Only symbols
///   in the static table are priced here; others fail before any request is made.
pub struct CoinGeckoProvider {
    client: Client,
    base_url: String,
}

impl CoinGeckoProvider {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL, DEFAULT_TIMEOUT)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            base_url: trim_base(base_url),
        }
    }

    /// Resolve a ticker like "BTC" to a CoinGecko id like "bitcoin".
    pub fn resolve_id(&self, symbol: &str) -> Result<&'static str, ProviderError> {
        coingecko_id(symbol)
            .ok_or_else(|| ProviderError::unsupported(NAME, format!("No mapping for {symbol}")))
    }
}

impl Default for CoinGeckoProvider {
    fn default() -> Self {
        Self::new()
    }
}

// ── CoinGecko API response types ────────────────────────────────────

/// `{ "bitcoin": { "usd": 61000.0, "last_updated_at": 1700000000 } }`
type SimplePriceResponse = HashMap<String, HashMap<String, f64>>;

#[derive(Deserialize)]
struct MarketChartResponse {
    prices: Vec<[f64; 2]>,
}

#[derive(Deserialize)]
struct MarketEntry {
    id: String,
    symbol: String,
    name: String,
    current_price: Option<f64>,
    price_change_percentage_24h: Option<f64>,
    market_cap: Option<f64>,
    total_volume: Option<f64>,
}

impl Provider for CoinGeckoProvider {
    fn name(&self) -> &str {
        NAME
    }
}

#[async_trait]
impl CryptoPriceProvider for CoinGeckoProvider {
    async fn fetch_price(&self, symbol: &str, quote: &str) -> Result<PricePoint, ProviderError> {
        let id = self.resolve_id(symbol)?;
        let vs = to_fiat_quote(quote).to_lowercase();
        let url = format!("{}/simple/price", self.base_url);

        let resp: SimplePriceResponse = get_json(
            &self.client,
            NAME,
            &url,
            &[
                ("ids", id.to_string()),
                ("vs_currencies", vs.clone()),
                ("include_last_updated_at", "true".to_string()),
            ],
        )
        .await?;

        let coin = resp
            .get(id)
            .ok_or_else(|| ProviderError::missing_field(NAME, format!("Coin not found: {id}")))?;
        let price = coin.get(&vs).copied().ok_or_else(|| {
            ProviderError::missing_field(NAME, format!("No {vs} price for {id}"))
        })?;

        let timestamp = coin
            .get("last_updated_at")
            .map(|secs| (*secs as i64) * 1000)
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());

        Ok(PricePoint {
            price: ensure_positive(NAME, price, "price")?,
            timestamp,
            provider: NAME.to_string(),
        })
    }
}

#[async_trait]
impl HistoryProvider for CoinGeckoProvider {
    async fn fetch_history(
        &self,
        symbol: &str,
        quote: &str,
        days: u32,
    ) -> Result<Vec<HistoryPoint>, ProviderError> {
        let id = self.resolve_id(symbol)?;
        let vs = to_fiat_quote(quote).to_lowercase();
        let url = format!("{}/coins/{id}/market_chart", self.base_url);

        let resp: MarketChartResponse = get_json(
            &self.client,
            NAME,
            &url,
            &[("vs_currency", vs), ("days", days.to_string())],
        )
        .await?;

        if resp.prices.is_empty() {
            return Err(ProviderError::missing_field(NAME, "Empty price series"));
        }
        resp.prices
            .iter()
            .map(|[ts, price]| {
                Ok(HistoryPoint {
                    timestamp: *ts as i64,
                    price: ensure_positive(NAME, *price, "price")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl CryptoListProvider for CoinGeckoProvider {
    /// Top coins by market cap rather than the full (huge) coin list.
    async fn fetch_cryptos(&self) -> Result<Vec<CryptoAsset>, ProviderError> {
        let url = format!("{}/coins/markets", self.base_url);
        let entries: Vec<MarketEntry> = get_json(
            &self.client,
            NAME,
            &url,
            &[
                ("vs_currency", "usd".to_string()),
                ("order", "market_cap_desc".to_string()),
                ("per_page", MARKETS_PAGE_SIZE.to_string()),
                ("page", "1".to_string()),
                ("sparkline", "false".to_string()),
            ],
        )
        .await?;

        if entries.is_empty() {
            return Err(ProviderError::missing_field(NAME, "Empty markets list"));
        }

        Ok(entries
            .into_iter()
            .map(|e| CryptoAsset {
                symbol: e.symbol.to_uppercase(),
                name: e.name,
                trading_symbol: None,
            })
            .collect())
    }
}

#[async_trait]
impl MarketDataProvider for CoinGeckoProvider {
    /// `/coins/markets` for the mapped ids. Coins reported without a price or a 24h
    /// change are left out.
    async fn fetch_markets(&self, symbols: &[String]) -> Result<Vec<MarketSnapshot>, ProviderError> {
        let ids: Vec<&'static str> = symbols.iter().filter_map(|s| coingecko_id(s)).collect();
        if ids.is_empty() {
            return Err(ProviderError::unsupported(
                NAME,
                format!("No mapping for any of {}", symbols.join(", ")),
            ));
        }

        let url = format!("{}/coins/markets", self.base_url);
        let entries: Vec<MarketEntry> = get_json(
            &self.client,
            NAME,
            &url,
            &[
                ("vs_currency", "usd".to_string()),
                ("ids", ids.join(",")),
                ("order", "market_cap_desc".to_string()),
                ("sparkline", "false".to_string()),
                ("price_change_percentage", "24h".to_string()),
            ],
        )
        .await?;

        let mut snapshots: Vec<(usize, MarketSnapshot)> = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(rank) = ids.iter().position(|id| *id == entry.id) else {
                continue;
            };
            let (Some(price), Some(change)) = (entry.current_price, entry.price_change_percentage_24h)
            else {
                debug!(id = %entry.id, "Market entry without price or 24h change; skipped");
                continue;
            };
            if !change.is_finite() {
                continue;
            }
            snapshots.push((
                rank,
                MarketSnapshot {
                    symbol: entry.symbol.to_uppercase(),
                    name: entry.name,
                    price: ensure_positive(NAME, price, "price")?,
                    change_24h_percent: change,
                    market_cap: entry.market_cap,
                    total_volume: entry.total_volume,
                },
            ));
        }

        if snapshots.is_empty() {
            return Err(ProviderError::missing_field(NAME, "Empty markets list"));
        }
        snapshots.sort_by_key(|(rank, _)| *rank);
        Ok(snapshots.into_iter().map(|(_, s)| s).collect())
    }
}
