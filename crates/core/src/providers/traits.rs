use async_trait::async_trait;

use crate::errors::ProviderError;
use crate::models::asset::{CryptoAsset, CurrencyInfo};
use crate::models::price::{HistoryPoint, MarketSnapshot, PricePoint, RatePoint};

/// Trait abstractions for external rate sources, one per capability.
///
/// Each adapter (Binance, Coinbase, CoinGecko, Kraken, CoinDesk, Frankfurter,
/// Fawaz Ahmed, ExchangeRate-API) implements the capabilities it has. A provider
/// chain is an ordered `Vec` of one of these traits, so mocks slot in for tests.
///
/// Adapters never consult or write the cache and never swallow failures.
pub trait Provider: Send + Sync {
    /// Human-readable name of this provider (for logs/errors).
    fn name(&self) -> &str;
}

#[async_trait]
pub trait CryptoPriceProvider: Provider {
    /// Spot price of `symbol` quoted in `quote` (e.g. BTC in USDT).
    async fn fetch_price(&self, symbol: &str, quote: &str) -> Result<PricePoint, ProviderError>;
}

#[async_trait]
pub trait FiatRateProvider: Provider {
    /// Units of `to` per one unit of `from`.
    async fn fetch_rate(&self, from: &str, to: &str) -> Result<RatePoint, ProviderError>;
}

#[async_trait]
pub trait HistoryProvider: Provider {
    /// Price series covering the last `days` days, oldest first.
    async fn fetch_history(
        &self,
        symbol: &str,
        quote: &str,
        days: u32,
    ) -> Result<Vec<HistoryPoint>, ProviderError>;
}

#[async_trait]
pub trait CurrencyListProvider: Provider {
    async fn fetch_currencies(&self) -> Result<Vec<CurrencyInfo>, ProviderError>;
}

#[async_trait]
pub trait CryptoListProvider: Provider {
    async fn fetch_cryptos(&self) -> Result<Vec<CryptoAsset>, ProviderError>;
}

#[async_trait]
pub trait MarketDataProvider: Provider {
    /// USD price and reported 24h change for each of `symbols` the provider knows,
    /// in the order requested.
    async fn fetch_markets(&self, symbols: &[String]) -> Result<Vec<MarketSnapshot>, ProviderError>;
}
