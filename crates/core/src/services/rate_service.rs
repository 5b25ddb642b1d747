use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

use super::fallback::first_success;
use super::validation::{validate_code, validate_history, validate_pair, validate_symbols};
use crate::cache::{CacheKey, Lookup, TtlCache};
use crate::errors::CoreError;
use crate::models::asset::{CryptoAsset, CurrencyInfo};
use crate::models::price::{HistoryPoint, MarketSnapshot, PricePoint, Quote, RatePoint};
use crate::models::settings::{CacheTtl, Settings};
use crate::providers::registry::ProviderRegistry;
use crate::providers::traits::{
    CryptoListProvider, CryptoPriceProvider, CurrencyListProvider, FiatRateProvider,
    HistoryProvider, MarketDataProvider,
};

/// Every shape the orchestrator caches. One cache instance holds all domains;
/// the key prefix decides which variant lives under it.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Price(PricePoint),
    Rate(RatePoint),
    History(Vec<HistoryPoint>),
    Currencies(Vec<CurrencyInfo>),
    Cryptos(Vec<CryptoAsset>),
    Markets(Vec<MarketSnapshot>),
}

impl CachedValue {
    fn into_price(self) -> Option<PricePoint> {
        match self {
            CachedValue::Price(p) => Some(p),
            _ => None,
        }
    }

    fn into_rate(self) -> Option<RatePoint> {
        match self {
            CachedValue::Rate(r) => Some(r),
            _ => None,
        }
    }

    fn into_history(self) -> Option<Vec<HistoryPoint>> {
        match self {
            CachedValue::History(h) => Some(h),
            _ => None,
        }
    }

    fn into_currencies(self) -> Option<Vec<CurrencyInfo>> {
        match self {
            CachedValue::Currencies(c) => Some(c),
            _ => None,
        }
    }

    fn into_cryptos(self) -> Option<Vec<CryptoAsset>> {
        match self {
            CachedValue::Cryptos(c) => Some(c),
            _ => None,
        }
    }

    fn into_markets(self) -> Option<Vec<MarketSnapshot>> {
        match self {
            CachedValue::Markets(m) => Some(m),
            _ => None,
        }
    }
}

/// Fetches crypto prices, fiat rates, history and reference lists through ordered
/// provider chains, with a TTL cache in front.
///
/// Cache strategy:
/// - **Fresh hit**: returned as-is, no provider is contacted.
/// - **Miss**: the chain runs from its first provider; the first success is cached.
/// - **Every provider failed**: the last value fetched for the key is served, marked
///   [`QuoteSource::Stale`](crate::models::price::QuoteSource::Stale), on every request
///   until a provider answers again. It is never written back as fresh.
pub struct RateService {
    registry: ProviderRegistry,
    cache: Arc<TtlCache<CachedValue>>,
    ttl: CacheTtl,
    serve_stale: bool,
}

impl RateService {
    pub fn new(
        registry: ProviderRegistry,
        cache: Arc<TtlCache<CachedValue>>,
        ttl: CacheTtl,
        serve_stale: bool,
    ) -> Self {
        Self {
            registry,
            cache,
            ttl,
            serve_stale,
        }
    }

    pub fn from_settings(settings: &Settings, cache: Arc<TtlCache<CachedValue>>) -> Self {
        Self::new(
            ProviderRegistry::from_settings(settings),
            cache,
            settings.ttl.clone(),
            settings.serve_stale,
        )
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<TtlCache<CachedValue>> {
        &self.cache
    }

    // ── Crypto prices ───────────────────────────────────────────────

    /// Spot price of `symbol` in `quote` (e.g. BTC in USDT).
    pub async fn get_price(&self, symbol: &str, quote: &str) -> Result<Quote<PricePoint>, CoreError> {
        self.get_price_with_cancel(symbol, quote, &CancellationToken::new())
            .await
    }

    #[instrument(name = "get_price", skip(self, cancel), fields(symbol = %symbol, quote = %quote))]
    pub async fn get_price_with_cancel(
        &self,
        symbol: &str,
        quote: &str,
        cancel: &CancellationToken,
    ) -> Result<Quote<PricePoint>, CoreError> {
        validate_code("symbol", symbol)?;
        validate_code("quote", quote)?;
        let symbol = symbol.to_uppercase();
        let quote = quote.to_uppercase();
        let request = format!("price for {symbol}/{quote}");

        self.cached_or_fetch(
            CacheKey::crypto_price(&symbol, &quote),
            self.ttl.crypto_price(),
            cancel,
            CachedValue::Price,
            CachedValue::into_price,
            || {
                first_success(
                    self.registry.crypto_price_chain(),
                    &request,
                    cancel,
                    |p| {
                        let (symbol, quote) = (symbol.as_str(), quote.as_str());
                        async move { p.fetch_price(symbol, quote).await }
                    },
                )
            },
        )
        .await
    }

    // ── Fiat rates ──────────────────────────────────────────────────

    /// Units of `to` per one unit of `from`.
    pub async fn get_fiat_rate(&self, from: &str, to: &str) -> Result<Quote<RatePoint>, CoreError> {
        self.get_fiat_rate_with_cancel(from, to, &CancellationToken::new())
            .await
    }

    #[instrument(name = "get_fiat_rate", skip(self, cancel), fields(from = %from, to = %to))]
    pub async fn get_fiat_rate_with_cancel(
        &self,
        from: &str,
        to: &str,
        cancel: &CancellationToken,
    ) -> Result<Quote<RatePoint>, CoreError> {
        validate_pair(from, to)?;
        let from = from.to_uppercase();
        let to = to.to_uppercase();
        let request = format!("rate for {from}/{to}");

        self.cached_or_fetch(
            CacheKey::fiat_rate(&from, &to),
            self.ttl.fiat_rate(),
            cancel,
            CachedValue::Rate,
            CachedValue::into_rate,
            || {
                first_success(self.registry.fiat_rate_chain(), &request, cancel, |p| {
                    let (from, to) = (from.as_str(), to.as_str());
                    async move { p.fetch_rate(from, to).await }
                })
            },
        )
        .await
    }

    // ── History ─────────────────────────────────────────────────────

    /// Price series for the last `days` days (1..=365), oldest first.
    pub async fn get_historical_data(
        &self,
        symbol: &str,
        quote: &str,
        days: u32,
    ) -> Result<Quote<Vec<HistoryPoint>>, CoreError> {
        self.get_historical_data_with_cancel(symbol, quote, days, &CancellationToken::new())
            .await
    }

    #[instrument(
        name = "get_historical_data",
        skip(self, cancel),
        fields(symbol = %symbol, quote = %quote)
    )]
    pub async fn get_historical_data_with_cancel(
        &self,
        symbol: &str,
        quote: &str,
        days: u32,
        cancel: &CancellationToken,
    ) -> Result<Quote<Vec<HistoryPoint>>, CoreError> {
        validate_history(symbol, quote, days)?;
        let symbol = symbol.to_uppercase();
        let quote = quote.to_uppercase();
        let request = format!("{days}d history for {symbol}/{quote}");

        self.cached_or_fetch(
            CacheKey::history(&symbol, &quote, days),
            self.ttl.history(),
            cancel,
            CachedValue::History,
            CachedValue::into_history,
            || {
                first_success(self.registry.history_chain(), &request, cancel, |p| {
                    let (symbol, quote) = (symbol.as_str(), quote.as_str());
                    async move { p.fetch_history(symbol, quote, days).await }
                })
            },
        )
        .await
    }

    // ── Reference lists ─────────────────────────────────────────────

    #[instrument(name = "get_supported_currencies", skip(self))]
    pub async fn get_supported_currencies(&self) -> Result<Quote<Vec<CurrencyInfo>>, CoreError> {
        let cancel = CancellationToken::new();
        self.cached_or_fetch(
            CacheKey::currencies(),
            self.ttl.reference(),
            &cancel,
            CachedValue::Currencies,
            CachedValue::into_currencies,
            || {
                first_success(
                    self.registry.currency_list_chain(),
                    "supported currencies",
                    &cancel,
                    |p| async move { p.fetch_currencies().await },
                )
            },
        )
        .await
    }

    #[instrument(name = "get_supported_cryptos", skip(self))]
    pub async fn get_supported_cryptos(&self) -> Result<Quote<Vec<CryptoAsset>>, CoreError> {
        let cancel = CancellationToken::new();
        self.cached_or_fetch(
            CacheKey::cryptos(),
            self.ttl.reference(),
            &cancel,
            CachedValue::Cryptos,
            CachedValue::into_cryptos,
            || {
                first_success(
                    self.registry.crypto_list_chain(),
                    "supported cryptos",
                    &cancel,
                    |p| async move { p.fetch_cryptos().await },
                )
            },
        )
        .await
    }

    // ── Market overview ─────────────────────────────────────────────

    /// USD price and reported 24h change for `symbols`. Cached as one entry with the
    /// crypto price TTL.
    pub async fn get_market_snapshots(
        &self,
        symbols: &[String],
    ) -> Result<Quote<Vec<MarketSnapshot>>, CoreError> {
        self.get_market_snapshots_with_cancel(symbols, &CancellationToken::new())
            .await
    }

    #[instrument(name = "get_market_snapshots", skip(self, cancel), fields(symbols = ?symbols))]
    pub async fn get_market_snapshots_with_cancel(
        &self,
        symbols: &[String],
        cancel: &CancellationToken,
    ) -> Result<Quote<Vec<MarketSnapshot>>, CoreError> {
        validate_symbols(symbols)?;
        let symbols: Vec<String> = symbols.iter().map(|s| s.to_uppercase()).collect();
        let request = format!("market data for {}", symbols.join(", "));

        self.cached_or_fetch(
            CacheKey::markets(&symbols),
            self.ttl.crypto_price(),
            cancel,
            CachedValue::Markets,
            CachedValue::into_markets,
            || {
                first_success(
                    self.registry.market_data_chain(),
                    &request,
                    cancel,
                    |p| {
                        let symbols = symbols.as_slice();
                        async move { p.fetch_markets(symbols).await }
                    },
                )
            },
        )
        .await
    }

    // ── Internal ────────────────────────────────────────────────────

    /// Cache lookup, chain walk on miss, cache write on success, stale fallback.
    async fn cached_or_fetch<T, F, Fut>(
        &self,
        key: String,
        ttl: Duration,
        cancel: &CancellationToken,
        wrap: fn(T) -> CachedValue,
        unwrap: fn(CachedValue) -> Option<T>,
        fetch: F,
    ) -> Result<Quote<T>, CoreError>
    where
        T: Clone,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(T, String), CoreError>>,
    {
        let last_good = match self.cache.lookup(&key) {
            Lookup::Fresh(cached) => match unwrap(cached) {
                Some(value) => return Ok(Quote::cached(value)),
                None => None,
            },
            Lookup::Stale(cached) => unwrap(cached),
            Lookup::Missing => None,
        };

        match fetch().await {
            Ok((value, provider)) => {
                // A late answer must not land in the cache once the caller gave up.
                if cancel.is_cancelled() {
                    return Err(CoreError::Cancelled);
                }
                self.cache.set(key, wrap(value.clone()), ttl);
                Ok(Quote::live(value, provider))
            }
            Err(e) if e.is_unavailable() && self.serve_stale => match last_good {
                Some(value) => {
                    warn!(key = %key, error = %e, "Serving stale cache entry");
                    Ok(Quote::stale(value))
                }
                None => Err(e),
            },
            Err(e) => Err(e),
        }
    }
}
