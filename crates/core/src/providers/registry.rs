use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::binance::BinanceProvider;
use super::coinbase::CoinbaseProvider;
use super::coindesk::CoinDeskProvider;
use super::coingecko::CoinGeckoProvider;
use super::exchange_rate_api::ExchangeRateApiProvider;
use super::fawaz_ahmed::FawazAhmedProvider;
use super::frankfurter::FrankfurterProvider;
use super::kraken::KrakenProvider;
use super::traits::{
    CryptoListProvider, CryptoPriceProvider, CurrencyListProvider, FiatRateProvider,
    HistoryProvider, MarketDataProvider, Provider,
};
use crate::models::settings::{ProviderId, Settings};

/// One adapter instance per source, shared by every chain that lists it.
struct Adapters {
    binance: Arc<BinanceProvider>,
    coinbase: Arc<CoinbaseProvider>,
    coingecko: Arc<CoinGeckoProvider>,
    kraken: Arc<KrakenProvider>,
    coindesk: Arc<CoinDeskProvider>,
    frankfurter: Arc<FrankfurterProvider>,
    fawaz_ahmed: Arc<FawazAhmedProvider>,
    exchange_rate_api: Option<Arc<ExchangeRateApiProvider>>,
}

impl Adapters {
    fn build(settings: &Settings) -> Self {
        let timeout: Duration = settings.timeout();
        let urls = &settings.endpoints;
        Self {
            binance: Arc::new(BinanceProvider::with_base_url(&urls.binance, timeout)),
            coinbase: Arc::new(CoinbaseProvider::with_base_url(&urls.coinbase, timeout)),
            coingecko: Arc::new(CoinGeckoProvider::with_base_url(&urls.coingecko, timeout)),
            kraken: Arc::new(KrakenProvider::with_base_url(&urls.kraken, timeout)),
            coindesk: Arc::new(CoinDeskProvider::with_base_url(&urls.coindesk, timeout)),
            frankfurter: Arc::new(FrankfurterProvider::with_base_url(&urls.frankfurter, timeout)),
            fawaz_ahmed: Arc::new(FawazAhmedProvider::with_base_url(&urls.fawaz_ahmed, timeout)),
            // ExchangeRate-API — requires API key
            exchange_rate_api: settings.exchange_rate_api_key().map(|key| {
                Arc::new(ExchangeRateApiProvider::with_base_url(
                    &urls.exchange_rate_api,
                    key.to_string(),
                    timeout,
                ))
            }),
        }
    }
}

fn skip(id: ProviderId, capability: &str) {
    warn!(provider = %id, capability, "Provider cannot serve this chain; skipped");
}

/// Ordered provider chains, one per capability.
///
/// Order encodes preference and is fixed at construction. The orchestrator always
/// starts at index 0; nothing here reorders based on past failures.
#[derive(Default)]
pub struct ProviderRegistry {
    crypto_price: Vec<Arc<dyn CryptoPriceProvider>>,
    fiat_rate: Vec<Arc<dyn FiatRateProvider>>,
    history: Vec<Arc<dyn HistoryProvider>>,
    currency_list: Vec<Arc<dyn CurrencyListProvider>>,
    crypto_list: Vec<Arc<dyn CryptoListProvider>>,
    market_data: Vec<Arc<dyn MarketDataProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every chain from the configured provider order.
    ///
    /// ExchangeRate-API joins its chains only when a key is configured.
    pub fn from_settings(settings: &Settings) -> Self {
        let adapters = Adapters::build(settings);
        let chains = &settings.chains;
        let mut registry = Self::new();

        for id in &chains.crypto_price {
            match id {
                ProviderId::Binance => registry.register_crypto_price(adapters.binance.clone()),
                ProviderId::Coinbase => registry.register_crypto_price(adapters.coinbase.clone()),
                ProviderId::CoinGecko => {
                    registry.register_crypto_price(adapters.coingecko.clone())
                }
                ProviderId::Kraken => registry.register_crypto_price(adapters.kraken.clone()),
                ProviderId::CoinDesk => registry.register_crypto_price(adapters.coindesk.clone()),
                other => skip(*other, "crypto_price"),
            }
        }

        for id in &chains.fiat_rate {
            match id {
                ProviderId::Frankfurter => {
                    registry.register_fiat_rate(adapters.frankfurter.clone())
                }
                ProviderId::FawazAhmed => {
                    registry.register_fiat_rate(adapters.fawaz_ahmed.clone())
                }
                ProviderId::ExchangeRateApi => match &adapters.exchange_rate_api {
                    Some(p) => registry.register_fiat_rate(p.clone()),
                    None => debug!("ExchangeRate-API key missing; not in fiat_rate chain"),
                },
                other => skip(*other, "fiat_rate"),
            }
        }

        for id in &chains.history {
            match id {
                ProviderId::Binance => registry.register_history(adapters.binance.clone()),
                ProviderId::CoinGecko => registry.register_history(adapters.coingecko.clone()),
                other => skip(*other, "history"),
            }
        }

        for id in &chains.currency_list {
            match id {
                ProviderId::Frankfurter => {
                    registry.register_currency_list(adapters.frankfurter.clone())
                }
                ProviderId::ExchangeRateApi => match &adapters.exchange_rate_api {
                    Some(p) => registry.register_currency_list(p.clone()),
                    None => debug!("ExchangeRate-API key missing; not in currency_list chain"),
                },
                other => skip(*other, "currency_list"),
            }
        }

        for id in &chains.crypto_list {
            match id {
                ProviderId::Binance => registry.register_crypto_list(adapters.binance.clone()),
                ProviderId::CoinGecko => {
                    registry.register_crypto_list(adapters.coingecko.clone())
                }
                other => skip(*other, "crypto_list"),
            }
        }

        for id in &chains.market_data {
            match id {
                ProviderId::CoinGecko => registry.register_market_data(adapters.coingecko.clone()),
                other => skip(*other, "market_data"),
            }
        }

        registry
    }

    // ── Registration (appends; order is preference) ──────────────────

    pub fn register_crypto_price(&mut self, provider: Arc<dyn CryptoPriceProvider>) {
        self.crypto_price.push(provider);
    }

    pub fn register_fiat_rate(&mut self, provider: Arc<dyn FiatRateProvider>) {
        self.fiat_rate.push(provider);
    }

    pub fn register_history(&mut self, provider: Arc<dyn HistoryProvider>) {
        self.history.push(provider);
    }

    pub fn register_currency_list(&mut self, provider: Arc<dyn CurrencyListProvider>) {
        self.currency_list.push(provider);
    }

    pub fn register_crypto_list(&mut self, provider: Arc<dyn CryptoListProvider>) {
        self.crypto_list.push(provider);
    }

    pub fn register_market_data(&mut self, provider: Arc<dyn MarketDataProvider>) {
        self.market_data.push(provider);
    }

    // ── Chains ──────────────────────────────────────────────────────

    pub fn crypto_price_chain(&self) -> &[Arc<dyn CryptoPriceProvider>] {
        &self.crypto_price
    }

    pub fn fiat_rate_chain(&self) -> &[Arc<dyn FiatRateProvider>] {
        &self.fiat_rate
    }

    pub fn history_chain(&self) -> &[Arc<dyn HistoryProvider>] {
        &self.history
    }

    pub fn currency_list_chain(&self) -> &[Arc<dyn CurrencyListProvider>] {
        &self.currency_list
    }

    pub fn crypto_list_chain(&self) -> &[Arc<dyn CryptoListProvider>] {
        &self.crypto_list
    }

    pub fn market_data_chain(&self) -> &[Arc<dyn MarketDataProvider>] {
        &self.market_data
    }

    /// Provider names of each chain, in order. For diagnostics and tests.
    pub fn crypto_price_names(&self) -> Vec<String> {
        self.crypto_price.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn fiat_rate_names(&self) -> Vec<String> {
        self.fiat_rate.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn history_names(&self) -> Vec<String> {
        self.history.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn currency_list_names(&self) -> Vec<String> {
        self.currency_list.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn crypto_list_names(&self) -> Vec<String> {
        self.crypto_list.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn market_data_names(&self) -> Vec<String> {
        self.market_data.iter().map(|p| p.name().to_string()).collect()
    }
}
