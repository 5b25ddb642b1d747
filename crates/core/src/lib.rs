pub mod cache;
pub mod errors;
pub mod models;
pub mod providers;
pub mod services;

use std::sync::Arc;

use cache::sweeper::spawn_sweeper;
use cache::TtlCache;
use models::{
    asset::{CryptoAsset, CurrencyInfo},
    price::{Conversion, HistoryPoint, PricePoint, Quote, RatePoint},
    settings::Settings,
};
use providers::registry::ProviderRegistry;
use services::{
    conversion_service::ConversionService,
    pulse_service::{
        MarketPulse, MarketPulseService, PulsePair, RateMovement, DEFAULT_PULSE_CRYPTOS,
    },
    rate_service::{CachedValue, RateService},
    synthetic::SyntheticEstimator,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use errors::CoreError;

/// Main entry point for the rates core.
/// Owns the shared cache, the provider chains and the background sweeper.
#[must_use]
pub struct RateEngine {
    rates: Arc<RateService>,
    conversions: ConversionService,
    pulse: MarketPulseService,
    cache: Arc<TtlCache<CachedValue>>,
    shutdown: CancellationToken,
    sweeper: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for RateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateEngine")
            .field("crypto_price_chain", &self.rates.registry().crypto_price_names())
            .field("fiat_rate_chain", &self.rates.registry().fiat_rate_names())
            .field("cached_entries", &self.cache.len())
            .field("sweeper_running", &self.sweeper.is_some())
            .finish()
    }
}

impl RateEngine {
    /// Build every provider chain from `settings` and start the cache sweeper.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_settings(settings: Settings) -> Result<Self, CoreError> {
        settings.validate()?;
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(CoreError::Config(
                "RateEngine must be created inside a tokio runtime".to_string(),
            ));
        }

        let cache = Arc::new(TtlCache::new());
        let registry = ProviderRegistry::from_settings(&settings);
        let mut engine = Self::from_parts(registry, cache, &settings, SyntheticEstimator::new());

        engine.sweeper = Some(spawn_sweeper(
            Arc::clone(&engine.cache),
            settings.sweep_interval(),
            engine.shutdown.clone(),
        ));
        info!(
            crypto = ?engine.rates.registry().crypto_price_names(),
            fiat = ?engine.rates.registry().fiat_rate_names(),
            "Rate engine ready"
        );
        Ok(engine)
    }

    /// Assemble an engine from prebuilt parts. No sweeper is started; expired entries
    /// are still never served as fresh.
    pub fn from_parts(
        registry: ProviderRegistry,
        cache: Arc<TtlCache<CachedValue>>,
        settings: &Settings,
        estimator: SyntheticEstimator,
    ) -> Self {
        let rates = Arc::new(RateService::new(
            registry,
            Arc::clone(&cache),
            settings.ttl.clone(),
            settings.serve_stale,
        ));
        Self {
            conversions: ConversionService::new(Arc::clone(&rates)),
            pulse: MarketPulseService::new(Arc::clone(&rates), estimator),
            rates,
            cache,
            shutdown: CancellationToken::new(),
            sweeper: None,
        }
    }

    pub fn rates(&self) -> &RateService {
        &self.rates
    }

    pub fn conversions(&self) -> &ConversionService {
        &self.conversions
    }

    // ── Prices & rates ──────────────────────────────────────────────

    pub async fn get_price(&self, symbol: &str, quote: &str) -> Result<Quote<PricePoint>, CoreError> {
        self.rates.get_price(symbol, quote).await
    }

    pub async fn get_fiat_rate(&self, from: &str, to: &str) -> Result<Quote<RatePoint>, CoreError> {
        self.rates.get_fiat_rate(from, to).await
    }

    pub async fn convert(&self, from: &str, to: &str, amount: f64) -> Result<Conversion, CoreError> {
        self.conversions.convert(from, to, amount).await
    }

    pub async fn get_historical_data(
        &self,
        symbol: &str,
        quote: &str,
        days: u32,
    ) -> Result<Quote<Vec<HistoryPoint>>, CoreError> {
        self.rates.get_historical_data(symbol, quote, days).await
    }

    // ── Reference data ──────────────────────────────────────────────

    pub async fn get_supported_currencies(&self) -> Result<Quote<Vec<CurrencyInfo>>, CoreError> {
        self.rates.get_supported_currencies().await
    }

    pub async fn get_supported_cryptos(&self) -> Result<Quote<Vec<CryptoAsset>>, CoreError> {
        self.rates.get_supported_cryptos().await
    }

    /// Market pulse rows for `pairs`; [`PulsePair::defaults`] when empty.
    pub async fn rate_movements(&self, pairs: &[PulsePair]) -> Result<Vec<RateMovement>, CoreError> {
        if pairs.is_empty() {
            return self.pulse.rate_movements(&PulsePair::defaults()).await;
        }
        self.pulse.rate_movements(pairs).await
    }

    /// Default pulse: [`PulsePair::defaults`] plus [`DEFAULT_PULSE_CRYPTOS`].
    pub async fn market_pulse(&self) -> Result<MarketPulse, CoreError> {
        let cryptos: Vec<String> = DEFAULT_PULSE_CRYPTOS.iter().map(|c| c.to_string()).collect();
        self.pulse.overview(&PulsePair::defaults(), &cryptos).await
    }

    pub async fn market_pulse_for(
        &self,
        pairs: &[PulsePair],
        cryptos: &[String],
    ) -> Result<MarketPulse, CoreError> {
        self.pulse.overview(pairs, cryptos).await
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Entries currently held, expired ones included until read or swept.
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Stop the sweeper and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(handle) = self.sweeper.take() {
            let _ = handle.await;
        }
        info!("Rate engine stopped");
    }
}

impl Drop for RateEngine {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
