// ═══════════════════════════════════════════════════════════════════
// Service Tests — fallback orchestration, caching, stale serving,
// cancellation, validation, conversion composer, market pulse,
// RateEngine facade
// ═══════════════════════════════════════════════════════════════════

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use skyx_rates_core::cache::{ManualClock, TtlCache};
use skyx_rates_core::errors::{ConversionLeg, CoreError, ProviderError, ProviderErrorKind};
use skyx_rates_core::models::asset::{CryptoAsset, CurrencyInfo};
use skyx_rates_core::models::price::{
    HistoryPoint, MarketSnapshot, PricePoint, QuoteSource, RatePoint, Trend,
};
use skyx_rates_core::models::settings::{CacheTtl, Settings};
use skyx_rates_core::providers::registry::ProviderRegistry;
use skyx_rates_core::providers::traits::{
    CryptoListProvider, CryptoPriceProvider, CurrencyListProvider, FiatRateProvider,
    HistoryProvider, MarketDataProvider, Provider,
};
use skyx_rates_core::services::conversion_service::ConversionService;
use skyx_rates_core::services::pulse_service::{MarketPulseService, PulsePair};
use skyx_rates_core::services::rate_service::{CachedValue, RateService};
use skyx_rates_core::services::synthetic::SyntheticEstimator;
use skyx_rates_core::services::validation;
use skyx_rates_core::RateEngine;

const START: i64 = 1_700_000_000_000;

// ═══════════════════════════════════════════════════════════════════
// Mock Provider
// ═══════════════════════════════════════════════════════════════════

/// Answers from a fixed table: crypto prices keyed by symbol, fiat rates keyed
/// by `FROM/TO`. Counts every call and can be switched to failing.
struct MockProvider {
    name: &'static str,
    values: HashMap<String, f64>,
    failing: AtomicBool,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl MockProvider {
    fn new(name: &'static str, values: &[(&str, f64)]) -> Arc<Self> {
        Arc::new(Self {
            name,
            values: values.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            delay: None,
        })
    }

    fn failing(name: &'static str) -> Arc<Self> {
        let mock = Self::new(name, &[]);
        mock.set_failing(true);
        mock
    }

    fn slow(name: &'static str, values: &[(&str, f64)], delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name,
            values: values.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            delay: Some(delay),
        })
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn answer(&self, key: &str) -> Result<f64, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::new(
                self.name,
                ProviderErrorKind::HttpStatus(503),
                "HTTP error: 503 Service Unavailable",
            ));
        }
        self.values
            .get(key)
            .copied()
            .ok_or_else(|| ProviderError::unsupported(self.name, format!("No mapping for {key}")))
    }
}

impl Provider for MockProvider {
    fn name(&self) -> &str {
        self.name
    }
}

#[async_trait]
impl CryptoPriceProvider for MockProvider {
    async fn fetch_price(&self, symbol: &str, _quote: &str) -> Result<PricePoint, ProviderError> {
        Ok(PricePoint {
            price: self.answer(symbol).await?,
            timestamp: START,
            provider: self.name.to_string(),
        })
    }
}

#[async_trait]
impl FiatRateProvider for MockProvider {
    async fn fetch_rate(&self, from: &str, to: &str) -> Result<RatePoint, ProviderError> {
        Ok(RatePoint {
            rate: self.answer(&format!("{from}/{to}")).await?,
            timestamp: START,
        })
    }
}

#[async_trait]
impl HistoryProvider for MockProvider {
    async fn fetch_history(
        &self,
        symbol: &str,
        _quote: &str,
        days: u32,
    ) -> Result<Vec<HistoryPoint>, ProviderError> {
        let price = self.answer(symbol).await?;
        Ok((0..days)
            .map(|d| HistoryPoint {
                timestamp: START + i64::from(d) * 86_400_000,
                price,
            })
            .collect())
    }
}

#[async_trait]
impl CurrencyListProvider for MockProvider {
    async fn fetch_currencies(&self) -> Result<Vec<CurrencyInfo>, ProviderError> {
        self.answer("currencies").await?;
        Ok(vec![CurrencyInfo::new("EUR", "Euro"), CurrencyInfo::new("USD", "US Dollar")])
    }
}

#[async_trait]
impl CryptoListProvider for MockProvider {
    async fn fetch_cryptos(&self) -> Result<Vec<CryptoAsset>, ProviderError> {
        self.answer("cryptos").await?;
        Ok(vec![CryptoAsset {
            symbol: "BTC".into(),
            name: "Bitcoin".into(),
            trading_symbol: Some("BTCUSDT".into()),
        }])
    }
}

/// Market data source answering from a fixed `(symbol, price, change)` table.
struct MockMarkets {
    rows: Vec<(&'static str, f64, f64)>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl MockMarkets {
    fn new(rows: &[(&'static str, f64, f64)]) -> Arc<Self> {
        Arc::new(Self {
            rows: rows.to_vec(),
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        })
    }
}

impl Provider for MockMarkets {
    fn name(&self) -> &str {
        "MockMarkets"
    }
}

#[async_trait]
impl MarketDataProvider for MockMarkets {
    async fn fetch_markets(&self, symbols: &[String]) -> Result<Vec<MarketSnapshot>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::new(
                "MockMarkets",
                ProviderErrorKind::HttpStatus(429),
                "HTTP error: 429 Too Many Requests",
            ));
        }
        Ok(symbols
            .iter()
            .filter_map(|s| self.rows.iter().find(|(sym, _, _)| sym == s))
            .map(|(symbol, price, change)| MarketSnapshot {
                symbol: symbol.to_string(),
                name: symbol.to_string(),
                price: *price,
                change_24h_percent: *change,
                market_cap: None,
                total_volume: None,
            })
            .collect())
    }
}

// ═══════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════

struct Harness {
    rates: Arc<RateService>,
    cache: Arc<TtlCache<CachedValue>>,
    clock: Arc<ManualClock>,
}

fn harness(registry: ProviderRegistry, serve_stale: bool) -> Harness {
    let clock = Arc::new(ManualClock::new(START));
    let cache = Arc::new(TtlCache::with_clock(clock.clone()));
    let rates = Arc::new(RateService::new(
        registry,
        cache.clone(),
        CacheTtl::default(),
        serve_stale,
    ));
    Harness {
        rates,
        cache,
        clock,
    }
}

fn crypto_registry(chain: &[Arc<MockProvider>]) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    for p in chain {
        registry.register_crypto_price(p.clone());
    }
    registry
}

/// Crypto chain priced at BTC 50000 / ETH 2500, fiat chain USD→EUR 0.92, EUR→USD 1.087.
fn market() -> (ProviderRegistry, Arc<MockProvider>, Arc<MockProvider>) {
    let crypto = MockProvider::new("MockExchange", &[("BTC", 50_000.0), ("ETH", 2_500.0)]);
    let fiat = MockProvider::new(
        "MockFiat",
        &[("USD/EUR", 0.92), ("EUR/USD", 1.087), ("USD/INR", 83.1)],
    );
    let mut registry = ProviderRegistry::new();
    registry.register_crypto_price(crypto.clone());
    registry.register_fiat_rate(fiat.clone());
    (registry, crypto, fiat)
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9 * b.abs().max(1.0)
}

// ═══════════════════════════════════════════════════════════════════
// Fallback ordering
// ═══════════════════════════════════════════════════════════════════

mod fallback {
    use super::*;

    #[tokio::test]
    async fn primary_success_never_touches_the_rest() {
        let a = MockProvider::new("A", &[("BTC", 61_000.0)]);
        let b = MockProvider::new("B", &[("BTC", 1.0)]);
        let h = harness(crypto_registry(&[a.clone(), b.clone()]), true);

        let quote = h.rates.get_price("BTC", "USDT").await.unwrap();
        assert_eq!(quote.value.price, 61_000.0);
        assert_eq!(quote.source, QuoteSource::Live { provider: "A".into() });
        assert_eq!((a.calls(), b.calls()), (1, 0));
    }

    #[test_log::test(tokio::test)]
    async fn first_success_wins_and_later_providers_are_not_called() {
        let a = MockProvider::failing("A");
        let b = MockProvider::new("B", &[("BTC", 61_234.5)]);
        let c = MockProvider::new("C", &[("BTC", 1.0)]);
        let h = harness(crypto_registry(&[a.clone(), b.clone(), c.clone()]), true);

        let quote = h.rates.get_price("BTC", "USDT").await.unwrap();
        assert_eq!(quote.value.price, 61_234.5);
        assert_eq!(quote.source_label(), "B");
        assert_eq!((a.calls(), b.calls(), c.calls()), (1, 1, 0));
    }

    #[tokio::test]
    async fn mapping_miss_falls_through_to_next_provider() {
        let a = MockProvider::new("A", &[("ETH", 2_500.0)]);
        let b = MockProvider::new("B", &[("BTC", 61_000.0)]);
        let h = harness(crypto_registry(&[a.clone(), b.clone()]), true);

        let quote = h.rates.get_price("BTC", "USDT").await.unwrap();
        assert_eq!(quote.source_label(), "B");
    }

    #[tokio::test]
    async fn all_failing_reports_last_reason_and_caches_nothing() {
        let a = MockProvider::failing("A");
        let b = MockProvider::failing("B");
        let c = MockProvider::failing("C");
        let h = harness(crypto_registry(&[a.clone(), b.clone(), c.clone()]), true);

        let err = h.rates.get_price("BTC", "USDT").await.unwrap_err();
        match &err {
            CoreError::AllProvidersFailed {
                request,
                last_error,
            } => {
                assert_eq!(request, "price for BTC/USDT");
                assert_eq!(last_error.provider, "C");
                assert_eq!(last_error.kind, ProviderErrorKind::HttpStatus(503));
            }
            other => panic!("expected AllProvidersFailed, got {other:?}"),
        }
        assert!(err.to_string().contains("C failed (503)"));
        assert_eq!((a.calls(), b.calls(), c.calls()), (1, 1, 1));
        assert!(h.cache.is_empty());
    }

    #[tokio::test]
    async fn empty_chain_is_no_provider() {
        let h = harness(ProviderRegistry::new(), true);
        let err = h.rates.get_fiat_rate("USD", "EUR").await.unwrap_err();
        assert!(matches!(err, CoreError::NoProvider(_)));
    }

    #[tokio::test]
    async fn each_call_restarts_at_the_primary() {
        let a = MockProvider::failing("A");
        let b = MockProvider::new("B", &[("BTC", 1.0), ("ETH", 2.0)]);
        let h = harness(crypto_registry(&[a.clone(), b.clone()]), true);

        h.rates.get_price("BTC", "USDT").await.unwrap();
        h.rates.get_price("ETH", "USDT").await.unwrap();
        assert_eq!(a.calls(), 2);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Caching
// ═══════════════════════════════════════════════════════════════════

mod caching {
    use super::*;

    #[tokio::test]
    async fn second_call_within_ttl_is_served_from_cache() {
        let a = MockProvider::new("A", &[("BTC", 61_234.5)]);
        let h = harness(crypto_registry(&[a.clone()]), true);

        h.rates.get_price("BTC", "USDT").await.unwrap();
        let second = h.rates.get_price("btc", "usdt").await.unwrap();

        assert!(second.is_cached());
        assert_eq!(second.value.price, 61_234.5);
        assert_eq!(a.calls(), 1);
    }

    #[tokio::test]
    async fn expired_entry_triggers_a_fresh_fetch() {
        let a = MockProvider::new("A", &[("BTC", 61_234.5)]);
        let h = harness(crypto_registry(&[a.clone()]), true);

        h.rates.get_price("BTC", "USDT").await.unwrap();
        h.clock.advance(Duration::from_secs(31));
        let again = h.rates.get_price("BTC", "USDT").await.unwrap();

        assert_eq!(again.source_label(), "A");
        assert_eq!(a.calls(), 2);
    }

    #[tokio::test]
    async fn fiat_rates_live_for_sixty_seconds() {
        let (registry, _, fiat) = market();
        let h = harness(registry, true);

        h.rates.get_fiat_rate("USD", "EUR").await.unwrap();
        h.clock.advance(Duration::from_secs(45));
        assert!(h.rates.get_fiat_rate("USD", "EUR").await.unwrap().is_cached());
        h.clock.advance(Duration::from_secs(16));
        assert!(!h.rates.get_fiat_rate("USD", "EUR").await.unwrap().is_cached());
        assert_eq!(fiat.calls(), 2);
    }

    #[tokio::test]
    async fn history_is_cached_per_window() {
        let a = MockProvider::new("A", &[("BTC", 60_000.0)]);
        let mut registry = ProviderRegistry::new();
        registry.register_history(a.clone());
        let h = harness(registry, true);

        let week = h.rates.get_historical_data("BTC", "USDT", 7).await.unwrap();
        assert_eq!(week.value.len(), 7);
        h.rates.get_historical_data("BTC", "USDT", 7).await.unwrap();
        h.rates.get_historical_data("BTC", "USDT", 30).await.unwrap();
        assert_eq!(a.calls(), 2);
    }

    #[tokio::test]
    async fn reference_lists_are_cached() {
        let a = MockProvider::new("A", &[("currencies", 1.0), ("cryptos", 1.0)]);
        let mut registry = ProviderRegistry::new();
        registry.register_currency_list(a.clone());
        registry.register_crypto_list(a.clone());
        let h = harness(registry, true);

        let currencies = h.rates.get_supported_currencies().await.unwrap();
        assert_eq!(currencies.value[0].code, "EUR");
        assert!(h.rates.get_supported_currencies().await.unwrap().is_cached());

        let cryptos = h.rates.get_supported_cryptos().await.unwrap();
        assert_eq!(cryptos.value[0].symbol, "BTC");
        assert_eq!(a.calls(), 2);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Stale serving
// ═══════════════════════════════════════════════════════════════════

mod stale {
    use super::*;

    #[tokio::test]
    async fn expired_value_is_served_flagged_when_every_provider_fails() {
        let a = MockProvider::new("A", &[("BTC", 61_000.0)]);
        let h = harness(crypto_registry(&[a.clone()]), true);

        h.rates.get_price("BTC", "USDT").await.unwrap();
        h.clock.advance(Duration::from_secs(31));
        a.set_failing(true);

        let quote = h.rates.get_price("BTC", "USDT").await.unwrap();
        assert!(quote.is_stale());
        assert_eq!(quote.value.price, 61_000.0);
        assert!(h.cache.is_empty(), "stale values are never written back");
    }

    #[tokio::test]
    async fn stale_value_keeps_being_served_for_the_whole_outage() {
        let (registry, _, fiat) = market();
        let h = harness(registry, true);

        h.rates.get_fiat_rate("USD", "EUR").await.unwrap();
        h.clock.advance(Duration::from_secs(61));
        fiat.set_failing(true);

        for _ in 0..3 {
            let quote = h.rates.get_fiat_rate("USD", "EUR").await.unwrap();
            assert!(quote.is_stale());
            assert_eq!(quote.value.rate, 0.92);
        }
        assert_eq!(fiat.calls(), 4);
    }

    #[tokio::test]
    async fn swept_value_is_still_served_stale() {
        let a = MockProvider::new("A", &[("BTC", 61_000.0)]);
        let h = harness(crypto_registry(&[a.clone()]), true);

        h.rates.get_price("BTC", "USDT").await.unwrap();
        h.clock.advance(Duration::from_secs(301));
        assert_eq!(h.cache.sweep(), 1);
        a.set_failing(true);

        let quote = h.rates.get_price("BTC", "USDT").await.unwrap();
        assert!(quote.is_stale());
        assert_eq!(quote.value.price, 61_000.0);
    }

    #[tokio::test]
    async fn recovery_replaces_the_stale_value() {
        let a = MockProvider::new("A", &[("BTC", 61_000.0)]);
        let h = harness(crypto_registry(&[a.clone()]), true);

        h.rates.get_price("BTC", "USDT").await.unwrap();
        h.clock.advance(Duration::from_secs(31));
        a.set_failing(true);
        assert!(h.rates.get_price("BTC", "USDT").await.unwrap().is_stale());

        a.set_failing(false);
        let live = h.rates.get_price("BTC", "USDT").await.unwrap();
        assert_eq!(live.source_label(), "A");
        assert!(h.rates.get_price("BTC", "USDT").await.unwrap().is_cached());
    }

    #[tokio::test]
    async fn disabled_stale_serving_propagates_the_failure() {
        let a = MockProvider::new("A", &[("BTC", 61_000.0)]);
        let h = harness(crypto_registry(&[a.clone()]), false);

        h.rates.get_price("BTC", "USDT").await.unwrap();
        h.clock.advance(Duration::from_secs(31));
        a.set_failing(true);

        let err = h.rates.get_price("BTC", "USDT").await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn nothing_to_fall_back_on_is_an_error() {
        let h = harness(crypto_registry(&[MockProvider::failing("A")]), true);
        assert!(h.rates.get_price("BTC", "USDT").await.is_err());
    }
}

// ═══════════════════════════════════════════════════════════════════
// Cancellation
// ═══════════════════════════════════════════════════════════════════

mod cancellation {
    use super::*;

    #[tokio::test]
    async fn cancelled_before_start_calls_no_provider() {
        let a = MockProvider::new("A", &[("BTC", 1.0)]);
        let h = harness(crypto_registry(&[a.clone()]), true);
        let token = CancellationToken::new();
        token.cancel();

        let err = h
            .rates
            .get_price_with_cancel("BTC", "USDT", &token)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Cancelled));
        assert_eq!(a.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_call_is_abandoned_and_nothing_is_cached() {
        let slow = MockProvider::slow("Slow", &[("BTC", 1.0)], Duration::from_secs(10));
        let next = MockProvider::new("Next", &[("BTC", 2.0)]);
        let h = harness(crypto_registry(&[slow.clone(), next.clone()]), true);

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let err = h
            .rates
            .get_price_with_cancel("BTC", "USDT", &token)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(next.calls(), 0);
        assert!(h.cache.is_empty());
    }

    #[tokio::test]
    async fn conversion_threads_the_token_to_its_legs() {
        let (registry, crypto, fiat) = market();
        let h = harness(registry, true);
        let conversions = ConversionService::new(h.rates.clone());
        let token = CancellationToken::new();
        token.cancel();

        let err = conversions
            .convert_with_cancel("BTC", "EUR", 1.0, &token)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!((crypto.calls(), fiat.calls()), (0, 0));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Validation
// ═══════════════════════════════════════════════════════════════════

mod input_validation {
    use super::*;

    #[tokio::test]
    async fn bad_symbol_is_rejected_before_any_provider_call() {
        let a = MockProvider::new("A", &[("BTC", 1.0)]);
        let h = harness(crypto_registry(&[a.clone()]), true);

        for bad in ["", "BTC/USDT", "ABCDEFGHIJK"] {
            let err = h.rates.get_price(bad, "USDT").await.unwrap_err();
            assert!(matches!(err, CoreError::Validation(_)), "{bad:?}");
        }
        assert_eq!(a.calls(), 0);
    }

    #[tokio::test]
    async fn history_window_is_bounded() {
        let h = harness(ProviderRegistry::new(), true);
        for days in [0, 366] {
            let err = h.rates.get_historical_data("BTC", "USDT", days).await.unwrap_err();
            assert!(matches!(err, CoreError::Validation(_)), "{days}");
        }
    }

    #[tokio::test]
    async fn conversion_amount_must_be_positive_and_finite() {
        let (registry, crypto, _) = market();
        let h = harness(registry, true);
        let conversions = ConversionService::new(h.rates.clone());

        for amount in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let err = conversions.convert("BTC", "EUR", amount).await.unwrap_err();
            assert!(matches!(err, CoreError::Validation(_)), "{amount}");
        }
        assert_eq!(crypto.calls(), 0);
    }

    #[test]
    fn validators() {
        assert!(validation::validate_code("symbol", "1INCH").is_ok());
        assert!(validation::validate_code("symbol", "btc").is_ok());
        assert!(validation::validate_conversion("USD", "EUR", 0.01).is_ok());
        assert!(validation::validate_history("BTC", "USDT", 1).is_ok());
        assert!(validation::validate_history("BTC", "USDT", 365).is_ok());
        assert!(validation::validate_pair("USD", "").is_err());
    }
}

// ═══════════════════════════════════════════════════════════════════
// ConversionService
// ═══════════════════════════════════════════════════════════════════

mod conversion {
    use super::*;

    fn service() -> (ConversionService, Arc<MockProvider>, Arc<MockProvider>, Harness) {
        let (registry, crypto, fiat) = market();
        let h = harness(registry, true);
        (ConversionService::new(h.rates.clone()), crypto, fiat, h)
    }

    #[tokio::test]
    async fn fiat_to_fiat_uses_one_rate() {
        let (svc, crypto, _, _) = service();
        let conv = svc.convert("USD", "EUR", 100.0).await.unwrap();
        assert_eq!(conv.rate, 0.92);
        assert!(approx(conv.result, 92.0));
        assert_eq!(conv.sources, vec!["MockFiat"]);
        assert_eq!(crypto.calls(), 0);
    }

    #[tokio::test]
    async fn crypto_to_fiat_composes_through_usd() {
        let (svc, _, _, _) = service();
        let conv = svc.convert("BTC", "EUR", 1.0).await.unwrap();
        assert!(approx(conv.rate, 46_000.0));
        assert!(approx(conv.result, 46_000.0));
        assert_eq!(conv.sources, vec!["MockExchange", "MockFiat"]);
        assert!(!conv.stale);
    }

    #[tokio::test]
    async fn crypto_to_usd_needs_no_fiat_leg() {
        let (svc, _, fiat, _) = service();
        let conv = svc.convert("BTC", "USD", 2.0).await.unwrap();
        assert_eq!(conv.rate, 50_000.0);
        assert_eq!(conv.result, 100_000.0);
        assert_eq!(fiat.calls(), 0);
    }

    #[tokio::test]
    async fn fiat_to_crypto_divides_by_the_price() {
        let (svc, _, _, _) = service();
        let conv = svc.convert("EUR", "BTC", 1_000.0).await.unwrap();
        assert!(approx(conv.rate, 1.087 / 50_000.0));
        assert!(approx(conv.result, 1_000.0 * 1.087 / 50_000.0));
    }

    #[tokio::test]
    async fn usd_to_crypto_is_the_inverse_price() {
        let (svc, _, fiat, _) = service();
        let conv = svc.convert("USD", "ETH", 5_000.0).await.unwrap();
        assert!(approx(conv.result, 2.0));
        assert_eq!(fiat.calls(), 0);
    }

    #[tokio::test]
    async fn crypto_to_crypto_is_a_price_ratio() {
        let (svc, _, _, _) = service();
        let conv = svc.convert("ETH", "BTC", 20.0).await.unwrap();
        assert!(approx(conv.rate, 0.05));
        assert!(approx(conv.result, 1.0));
    }

    #[tokio::test]
    async fn usdt_is_the_bridge_itself() {
        let (svc, crypto, _, _) = service();
        let conv = svc.convert("USDT", "BTC", 25_000.0).await.unwrap();
        assert!(approx(conv.result, 0.5));
        assert_eq!(crypto.calls(), 1);
    }

    #[tokio::test]
    async fn same_code_is_identity_without_provider_calls() {
        let (svc, crypto, fiat, _) = service();
        let conv = svc.convert("eur", "EUR", 42.0).await.unwrap();
        assert_eq!(conv.rate, 1.0);
        assert_eq!(conv.result, 42.0);
        assert_eq!((crypto.calls(), fiat.calls()), (0, 0));
    }

    #[tokio::test]
    async fn failed_target_leg_fails_the_whole_conversion() {
        let (svc, _, fiat, h) = service();
        fiat.set_failing(true);

        let err = svc.convert("BTC", "EUR", 1.0).await.unwrap_err();
        match &err {
            CoreError::Composer { leg, source } => {
                assert_eq!(*leg, ConversionLeg::Target);
                assert!(matches!(**source, CoreError::AllProvidersFailed { .. }));
            }
            other => panic!("expected Composer, got {other:?}"),
        }
        assert!(err.is_unavailable());
        // Only the successful crypto leg is cached, never a composed result.
        assert_eq!(h.cache.len(), 1);
    }

    #[tokio::test]
    async fn failed_source_leg_is_reported_as_source() {
        let (svc, crypto, fiat, _) = service();
        crypto.set_failing(true);

        let err = svc.convert("BTC", "EUR", 1.0).await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Composer {
                leg: ConversionLeg::Source,
                ..
            }
        ));
        assert_eq!(fiat.calls(), 0);
    }

    #[tokio::test]
    async fn a_stale_leg_marks_the_conversion_stale() {
        let (svc, crypto, _, h) = service();
        svc.convert("BTC", "EUR", 1.0).await.unwrap();

        h.clock.advance(Duration::from_secs(31));
        crypto.set_failing(true);

        let conv = svc.convert("BTC", "EUR", 1.0).await.unwrap();
        assert!(conv.stale);
        assert_eq!(conv.sources, vec!["stale-cache", "cache"]);
        assert!(approx(conv.result, 46_000.0));
    }

    #[tokio::test]
    async fn typed_entry_points_check_asset_classes() {
        let (svc, _, _, _) = service();
        assert!(svc.convert_fiat("USD", "EUR", 1.0).await.is_ok());
        assert!(svc.convert_crypto_to_fiat("BTC", "EUR", 1.0).await.is_ok());
        assert!(svc.convert_fiat_to_crypto("EUR", "BTC", 1.0).await.is_ok());
        assert!(svc.convert_crypto("ETH", "BTC", 1.0).await.is_ok());

        let err = svc.convert_fiat("BTC", "EUR", 1.0).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Synthetic estimator & market pulse
// ═══════════════════════════════════════════════════════════════════

mod pulse {
    use super::*;

    #[test]
    fn fixed_sample_is_deterministic() {
        let up = SyntheticEstimator::fixed(0.75).estimate(1.0).unwrap();
        assert_eq!(up.change_percent, 0.25);
        assert_eq!(up.trend, Trend::Up);
        assert!(up.synthetic);

        let flat = SyntheticEstimator::fixed(0.5).estimate(0.2).unwrap();
        assert_eq!(flat.change_percent, 0.0);
        assert_eq!(flat.trend, Trend::Down);
    }

    #[test]
    fn random_estimate_stays_in_band() {
        let estimator = SyntheticEstimator::new();
        for _ in 0..50 {
            let change = estimator.estimate(1.0).unwrap();
            assert!((-0.5..=0.5).contains(&change.change_percent));
            assert!(change.synthetic);
        }
    }

    #[tokio::test]
    async fn failed_pair_is_isolated() {
        let (registry, _, _) = market();
        let h = harness(registry, true);
        let pulse = MarketPulseService::new(h.rates.clone(), SyntheticEstimator::fixed(0.75));

        let rows = pulse
            .rate_movements(&[PulsePair::new("USD", "INR", 1.0), PulsePair::new("EUR", "GBP", 0.2)])
            .await
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].pair, "USD → INR");
        assert_eq!(rows[0].rate, Some(83.1));
        assert_eq!(rows[0].change.as_ref().unwrap().change_percent, 0.25);

        assert_eq!(rows[1].pair, "EUR → GBP");
        assert_eq!(rows[1].rate, None);
        assert!(rows[1].change.is_none());
    }
}

// ═══════════════════════════════════════════════════════════════════
// Market pulse overview
// ═══════════════════════════════════════════════════════════════════

mod pulse_overview {
    use super::*;

    fn cryptos() -> Vec<String> {
        vec!["BTC".into(), "ETH".into(), "SOL".into()]
    }

    fn pulse_with(markets: Arc<MockMarkets>) -> (MarketPulseService, Harness) {
        let (mut registry, _, _) = market();
        registry.register_market_data(markets);
        let h = harness(registry, true);
        (
            MarketPulseService::new(h.rates.clone(), SyntheticEstimator::fixed(0.75)),
            h,
        )
    }

    #[tokio::test]
    async fn crypto_rows_use_reported_changes() {
        let markets = MockMarkets::new(&[
            ("BTC", 61_000.0, 1.5),
            ("ETH", 2_500.0, -4.2),
            ("SOL", 150.0, 5.126),
        ]);
        let (pulse, _) = pulse_with(markets);

        let overview = pulse.overview(&PulsePair::defaults(), &cryptos()).await.unwrap();
        let pairs: Vec<&str> = overview.rate_movements.iter().map(|r| r.pair.as_str()).collect();
        assert_eq!(
            pairs,
            vec!["USD → INR", "EUR → GBP", "BTC → USD", "ETH → USD", "SOL → USD"]
        );

        let btc = &overview.rate_movements[2];
        assert_eq!(btc.rate, Some(61_000.0));
        let change = btc.change.as_ref().unwrap();
        assert_eq!(change.change_percent, 1.5);
        assert_eq!(change.trend, Trend::Up);
        assert!(!change.synthetic);
        assert_eq!(btc.source.as_deref(), Some("MockMarkets"));

        let eth = overview.rate_movements[3].change.as_ref().unwrap();
        assert_eq!(eth.trend, Trend::Down);
        assert_eq!(overview.rate_movements[4].change.as_ref().unwrap().change_percent, 5.13);

        assert!(overview.rate_movements[0].change.as_ref().unwrap().synthetic);
    }

    #[tokio::test]
    async fn volatility_and_top_crypto() {
        let markets = MockMarkets::new(&[
            ("BTC", 61_000.0, 1.5),
            ("ETH", 2_500.0, -4.2),
            ("SOL", 150.0, 5.1),
        ]);
        let (pulse, _) = pulse_with(markets);

        let overview = pulse.overview(&PulsePair::defaults(), &cryptos()).await.unwrap();
        assert_eq!(overview.volatility.high, vec!["ETH", "SOL"]);
        assert_eq!(overview.volatility.stable, vec!["USD", "EUR", "GBP"]);
        let top = overview.top_crypto.unwrap();
        assert_eq!(top.symbol, "BTC");
        assert_eq!(top.price, 61_000.0);
    }

    #[tokio::test]
    async fn market_data_outage_leaves_fiat_rows_intact() {
        let markets = MockMarkets::new(&[("BTC", 61_000.0, 1.5)]);
        markets.failing.store(true, Ordering::SeqCst);
        let (pulse, _) = pulse_with(markets);

        let overview = pulse.overview(&PulsePair::defaults(), &cryptos()).await.unwrap();
        assert_eq!(overview.rate_movements[0].rate, Some(83.1));
        assert!(overview.rate_movements[2..].iter().all(|r| r.rate.is_none()));
        assert!(overview.volatility.high.is_empty());
        assert!(overview.top_crypto.is_none());
    }

    #[tokio::test]
    async fn market_data_is_cached() {
        let markets = MockMarkets::new(&[("BTC", 61_000.0, 1.5)]);
        let (pulse, _) = pulse_with(markets.clone());

        pulse.overview(&[], &cryptos()).await.unwrap();
        let again = pulse.overview(&[], &cryptos()).await.unwrap();
        assert_eq!(again.rate_movements[0].source.as_deref(), Some("cache"));
        assert_eq!(markets.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_market_data_marks_the_pulse_stale() {
        let markets = MockMarkets::new(&[("BTC", 61_000.0, 1.5)]);
        let (pulse, h) = pulse_with(markets.clone());

        pulse.overview(&[], &cryptos()).await.unwrap();
        h.clock.advance(Duration::from_secs(31));
        markets.failing.store(true, Ordering::SeqCst);

        let overview = pulse.overview(&[], &cryptos()).await.unwrap();
        assert!(overview.stale);
        assert_eq!(overview.rate_movements[0].rate, Some(61_000.0));
    }

    #[tokio::test(start_paused = true)]
    async fn fiat_pairs_are_fetched_concurrently() {
        let slow = MockProvider::slow(
            "SlowFiat",
            &[("USD/INR", 83.1), ("EUR/GBP", 0.86)],
            Duration::from_secs(10),
        );
        let mut registry = ProviderRegistry::new();
        registry.register_fiat_rate(slow.clone());
        let h = harness(registry, true);
        let pulse = MarketPulseService::new(h.rates.clone(), SyntheticEstimator::fixed(0.5));

        let started = Instant::now();
        let rows = pulse.rate_movements(&PulsePair::defaults()).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(15));
        assert_eq!(rows[1].rate, Some(0.86));
        assert_eq!(slow.calls(), 2);
    }
}

// ═══════════════════════════════════════════════════════════════════
// RateEngine facade
// ═══════════════════════════════════════════════════════════════════

mod engine {
    use super::*;

    fn engine() -> RateEngine {
        let (registry, _, _) = market();
        RateEngine::from_parts(
            registry,
            Arc::new(TtlCache::new()),
            &Settings::default(),
            SyntheticEstimator::fixed(0.5),
        )
    }

    #[tokio::test]
    async fn facade_delegates_to_services() {
        let engine = engine();
        assert_eq!(engine.get_price("BTC", "USDT").await.unwrap().value.price, 50_000.0);
        assert_eq!(engine.get_fiat_rate("USD", "EUR").await.unwrap().value.rate, 0.92);
        assert!(approx(engine.convert("BTC", "EUR", 1.0).await.unwrap().result, 46_000.0));
        assert_eq!(engine.cache_len(), 2);
    }

    #[tokio::test]
    async fn empty_pulse_request_uses_default_pairs() {
        let rows = engine().rate_movements(&[]).await.unwrap();
        let pairs: Vec<&str> = rows.iter().map(|r| r.pair.as_str()).collect();
        assert_eq!(pairs, vec!["USD → INR", "EUR → GBP"]);
    }

    #[tokio::test]
    async fn default_market_pulse_tracks_btc_eth_sol() {
        let (mut registry, _, _) = market();
        registry.register_market_data(MockMarkets::new(&[
            ("BTC", 61_000.0, 1.5),
            ("ETH", 2_500.0, -0.4),
            ("SOL", 150.0, 0.2),
        ]));
        let engine = RateEngine::from_parts(
            registry,
            Arc::new(TtlCache::new()),
            &Settings::default(),
            SyntheticEstimator::fixed(0.5),
        );

        let pulse = engine.market_pulse().await.unwrap();
        assert_eq!(pulse.rate_movements.len(), 5);
        assert_eq!(pulse.top_crypto.unwrap().symbol, "BTC");
        assert!(pulse.volatility.high.is_empty());
    }

    #[tokio::test]
    async fn from_settings_starts_and_stops_cleanly() {
        let engine = RateEngine::from_settings(Settings::default()).unwrap();
        assert_eq!(engine.cache_len(), 0);
        assert_eq!(
            engine.rates().registry().crypto_price_names(),
            vec!["Binance", "Coinbase", "CoinGecko", "Kraken", "CoinDesk"]
        );
        engine.shutdown().await;
    }

    #[test]
    fn from_settings_outside_a_runtime_is_a_config_error() {
        let err = RateEngine::from_settings(Settings::default()).unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[tokio::test]
    async fn invalid_settings_are_rejected() {
        let settings = Settings {
            sweep_interval_secs: 0,
            ..Settings::default()
        };
        assert!(RateEngine::from_settings(settings).is_err());
    }
}
