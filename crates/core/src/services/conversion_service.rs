use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::rate_service::RateService;
use super::validation::validate_conversion;
use crate::errors::{ConversionLeg, CoreError};
use crate::models::asset::AssetClass;
use crate::models::price::{Conversion, PricePoint, Quote};
use crate::providers::symbols::{is_usd_like, BRIDGE_FIAT, BRIDGE_QUOTE};

/// Converts an amount between any two codes, crypto or fiat.
///
/// Crypto legs are priced against USDT and fiat legs against USD, so a mixed
/// conversion composes two lookups through the dollar:
/// - Fiat → Fiat: one fiat rate (e.g. USD → EUR)
/// - Crypto → Crypto: `price(from) / price(to)`, both in USDT
/// - Crypto → Fiat: `price(from)` in USDT, then USD → target
/// - Fiat → Crypto: source → USD, then divided by `price(to)` in USDT
///
/// USDT is taken as worth exactly one USD. Each leg goes through [`RateService`], so
/// legs are cached independently; a composed result is never cached as a whole.
pub struct ConversionService {
    rates: Arc<RateService>,
}

/// A rate made of one or more legs, with each leg's provenance.
struct Composed {
    rate: f64,
    sources: Vec<String>,
    stale: bool,
}

impl Composed {
    fn identity() -> Self {
        Self {
            rate: 1.0,
            sources: vec!["identity".to_string()],
            stale: false,
        }
    }

    fn single<T>(rate: f64, quote: &Quote<T>) -> Self {
        Self {
            rate,
            sources: vec![quote.source_label()],
            stale: quote.is_stale(),
        }
    }

    fn pair<A, B>(rate: f64, first: &Quote<A>, second: &Quote<B>) -> Self {
        Self {
            rate,
            sources: vec![first.source_label(), second.source_label()],
            stale: first.is_stale() || second.is_stale(),
        }
    }
}

impl ConversionService {
    pub fn new(rates: Arc<RateService>) -> Self {
        Self { rates }
    }

    pub async fn convert(&self, from: &str, to: &str, amount: f64) -> Result<Conversion, CoreError> {
        self.convert_with_cancel(from, to, amount, &CancellationToken::new())
            .await
    }

    /// Convert `amount` of `from` into `to`. `cancel` is threaded to every leg.
    #[instrument(name = "convert", skip(self, cancel), fields(from = %from, to = %to))]
    pub async fn convert_with_cancel(
        &self,
        from: &str,
        to: &str,
        amount: f64,
        cancel: &CancellationToken,
    ) -> Result<Conversion, CoreError> {
        validate_conversion(from, to, amount)?;
        let from = from.to_uppercase();
        let to = to.to_uppercase();

        let composed = if from == to {
            Composed::identity()
        } else {
            match (AssetClass::of(&from), AssetClass::of(&to)) {
                (AssetClass::Fiat, AssetClass::Fiat) => {
                    self.fiat_to_fiat(&from, &to, cancel).await?
                }
                (AssetClass::Crypto, AssetClass::Crypto) => {
                    self.crypto_to_crypto(&from, &to, cancel).await?
                }
                (AssetClass::Crypto, AssetClass::Fiat) => {
                    self.crypto_to_fiat(&from, &to, cancel).await?
                }
                (AssetClass::Fiat, AssetClass::Crypto) => {
                    self.fiat_to_crypto(&from, &to, cancel).await?
                }
            }
        };

        debug!(rate = composed.rate, sources = ?composed.sources, "Conversion composed");

        Ok(Conversion {
            from,
            to,
            amount,
            rate: composed.rate,
            result: amount * composed.rate,
            sources: composed.sources,
            stale: composed.stale,
            timestamp: self.rates.cache().now_millis(),
        })
    }

    // ── Typed entry points ──────────────────────────────────────────

    pub async fn convert_fiat(&self, from: &str, to: &str, amount: f64) -> Result<Conversion, CoreError> {
        self.expect_classes(from, to, AssetClass::Fiat, AssetClass::Fiat)?;
        self.convert(from, to, amount).await
    }

    pub async fn convert_crypto(&self, from: &str, to: &str, amount: f64) -> Result<Conversion, CoreError> {
        self.expect_classes(from, to, AssetClass::Crypto, AssetClass::Crypto)?;
        self.convert(from, to, amount).await
    }

    pub async fn convert_crypto_to_fiat(
        &self,
        from: &str,
        to: &str,
        amount: f64,
    ) -> Result<Conversion, CoreError> {
        self.expect_classes(from, to, AssetClass::Crypto, AssetClass::Fiat)?;
        self.convert(from, to, amount).await
    }

    pub async fn convert_fiat_to_crypto(
        &self,
        from: &str,
        to: &str,
        amount: f64,
    ) -> Result<Conversion, CoreError> {
        self.expect_classes(from, to, AssetClass::Fiat, AssetClass::Crypto)?;
        self.convert(from, to, amount).await
    }

    fn expect_classes(
        &self,
        from: &str,
        to: &str,
        from_class: AssetClass,
        to_class: AssetClass,
    ) -> Result<(), CoreError> {
        let (actual_from, actual_to) = (AssetClass::of(from), AssetClass::of(to));
        if actual_from != from_class || actual_to != to_class {
            return Err(CoreError::Validation(format!(
                "expected {from_class} → {to_class}, got {from} ({actual_from}) → {to} ({actual_to})"
            )));
        }
        Ok(())
    }

    // ── Legs ────────────────────────────────────────────────────────

    async fn fiat_to_fiat(
        &self,
        from: &str,
        to: &str,
        cancel: &CancellationToken,
    ) -> Result<Composed, CoreError> {
        let quote = self
            .rates
            .get_fiat_rate_with_cancel(from, to, cancel)
            .await
            .map_err(|e| CoreError::composer(ConversionLeg::Source, e))?;
        Ok(Composed::single(quote.value.rate, &quote))
    }

    /// USD-per-unit price of a crypto code; `None` for USDT itself, which is the bridge.
    async fn usd_price(
        &self,
        code: &str,
        leg: ConversionLeg,
        cancel: &CancellationToken,
    ) -> Result<Option<Quote<PricePoint>>, CoreError> {
        if is_usd_like(code) {
            return Ok(None);
        }
        self.rates
            .get_price_with_cancel(code, BRIDGE_QUOTE, cancel)
            .await
            .map(Some)
            .map_err(|e| CoreError::composer(leg, e))
    }

    async fn crypto_to_crypto(
        &self,
        from: &str,
        to: &str,
        cancel: &CancellationToken,
    ) -> Result<Composed, CoreError> {
        let source = self.usd_price(from, ConversionLeg::Source, cancel).await?;
        let target = self.usd_price(to, ConversionLeg::Target, cancel).await?;

        Ok(match (source, target) {
            (Some(s), Some(t)) => Composed::pair(s.value.price / t.value.price, &s, &t),
            (Some(s), None) => Composed::single(s.value.price, &s),
            (None, Some(t)) => Composed::single(1.0 / t.value.price, &t),
            (None, None) => Composed::identity(),
        })
    }

    async fn crypto_to_fiat(
        &self,
        from: &str,
        to: &str,
        cancel: &CancellationToken,
    ) -> Result<Composed, CoreError> {
        let source = self.usd_price(from, ConversionLeg::Source, cancel).await?;
        let target = if is_usd_like(to) {
            None
        } else {
            Some(
                self.rates
                    .get_fiat_rate_with_cancel(BRIDGE_FIAT, to, cancel)
                    .await
                    .map_err(|e| CoreError::composer(ConversionLeg::Target, e))?,
            )
        };

        Ok(match (source, target) {
            (Some(s), Some(t)) => Composed::pair(s.value.price * t.value.rate, &s, &t),
            (Some(s), None) => Composed::single(s.value.price, &s),
            (None, Some(t)) => Composed::single(t.value.rate, &t),
            (None, None) => Composed::identity(),
        })
    }

    async fn fiat_to_crypto(
        &self,
        from: &str,
        to: &str,
        cancel: &CancellationToken,
    ) -> Result<Composed, CoreError> {
        let to_usd = if is_usd_like(from) {
            None
        } else {
            Some(
                self.rates
                    .get_fiat_rate_with_cancel(from, BRIDGE_FIAT, cancel)
                    .await
                    .map_err(|e| CoreError::composer(ConversionLeg::Source, e))?,
            )
        };
        let target = self.usd_price(to, ConversionLeg::Target, cancel).await?;

        Ok(match (to_usd, target) {
            (Some(s), Some(t)) => Composed::pair(s.value.rate / t.value.price, &s, &t),
            (Some(s), None) => Composed::single(s.value.rate, &s),
            (None, Some(t)) => Composed::single(1.0 / t.value.price, &t),
            (None, None) => Composed::identity(),
        })
    }
}
