use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use super::rate_service::RateService;
use super::synthetic::SyntheticEstimator;
use crate::errors::CoreError;
use crate::models::price::{MarketSnapshot, PriceChange, Quote};
use crate::providers::symbols::BRIDGE_FIAT;

/// Cryptos tracked by the default pulse. The first one is the headline coin.
pub const DEFAULT_PULSE_CRYPTOS: [&str; 3] = ["BTC", "ETH", "SOL"];

/// A coin whose absolute 24h change exceeds this many percent is "high volatility".
pub const HIGH_VOLATILITY_THRESHOLD: f64 = 3.0;

/// At most this many coins are listed as high volatility.
pub const MAX_HIGH_VOLATILITY: usize = 2;

/// Fiat currencies listed as stable.
pub const STABLE_CURRENCIES: [&str; 3] = ["USD", "EUR", "GBP"];

/// A fiat pair shown on the market pulse, with the width of its simulated 24h band
/// in percent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulsePair {
    pub from: String,
    pub to: String,
    pub spread: f64,
}

impl PulsePair {
    pub fn new(from: impl Into<String>, to: impl Into<String>, spread: f64) -> Self {
        Self {
            from: from.into().to_uppercase(),
            to: to.into().to_uppercase(),
            spread,
        }
    }

    /// USD → INR (±0.5%) and EUR → GBP (±0.1%).
    pub fn defaults() -> Vec<PulsePair> {
        vec![PulsePair::new("USD", "INR", 1.0), PulsePair::new("EUR", "GBP", 0.2)]
    }

    pub fn label(&self) -> String {
        format!("{} → {}", self.from, self.to)
    }
}

/// One row of the market pulse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateMovement {
    pub pair: String,
    /// `None` when every provider failed for this pair.
    pub rate: Option<f64>,
    /// Only present alongside a rate. Simulated for fiat pairs, reported for cryptos.
    pub change: Option<PriceChange>,
    pub source: Option<String>,
    pub stale: bool,
}

impl RateMovement {
    fn unavailable(pair: String) -> Self {
        Self {
            pair,
            rate: None,
            change: None,
            source: None,
            stale: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Volatility {
    /// Tracked cryptos that moved more than [`HIGH_VOLATILITY_THRESHOLD`] percent.
    pub high: Vec<String>,
    pub stable: Vec<String>,
}

/// Everything shown on the market pulse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPulse {
    /// Fiat pairs first, then one `<SYMBOL> → USD` row per tracked crypto.
    pub rate_movements: Vec<RateMovement>,
    pub volatility: Volatility,
    /// Market snapshot of the headline crypto, when market data was available.
    pub top_crypto: Option<MarketSnapshot>,
    /// At least one figure came from an expired cache entry.
    pub stale: bool,
    pub timestamp: i64,
}

/// Current rates plus 24h movements for fiat pairs and tracked cryptos.
///
/// Fiat movements are simulated by the [`SyntheticEstimator`]; crypto movements are
/// the changes reported by the market data chain. A source that cannot be reached
/// is reported without a rate; it never fails the other rows.
pub struct MarketPulseService {
    rates: Arc<RateService>,
    estimator: SyntheticEstimator,
}

impl MarketPulseService {
    pub fn new(rates: Arc<RateService>, estimator: SyntheticEstimator) -> Self {
        Self { rates, estimator }
    }

    /// Fiat pair rows, fetched concurrently. Errors only when the random source is
    /// unavailable.
    #[instrument(name = "rate_movements", skip_all, fields(pairs = pairs.len()))]
    pub async fn rate_movements(&self, pairs: &[PulsePair]) -> Result<Vec<RateMovement>, CoreError> {
        join_all(pairs.iter().map(|pair| self.fiat_movement(pair)))
            .await
            .into_iter()
            .collect()
    }

    /// Full pulse for `pairs` and `cryptos`. Fiat rates and market data are fetched
    /// concurrently.
    #[instrument(name = "market_pulse", skip_all, fields(pairs = pairs.len(), cryptos = cryptos.len()))]
    pub async fn overview(
        &self,
        pairs: &[PulsePair],
        cryptos: &[String],
    ) -> Result<MarketPulse, CoreError> {
        let (fiat_rows, markets) = tokio::join!(self.rate_movements(pairs), self.markets(cryptos));
        let mut rate_movements = fiat_rows?;

        let (snapshots, markets_stale, source) = match markets {
            Some(quote) => {
                let stale = quote.is_stale();
                let source = quote.source_label();
                (quote.into_value(), stale, Some(source))
            }
            None => (Vec::new(), false, None),
        };

        for symbol in cryptos {
            let symbol = symbol.to_uppercase();
            let pair = format!("{symbol} → {BRIDGE_FIAT}");
            let row = match snapshots.iter().find(|s| s.symbol == symbol) {
                Some(snapshot) => RateMovement {
                    pair,
                    rate: Some(snapshot.price),
                    change: Some(PriceChange::observed(snapshot.change_24h_percent)),
                    source: source.clone(),
                    stale: markets_stale,
                },
                None => RateMovement::unavailable(pair),
            };
            rate_movements.push(row);
        }

        let high = snapshots
            .iter()
            .filter(|s| s.change_24h_percent.abs() > HIGH_VOLATILITY_THRESHOLD)
            .map(|s| s.symbol.clone())
            .take(MAX_HIGH_VOLATILITY)
            .collect();
        let top_crypto = cryptos
            .first()
            .and_then(|headline| {
                snapshots
                    .iter()
                    .find(|s| s.symbol.eq_ignore_ascii_case(headline))
            })
            .cloned();

        Ok(MarketPulse {
            stale: rate_movements.iter().any(|r| r.stale),
            rate_movements,
            volatility: Volatility {
                high,
                stable: STABLE_CURRENCIES.iter().map(|c| c.to_string()).collect(),
            },
            top_crypto,
            timestamp: self.rates.cache().now_millis(),
        })
    }

    async fn fiat_movement(&self, pair: &PulsePair) -> Result<RateMovement, CoreError> {
        match self.rates.get_fiat_rate(&pair.from, &pair.to).await {
            Ok(quote) => Ok(RateMovement {
                pair: pair.label(),
                rate: Some(quote.value.rate),
                change: Some(self.estimator.estimate(pair.spread)?),
                source: Some(quote.source_label()),
                stale: quote.is_stale(),
            }),
            Err(e) => {
                warn!(pair = %pair.label(), error = %e, "Pulse pair unavailable");
                Ok(RateMovement::unavailable(pair.label()))
            }
        }
    }

    async fn markets(&self, cryptos: &[String]) -> Option<Quote<Vec<MarketSnapshot>>> {
        if cryptos.is_empty() {
            return None;
        }
        match self.rates.get_market_snapshots(cryptos).await {
            Ok(quote) => Some(quote),
            Err(e) => {
                warn!(error = %e, "Market data unavailable for pulse");
                None
            }
        }
    }
}
