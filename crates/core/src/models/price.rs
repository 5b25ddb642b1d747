use serde::{Deserialize, Serialize};

/// A crypto price normalized from any provider.
///
/// `timestamp` is Unix milliseconds. Either the provider's own update time
/// (CoinGecko, CoinDesk) or the moment the response was parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub price: f64,
    pub timestamp: i64,
    pub provider: String,
}

/// A fiat exchange rate normalized from any provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatePoint {
    pub rate: f64,
    pub timestamp: i64,
}

/// One sample of a historical price series (candle close or chart point).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub timestamp: i64,
    pub price: f64,
}

/// Result of a (possibly composed) conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    pub from: String,
    pub to: String,
    pub amount: f64,
    /// Units of `to` per one unit of `from`.
    pub rate: f64,
    pub result: f64,
    /// Provider (or "cache") behind each leg, in leg order.
    pub sources: Vec<String>,
    /// At least one leg was answered from an expired cache entry.
    pub stale: bool,
    pub timestamp: i64,
}

/// Where a value handed back by the orchestrator came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuoteSource {
    /// Fetched just now from the named provider.
    Live { provider: String },
    /// Served from a fresh cache entry.
    Cache,
    /// Every provider failed; this is the last value fetched for the key.
    Stale,
}

/// A value plus its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote<T> {
    pub value: T,
    pub source: QuoteSource,
}

impl<T> Quote<T> {
    pub fn live(value: T, provider: impl Into<String>) -> Self {
        Self {
            value,
            source: QuoteSource::Live {
                provider: provider.into(),
            },
        }
    }

    pub fn cached(value: T) -> Self {
        Self {
            value,
            source: QuoteSource::Cache,
        }
    }

    pub fn stale(value: T) -> Self {
        Self {
            value,
            source: QuoteSource::Stale,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.source == QuoteSource::Stale
    }

    pub fn is_cached(&self) -> bool {
        self.source == QuoteSource::Cache
    }

    /// Label for diagnostics: provider name, "cache" or "stale-cache".
    pub fn source_label(&self) -> String {
        match &self.source {
            QuoteSource::Live { provider } => provider.clone(),
            QuoteSource::Cache => "cache".to_string(),
            QuoteSource::Stale => "stale-cache".to_string(),
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// Direction shown next to a change figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
}

/// A 24h movement in percent, rounded to two decimals.
///
/// `synthetic` is true when the figure was simulated rather than reported by a
/// provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceChange {
    pub change_percent: f64,
    pub trend: Trend,
    pub synthetic: bool,
}

impl PriceChange {
    /// A movement reported by a provider. Positive is up, zero or negative is down.
    pub fn observed(change_percent: f64) -> Self {
        Self {
            change_percent: round2(change_percent),
            trend: if change_percent > 0.0 {
                Trend::Up
            } else {
                Trend::Down
            },
            synthetic: false,
        }
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One coin of a market overview: USD spot price and its reported 24h change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Uppercased ticker (e.g., "BTC")
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change_24h_percent: f64,
    pub market_cap: Option<f64>,
    pub total_volume: Option<f64>,
}
