use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::errors::CoreError;

/// Environment variable holding the ExchangeRate-API key.
pub const EXCHANGE_RATE_API_KEY_ENV: &str = "EXCHANGE_RATE_API_KEY";

/// Key under `api_keys` for the ExchangeRate-API key.
pub const EXCHANGE_RATE_API_KEY: &str = "exchange_rate_api";

/// Placeholder shipped in sample env files; treated as "no key".
const PLACEHOLDER_KEY: &str = "your_key_here";

/// Identifies one external rate source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    Binance,
    Coinbase,
    #[serde(rename = "coingecko")]
    CoinGecko,
    Kraken,
    #[serde(rename = "coindesk")]
    CoinDesk,
    Frankfurter,
    FawazAhmed,
    ExchangeRateApi,
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProviderId::Binance => "Binance",
            ProviderId::Coinbase => "Coinbase",
            ProviderId::CoinGecko => "CoinGecko",
            ProviderId::Kraken => "Kraken",
            ProviderId::CoinDesk => "CoinDesk",
            ProviderId::Frankfurter => "Frankfurter",
            ProviderId::FawazAhmed => "Fawaz Ahmed",
            ProviderId::ExchangeRateApi => "ExchangeRate-API",
        };
        write!(f, "{name}")
    }
}

/// Time-to-live per kind of cached data, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheTtl {
    /// Spot crypto prices (volatile).
    pub crypto_price_secs: u64,
    /// Fiat pair rates.
    pub fiat_rate_secs: u64,
    /// Historical series.
    pub history_secs: u64,
    /// Currency and symbol lists (slow-moving reference data).
    pub reference_secs: u64,
}

impl Default for CacheTtl {
    fn default() -> Self {
        Self {
            crypto_price_secs: 30,
            fiat_rate_secs: 60,
            history_secs: 300,
            reference_secs: 3600,
        }
    }
}

impl CacheTtl {
    pub fn crypto_price(&self) -> Duration {
        Duration::from_secs(self.crypto_price_secs)
    }

    pub fn fiat_rate(&self) -> Duration {
        Duration::from_secs(self.fiat_rate_secs)
    }

    pub fn history(&self) -> Duration {
        Duration::from_secs(self.history_secs)
    }

    pub fn reference(&self) -> Duration {
        Duration::from_secs(self.reference_secs)
    }
}

/// Base URLs of every provider. Overridable so tests can point them at a mock server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub binance: String,
    pub coinbase: String,
    pub coingecko: String,
    pub kraken: String,
    pub coindesk: String,
    pub frankfurter: String,
    pub fawaz_ahmed: String,
    pub exchange_rate_api: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            binance: "https://api.binance.com".to_string(),
            coinbase: "https://api.coinbase.com".to_string(),
            coingecko: "https://api.coingecko.com/api/v3".to_string(),
            kraken: "https://api.kraken.com".to_string(),
            coindesk: "https://api.coindesk.com".to_string(),
            frankfurter: "https://api.frankfurter.app".to_string(),
            fawaz_ahmed: "https://cdn.jsdelivr.net/npm/@fawazahmed0/currency-api@latest/v1"
                .to_string(),
            exchange_rate_api: "https://v6.exchangerate-api.com/v6".to_string(),
        }
    }
}

impl Endpoints {
    /// Point every provider at the same base URL (handy for a single mock server).
    pub fn all(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        Self {
            binance: base.clone(),
            coinbase: base.clone(),
            coingecko: base.clone(),
            kraken: base.clone(),
            coindesk: base.clone(),
            frankfurter: base.clone(),
            fawaz_ahmed: base.clone(),
            exchange_rate_api: base,
        }
    }
}

/// Ordered provider preference for each capability.
/// Order is fixed configuration; it is never adjusted at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Chains {
    pub crypto_price: Vec<ProviderId>,
    pub fiat_rate: Vec<ProviderId>,
    pub history: Vec<ProviderId>,
    pub currency_list: Vec<ProviderId>,
    pub crypto_list: Vec<ProviderId>,
    /// Market overview with reported 24h changes (market pulse).
    pub market_data: Vec<ProviderId>,
}

impl Default for Chains {
    fn default() -> Self {
        Self {
            crypto_price: vec![
                ProviderId::Binance,
                ProviderId::Coinbase,
                ProviderId::CoinGecko,
                ProviderId::Kraken,
                ProviderId::CoinDesk,
            ],
            fiat_rate: vec![
                ProviderId::Frankfurter,
                ProviderId::FawazAhmed,
                ProviderId::ExchangeRateApi,
            ],
            history: vec![ProviderId::Binance, ProviderId::CoinGecko],
            currency_list: vec![ProviderId::Frankfurter, ProviderId::ExchangeRateApi],
            crypto_list: vec![ProviderId::Binance, ProviderId::CoinGecko],
            market_data: vec![ProviderId::CoinGecko],
        }
    }
}

/// Runtime configuration for the rates core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Per-request timeout applied to every provider call.
    pub timeout_secs: u64,

    /// How often expired cache entries are swept.
    pub sweep_interval_secs: u64,

    /// Serve an expired cache entry (flagged stale) when every provider fails.
    pub serve_stale: bool,

    pub ttl: CacheTtl,
    pub endpoints: Endpoints,
    pub chains: Chains,

    /// Optional API keys for providers that require them.
    /// Keys: provider name (e.g., "exchange_rate_api").
    pub api_keys: HashMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            sweep_interval_secs: 300,
            serve_stale: true,
            ttl: CacheTtl::default(),
            endpoints: Endpoints::default(),
            chains: Chains::default(),
            api_keys: HashMap::new(),
        }
    }
}

impl Settings {
    pub fn from_json_str(json: &str) -> Result<Self, CoreError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// Pull secrets from the environment. Values already present in `api_keys` win.
    pub fn apply_env(mut self) -> Self {
        if !self.api_keys.contains_key(EXCHANGE_RATE_API_KEY) {
            if let Ok(key) = std::env::var(EXCHANGE_RATE_API_KEY_ENV) {
                self.api_keys.insert(EXCHANGE_RATE_API_KEY.to_string(), key);
            }
        }
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// The ExchangeRate-API key, unless missing, blank or the sample placeholder.
    pub fn exchange_rate_api_key(&self) -> Option<&str> {
        self.api_keys
            .get(EXCHANGE_RATE_API_KEY)
            .map(|k| k.trim())
            .filter(|k| !k.is_empty() && *k != PLACEHOLDER_KEY)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.timeout_secs == 0 {
            return Err(CoreError::Config("timeout_secs must be greater than 0".into()));
        }
        if self.sweep_interval_secs == 0 {
            return Err(CoreError::Config(
                "sweep_interval_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
