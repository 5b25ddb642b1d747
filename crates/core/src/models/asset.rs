use serde::{Deserialize, Serialize};

use crate::providers::symbols;

/// Asset class of a currency code. Decides which provider chain prices it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetClass {
    /// Cryptocurrencies (BTC, ETH, USDT, ...) — priced against USDT
    Crypto,
    /// Fiat currencies (USD, EUR, INR, ...) — priced through fiat rate providers
    Fiat,
}

impl AssetClass {
    /// Classify a code. Known ISO fiat codes are fiat; anything else is treated as crypto,
    /// since Binance lists far more bases than any static table could.
    pub fn of(code: &str) -> Self {
        if symbols::is_fiat(code) {
            AssetClass::Fiat
        } else {
            AssetClass::Crypto
        }
    }
}

impl std::fmt::Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetClass::Crypto => write!(f, "Crypto"),
            AssetClass::Fiat => write!(f, "Fiat"),
        }
    }
}

/// A supported fiat currency (`{code, name}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyInfo {
    pub code: String,
    pub name: String,
}

impl CurrencyInfo {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into().to_uppercase(),
            name: name.into(),
        }
    }
}

/// A supported cryptocurrency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoAsset {
    /// Ticker symbol, uppercased (e.g., "BTC")
    pub symbol: String,

    /// Display name. Binance does not publish names, so it repeats the symbol there.
    pub name: String,

    /// Exchange pair used for pricing, when the source exposes one (e.g., "BTCUSDT")
    pub trading_symbol: Option<String>,
}
