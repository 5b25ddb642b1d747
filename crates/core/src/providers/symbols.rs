//! Static symbol-mapping tables. Loaded once, never mutated.

/// Ticker → CoinGecko coin id. Symbols outside this table are not priced via CoinGecko.
const COINGECKO_IDS: &[(&str, &str)] = &[
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("SOL", "solana"),
    ("BNB", "binancecoin"),
    ("XRP", "ripple"),
    ("ADA", "cardano"),
    ("DOGE", "dogecoin"),
    ("MATIC", "matic-network"),
    ("DOT", "polkadot"),
    ("AVAX", "avalanche-2"),
    ("SHIB", "shiba-inu"),
    ("LTC", "litecoin"),
    ("LINK", "chainlink"),
    ("UNI", "uniswap"),
    ("ATOM", "cosmos"),
];

/// Kraken's legacy base asset codes. Anything else is passed through unchanged.
const KRAKEN_ALIASES: &[(&str, &str)] = &[("BTC", "XBT"), ("DOGE", "XDG")];

/// ISO 4217 codes treated as fiat when classifying a conversion.
const FIAT_CODES: &[&str] = &[
    "AED", "ARS", "AUD", "BDT", "BGN", "BRL", "CAD", "CHF", "CLP", "CNY", "COP", "CZK", "DKK",
    "EGP", "EUR", "GBP", "HKD", "HUF", "IDR", "ILS", "INR", "ISK", "JPY", "KES", "KRW", "KWD",
    "MXN", "MYR", "NGN", "NOK", "NZD", "PEN", "PHP", "PKR", "PLN", "QAR", "RON", "RUB", "SAR",
    "SEK", "SGD", "THB", "TRY", "TWD", "UAH", "USD", "VND", "ZAR",
];

/// Stablecoin used as the crypto bridge currency.
pub const BRIDGE_QUOTE: &str = "USDT";

/// Fiat anchor the bridge currency is pegged to.
pub const BRIDGE_FIAT: &str = "USD";

pub fn coingecko_id(symbol: &str) -> Option<&'static str> {
    let upper = symbol.to_uppercase();
    COINGECKO_IDS
        .iter()
        .find(|(sym, _)| *sym == upper)
        .map(|(_, id)| *id)
}

pub fn kraken_symbol(symbol: &str) -> String {
    let upper = symbol.to_uppercase();
    KRAKEN_ALIASES
        .iter()
        .find(|(sym, _)| *sym == upper)
        .map(|(_, alias)| (*alias).to_string())
        .unwrap_or(upper)
}

pub fn is_fiat(code: &str) -> bool {
    let upper = code.to_uppercase();
    FIAT_CODES.contains(&upper.as_str())
}

/// USD or its stablecoin stand-in.
pub fn is_usd_like(code: &str) -> bool {
    let upper = code.to_uppercase();
    upper == BRIDGE_FIAT || upper == BRIDGE_QUOTE
}

/// Quote as spoken by exchanges that only list stablecoin pairs (`USD → USDT`).
pub fn to_stablecoin_quote(quote: &str) -> String {
    let upper = quote.to_uppercase();
    if upper == BRIDGE_FIAT {
        BRIDGE_QUOTE.to_string()
    } else {
        upper
    }
}

/// Quote as spoken by fiat-quoted venues (`USDT → USD`).
pub fn to_fiat_quote(quote: &str) -> String {
    let upper = quote.to_uppercase();
    if upper == BRIDGE_QUOTE {
        BRIDGE_FIAT.to_string()
    } else {
        upper
    }
}
