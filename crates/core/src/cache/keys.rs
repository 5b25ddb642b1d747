//! Composite cache keys: `<domain>:<operation>:<symbol>:<quote>`.
//!
//! Symbols are uppercased so `btc` and `BTC` share one entry.

pub struct CacheKey;

impl CacheKey {
    pub fn crypto_price(symbol: &str, quote: &str) -> String {
        format!(
            "crypto:price:{}:{}",
            symbol.to_uppercase(),
            quote.to_uppercase()
        )
    }

    pub fn fiat_rate(from: &str, to: &str) -> String {
        format!("fiat:rate:{}:{}", from.to_uppercase(), to.to_uppercase())
    }

    pub fn history(symbol: &str, quote: &str, days: u32) -> String {
        format!(
            "crypto:history:{}:{}:{days}",
            symbol.to_uppercase(),
            quote.to_uppercase()
        )
    }

    pub fn currencies() -> String {
        "fiat:currencies".to_string()
    }

    pub fn cryptos() -> String {
        "crypto:symbols".to_string()
    }

    /// One entry per requested symbol list, order included.
    pub fn markets(symbols: &[String]) -> String {
        let joined: Vec<String> = symbols.iter().map(|s| s.to_uppercase()).collect();
        format!("crypto:markets:{}", joined.join(","))
    }
}
