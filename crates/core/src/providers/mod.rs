pub mod http;
pub mod registry;
pub mod symbols;
pub mod traits;

// API provider implementations
pub mod binance;
pub mod coinbase;
pub mod coindesk;
pub mod coingecko;
pub mod exchange_rate_api;
pub mod fawaz_ahmed;
pub mod frankfurter;
pub mod kraken;
