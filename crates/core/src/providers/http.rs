//! Plumbing shared by every adapter: client construction, GET-and-decode,
//! and the uniform price sanity check.

use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::errors::{ProviderError, ProviderErrorKind};

/// Timeout applied when an adapter is built without settings.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const USER_AGENT: &str = concat!("skyx-rates/", env!("CARGO_PKG_VERSION"));

/// Build a client whose every request is bounded by `timeout`.
pub fn build_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// GET `url` with `query`, require a 2xx status and decode the JSON body into `T`.
///
/// Never log the URL here: some providers carry credentials in the path.
pub async fn get_json<T: DeserializeOwned>(
    client: &Client,
    provider: &str,
    url: &str,
    query: &[(&str, String)],
) -> Result<T, ProviderError> {
    debug!(provider, "Requesting upstream");
    let response = client
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|e| ProviderError::from_reqwest(provider, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::new(
            provider,
            ProviderErrorKind::HttpStatus(status.as_u16()),
            format!("HTTP error: {status}"),
        ));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| ProviderError::from_reqwest(provider, e))?;

    serde_json::from_slice(&body)
        .map_err(|e| ProviderError::parse(provider, format!("Failed to parse response: {e}")))
}

/// Reject zero, negative and non-finite values. A silently wrong rate is worse than
/// a visible failure.
pub fn ensure_positive(provider: &str, value: f64, what: &str) -> Result<f64, ProviderError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ProviderError::new(
            provider,
            ProviderErrorKind::InvalidPrice,
            format!("Invalid {what}: {value} (must be finite and positive)"),
        ))
    }
}

/// Parse a decimal string as sent by exchanges (`"61234.50"`) and sanity-check it.
pub fn parse_price(provider: &str, raw: &str, what: &str) -> Result<f64, ProviderError> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|e| ProviderError::parse(provider, format!("Invalid {what} format '{raw}': {e}")))?;
    ensure_positive(provider, value, what)
}

pub fn trim_base(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}
