use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use super::http::{build_client, ensure_positive, get_json, trim_base, DEFAULT_TIMEOUT};
use super::traits::{CurrencyListProvider, FiatRateProvider, Provider};
use crate::errors::ProviderError;
use crate::models::asset::CurrencyInfo;
use crate::models::price::RatePoint;

const BASE_URL: &str = "https://api.frankfurter.app";
const NAME: &str = "Frankfurter";

/// Frankfurter API provider for fiat currency exchange rates.
///
/// - **Free**: No API key, no rate limits, open-source.
/// - **Source**: European Central Bank (ECB) reference rates, published once per
///   working day. The rate's timestamp is that publication date, not "now".
/// - **Endpoints**: `/latest?from=&to=`, `/currencies`
pub struct FrankfurterProvider {
    client: Client,
    base_url: String,
}

impl FrankfurterProvider {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL, DEFAULT_TIMEOUT)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            base_url: trim_base(base_url),
        }
    }
}

impl Default for FrankfurterProvider {
    fn default() -> Self {
        Self::new()
    }
}

// ── Frankfurter API response types ──────────────────────────────────

#[derive(Deserialize)]
struct LatestResponse {
    date: Option<String>,
    #[serde(default)]
    rates: HashMap<String, f64>,
}

/// Publication date (`YYYY-MM-DD`) as Unix milliseconds at UTC midnight.
fn date_to_millis(date: &str) -> Option<i64> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_millis())
}

impl Provider for FrankfurterProvider {
    fn name(&self) -> &str {
        NAME
    }
}

#[async_trait]
impl FiatRateProvider for FrankfurterProvider {
    async fn fetch_rate(&self, from: &str, to: &str) -> Result<RatePoint, ProviderError> {
        let base = from.to_uppercase();
        let target = to.to_uppercase();

        // Same currency → rate is 1.0
        if base == target {
            return Ok(RatePoint {
                rate: 1.0,
                timestamp: chrono::Utc::now().timestamp_millis(),
            });
        }

        let url = format!("{}/latest", self.base_url);
        let resp: LatestResponse = get_json(
            &self.client,
            NAME,
            &url,
            &[("from", base.clone()), ("to", target.clone())],
        )
        .await?;

        let rate = resp.rates.get(&target).copied().ok_or_else(|| {
            ProviderError::missing_field(NAME, format!("Rate not found for {base}/{target}"))
        })?;

        let timestamp = resp
            .date
            .as_deref()
            .and_then(date_to_millis)
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());

        Ok(RatePoint {
            rate: ensure_positive(NAME, rate, "rate")?,
            timestamp,
        })
    }
}

#[async_trait]
impl CurrencyListProvider for FrankfurterProvider {
    /// `{ "USD": "United States Dollar", ... }` → sorted by code.
    async fn fetch_currencies(&self) -> Result<Vec<CurrencyInfo>, ProviderError> {
        let url = format!("{}/currencies", self.base_url);
        let resp: BTreeMap<String, String> = get_json(&self.client, NAME, &url, &[]).await?;

        if resp.is_empty() {
            return Err(ProviderError::missing_field(NAME, "Empty currency list"));
        }

        Ok(resp
            .into_iter()
            .map(|(code, name)| CurrencyInfo::new(code, name))
            .collect())
    }
}
