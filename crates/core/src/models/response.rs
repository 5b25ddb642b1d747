use serde::Serialize;

use crate::errors::CoreError;
use crate::models::price::Quote;

/// Envelope handed to whatever serves results to clients: `{success, data}` or
/// `{success: false, message}`. Provider exhaustion is a normal, non-fatal answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Set when `data` came from an expired cache entry.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stale: bool,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            stale: false,
        }
    }

    pub fn ok_stale(data: T) -> Self {
        Self {
            stale: true,
            ..Self::ok(data)
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
            stale: false,
        }
    }

    pub fn from_result(result: Result<T, CoreError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::failure(e.to_string()),
        }
    }
}

impl<T> ApiResponse<T> {
    /// Unwraps the quote; an expired-cache answer sets `stale`.
    pub fn from_quote(result: Result<Quote<T>, CoreError>) -> Self {
        match result {
            Ok(quote) if quote.is_stale() => Self::ok_stale(quote.into_value()),
            Ok(quote) => Self::ok(quote.into_value()),
            Err(e) => Self::failure(e.to_string()),
        }
    }
}

/// Suggested HTTP status for an error, for callers that speak HTTP.
pub fn status_hint(err: &CoreError) -> u16 {
    match err {
        CoreError::Validation(_) => 400,
        CoreError::Cancelled => 499,
        e if e.is_unavailable() => 503,
        _ => 500,
    }
}
