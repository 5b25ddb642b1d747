use std::fmt;

use thiserror::Error;

/// What went wrong inside a single provider adapter.
///
/// The orchestrator decides fallback vs. final failure by looking at this tag,
/// never at the error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Connection refused, DNS failure, TLS error, body read failure.
    Network,
    /// The bounded per-request timeout elapsed.
    Timeout,
    /// The caller aborted the request.
    Cancelled,
    /// Non-2xx HTTP status.
    HttpStatus(u16),
    /// Body was not the JSON shape we expected.
    Parse,
    /// JSON parsed but the price/rate field was absent.
    MissingField,
    /// No mapping entry for this symbol/pair in the provider's table.
    UnsupportedSymbol,
    /// Price or rate was zero, negative, NaN or infinite.
    InvalidPrice,
    /// The provider answered with an explicit error payload.
    Upstream,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderErrorKind::Network => write!(f, "network"),
            ProviderErrorKind::Timeout => write!(f, "timeout"),
            ProviderErrorKind::Cancelled => write!(f, "cancelled"),
            ProviderErrorKind::HttpStatus(code) => write!(f, "{code}"),
            ProviderErrorKind::Parse => write!(f, "parse"),
            ProviderErrorKind::MissingField => write!(f, "missing field"),
            ProviderErrorKind::UnsupportedSymbol => write!(f, "unsupported symbol"),
            ProviderErrorKind::InvalidPrice => write!(f, "invalid price"),
            ProviderErrorKind::Upstream => write!(f, "upstream"),
        }
    }
}

/// Failure of one adapter for one request. Always caught by the orchestrator.
#[derive(Debug, Clone, Error)]
#[error("{provider} failed ({kind}): {message}")]
pub struct ProviderError {
    pub provider: String,
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(
        provider: impl Into<String>,
        kind: ProviderErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn unsupported(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::UnsupportedSymbol, message)
    }

    pub fn missing_field(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::MissingField, message)
    }

    pub fn parse(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::Parse, message)
    }

    pub fn upstream(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::Upstream, message)
    }

    pub fn cancelled(provider: impl Into<String>) -> Self {
        Self::new(provider, ProviderErrorKind::Cancelled, "request cancelled by caller")
    }

    /// Classify a reqwest failure.
    ///
    /// The URL is stripped from the message: ExchangeRate-API carries its key in the
    /// path and reqwest errors embed the full request URL.
    pub fn from_reqwest(provider: impl Into<String>, e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            ProviderErrorKind::Timeout
        } else if let Some(status) = e.status() {
            ProviderErrorKind::HttpStatus(status.as_u16())
        } else if e.is_decode() {
            ProviderErrorKind::Parse
        } else {
            ProviderErrorKind::Network
        };
        Self::new(provider, kind, e.without_url().to_string())
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ProviderErrorKind::Cancelled
    }
}

/// Which half of a composed conversion failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionLeg {
    /// The leg pricing the `from` side.
    Source,
    /// The leg pricing the `to` side.
    Target,
}

impl fmt::Display for ConversionLeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionLeg::Source => write!(f, "source"),
            ConversionLeg::Target => write!(f, "target"),
        }
    }
}

/// Unified error type for the rates core.
/// Every public service function returns `Result<T, CoreError>`.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Caller input ────────────────────────────────────────────────
    #[error("Validation failed: {0}")]
    Validation(String),

    // ── Provider chains ─────────────────────────────────────────────
    #[error("Unable to fetch {request} - all providers failed. Last error: {last_error}")]
    AllProvidersFailed {
        request: String,
        last_error: ProviderError,
    },

    #[error("No provider configured for {0}")]
    NoProvider(String),

    #[error("Request cancelled")]
    Cancelled,

    // ── Composition ─────────────────────────────────────────────────
    #[error("Conversion failed on the {leg} leg: {source}")]
    Composer {
        leg: ConversionLeg,
        #[source]
        source: Box<CoreError>,
    },

    // ── Setup ───────────────────────────────────────────────────────
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Random source unavailable: {0}")]
    Entropy(String),
}

impl CoreError {
    pub fn composer(leg: ConversionLeg, source: CoreError) -> Self {
        CoreError::Composer {
            leg,
            source: Box::new(source),
        }
    }

    /// True when live data could not be obtained from any provider,
    /// including when that happened inside one leg of a conversion.
    pub fn is_unavailable(&self) -> bool {
        match self {
            CoreError::AllProvidersFailed { .. } | CoreError::NoProvider(_) => true,
            CoreError::Composer { source, .. } => source.is_unavailable(),
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            CoreError::Cancelled => true,
            CoreError::Composer { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

// ── Conversion helpers (From impls) ─────────────────────────────────

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Config(e.to_string())
    }
}

impl From<getrandom::Error> for CoreError {
    fn from(e: getrandom::Error) -> Self {
        CoreError::Entropy(e.to_string())
    }
}
