//! Error types for the market data crate.
//!
//! This module provides:
//! - [`ProviderError`]: what an adapter reports for a failed call
//! - [`MarketDataError`]: the orchestrator's taxonomy, one value per attempt
//! - [`CacheError`]: non-fatal cache failures, logged and treated as a miss
//! - [`ConfigError`]: fatal configuration problems found at startup

mod provider;

pub use provider::ProviderError;

use thiserror::Error;

/// Errors produced while resolving a request.
///
/// Everything except [`AllProvidersExhausted`](Self::AllProvidersExhausted) is
/// recovered inside the failover loop and only shows up in diagnostics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketDataError {
    /// Provider could not be reached, was throttled, or failed its liveness check.
    #[error("{provider}: {source}")]
    ProviderUnavailable {
        provider: String,
        #[source]
        source: ProviderError,
    },

    /// Provider call exceeded its timeout.
    #[error("{provider}: timeout")]
    ProviderTimeout { provider: String },

    /// Provider answered with something unusable (malformed, not found).
    #[error("{provider}: {source}")]
    ProviderFailed {
        provider: String,
        #[source]
        source: ProviderError,
    },

    /// Provider data failed a hard validation rule.
    #[error("{provider}: invalid data ({reason})")]
    ProviderDataInvalid { provider: String, reason: String },

    /// Every provider for the request was tried or skipped without a valid result.
    #[error("{0}")]
    AllProvidersExhausted(String),

    /// Quality-issue sink rejected a write.
    #[error("issue sink error: {0}")]
    IssueSink(String),
}

impl MarketDataError {
    /// Wrap an adapter error with the provider that produced it.
    pub fn from_provider(provider: &str, err: ProviderError) -> Self {
        let provider = provider.to_string();
        match err {
            ProviderError::Timeout => Self::ProviderTimeout { provider },
            ProviderError::Unavailable(_) | ProviderError::RateLimited => {
                Self::ProviderUnavailable {
                    provider,
                    source: err,
                }
            }
            ProviderError::MalformedResponse(_) | ProviderError::NotFound(_) => {
                Self::ProviderFailed {
                    provider,
                    source: err,
                }
            }
        }
    }

    /// The provider this error is attributed to, if any.
    pub fn provider(&self) -> Option<&str> {
        match self {
            Self::ProviderUnavailable { provider, .. }
            | Self::ProviderTimeout { provider }
            | Self::ProviderFailed { provider, .. }
            | Self::ProviderDataInvalid { provider, .. } => Some(provider),
            Self::AllProvidersExhausted(_) | Self::IssueSink(_) => None,
        }
    }

    /// Whether the underlying failure is likely transient.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ProviderTimeout { .. } | Self::ProviderUnavailable { .. } => true,
            Self::ProviderFailed { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}

/// Cache failures. Never surfaced to callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The stored value is not of the type the reader asked for.
    #[error("cached value for '{key}' is not a {expected}")]
    TypeMismatch { key: String, expected: &'static str },
}

/// Configuration problems. Fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for {name}: '{value}'")]
    InvalidValue { name: String, value: String },

    #[error("duplicate provider: {0}")]
    DuplicateProvider(String),

    #[error("provider '{0}' is registered but has no descriptor")]
    UnknownProvider(String),

    #[error("invalid provider '{provider}': {message}")]
    InvalidProvider { provider: String, message: String },

    #[error("invalid cache settings: {0}")]
    InvalidCache(String),

    #[error("invalid setting: {0}")]
    Invalid(String),
}
