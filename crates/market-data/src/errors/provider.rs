//! Adapter-facing error kinds.
//!
//! Adapters report every expected failure as a [`ProviderError`]. The
//! orchestrator treats all of them as "try the next provider"; the kind only
//! decides how the attempt is logged and summarised.

use reqwest::StatusCode;
use thiserror::Error;

/// Failure reported by a single provider call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Connection failed, upstream returned 5xx, or the liveness check said no.
    #[error("unavailable{}", detail(.0))]
    Unavailable(String),

    /// The call did not finish within the provider's timeout.
    #[error("timeout")]
    Timeout,

    /// The upstream answered, but the payload could not be turned into
    /// fully-populated domain data.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The upstream does not know the identifier.
    #[error("not found: {0}")]
    NotFound(String),

    /// The upstream throttled the call (HTTP 429).
    #[error("rate limited")]
    RateLimited,
}

fn detail(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(" ({})", message)
    }
}

impl ProviderError {
    /// Classify an HTTP status that the adapter did not expect.
    pub fn from_status(status: StatusCode, context: impl Into<String>) -> Self {
        let context = context.into();
        match status {
            StatusCode::NOT_FOUND => Self::NotFound(context),
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited,
            s if s.is_server_error() => Self::Unavailable(format!("HTTP {}", s.as_u16())),
            s => Self::MalformedResponse(format!("unexpected HTTP {}: {}", s.as_u16(), context)),
        }
    }

    /// Whether the failure is likely to clear up on its own.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout | Self::RateLimited)
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            Self::from_status(status, err.to_string())
        } else {
            Self::Unavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedResponse(err.to_string())
    }
}
