//! Capability traits implemented by provider adapters.
//!
//! A provider declares what it can serve by implementing one or more of
//! [`QuoteSource`], [`KlineSource`] and [`FundamentalSource`]. The orchestrator
//! keeps one registry per capability, so asking a kline-only adapter for a
//! quote is a type error rather than a runtime check.

use async_trait::async_trait;

use crate::errors::ProviderError;
use crate::models::{Bar, Fundamentals, KlinePeriod, Quote};

/// Behaviour shared by every provider adapter.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use tickerhub_market_data::provider::{Provider, QuoteSource};
///
/// struct SinaAdapter {
///     client: reqwest::Client,
/// }
///
/// #[async_trait]
/// impl Provider for SinaAdapter {
///     fn id(&self) -> &'static str {
///         "SINA"
///     }
/// }
///
/// #[async_trait]
/// impl QuoteSource for SinaAdapter {
///     async fn get_quote(&self, symbol: &str) -> Result<Quote, ProviderError> {
///         let body = self.client.get(url_for(symbol)).send().await?.text().await?;
///         parse_quote(symbol, &body)
///     }
/// }
/// ```
#[async_trait]
pub trait Provider: Send + Sync {
    /// Unique identifier for this provider.
    ///
    /// Must match the `name` of its [`ProviderDescriptor`](super::ProviderDescriptor);
    /// used for priority lookup, rate limiting, logging and provenance.
    fn id(&self) -> &'static str;

    /// Lightweight liveness check, consulted before every attempt.
    ///
    /// Returning `false` skips the provider for the current request.
    async fn is_available(&self) -> bool {
        true
    }
}

/// Real-time quotes.
#[async_trait]
pub trait QuoteSource: Provider {
    /// Latest quote for one normalized code.
    ///
    /// Must either return a fully populated quote or an error; a missing
    /// price is [`ProviderError::NotFound`] or
    /// [`ProviderError::MalformedResponse`], never a zero.
    async fn get_quote(&self, symbol: &str) -> Result<Quote, ProviderError>;

    /// Latest quotes for several codes.
    ///
    /// The default implementation calls [`get_quote`](Self::get_quote)
    /// sequentially and fails on the first error. Providers with a native
    /// batch endpoint should override it.
    async fn get_batch(&self, symbols: &[String]) -> Result<Vec<Quote>, ProviderError> {
        let mut quotes = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            quotes.push(self.get_quote(symbol).await?);
        }
        Ok(quotes)
    }
}

/// Kline / price history.
#[async_trait]
pub trait KlineSource: Provider {
    /// The most recent `limit` bars of `period`, ordered by timestamp ascending.
    async fn get_history(
        &self,
        symbol: &str,
        period: KlinePeriod,
        limit: usize,
    ) -> Result<Vec<Bar>, ProviderError>;
}

/// Fundamentals snapshots.
#[async_trait]
pub trait FundamentalSource: Provider {
    async fn get_fundamentals(&self, symbol: &str) -> Result<Fundamentals, ProviderError>;
}
