//! TickerHub Market Data Crate
//!
//! Provider-agnostic access to A-share market data (quotes, klines,
//! fundamentals) backed by several interchangeable upstream providers.
//!
//! # Overview
//!
//! The crate supports:
//! - Ordered failover across providers, per dataset
//! - Per-provider concurrency and spacing limits
//! - An in-memory TTL cache with hot-key promotion
//! - Plausibility and staleness validation before anything is cached
//! - A uniform [`ResultEnvelope`] for every answer, success or failure
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |   DataRequest    |  (dataset, normalized codes, params, freshness)
//! +------------------+
//!          |
//!          v
//! +------------------+     hit
//! |   CacheStore     | ----------> ResultEnvelope { cached: true }
//! +------------------+
//!          | miss
//!          v
//! +------------------+
//! |  Orchestrator    |  (priority order per dataset, skip disabled)
//! +------------------+
//!          |
//!          v
//! +------------------+
//! | RateLimiter      |  (concurrency + spacing per provider)
//! +------------------+
//!          |
//!          v
//! +------------------+
//! |    Provider      |  (EM, SINA, TENCENT, ... under a timeout)
//! +------------------+
//!          |
//!          v
//! +------------------+
//! |  DataValidator   |  (reject -> next provider, warn -> degraded)
//! +------------------+
//!          |
//!          v
//!   normalize, cache, ResultEnvelope { cached: false }
//! ```
//!
//! # Core Types
//!
//! - [`Orchestrator`] - Single entry point; built with [`OrchestratorBuilder`]
//! - [`DataRequest`] - One logical request
//! - [`ResultEnvelope`] - The answer, with provenance and quality verdict
//! - [`QuoteSource`], [`KlineSource`], [`FundamentalSource`] - Adapter traits
//! - [`MarketDataConfig`] - Startup configuration

pub mod cache;
pub mod config;
pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;

// Re-export commonly used types
pub use cache::{CacheStats, CacheStore};
pub use config::{CacheConfig, MarketDataConfig, RateLimitConfig};
pub use errors::{CacheError, ConfigError, MarketDataError, ProviderError};
pub use models::{
    normalize_symbol, Bar, Board, DataRequest, DatasetKind, Freshness, Fundamentals,
    KlinePeriod, MarketData, ProviderId, Quote, RequestParams, ResultEnvelope, Symbol,
    ValidationVerdict,
};
pub use provider::{FundamentalSource, KlineSource, Provider, ProviderDescriptor, QuoteSource};

// Re-export registry types
pub use registry::{
    AttemptOutcome, DataValidator, FetchDiagnostics, LogIssueSink, Orchestrator,
    OrchestratorBuilder, ProviderAttempt, QualityIssue, QualityIssueSink, RateLimiterManager,
    SkipReason, ValidationSeverity, ValidatorConfig,
};
