//! Market data provider abstractions.
//!
//! This module contains:
//! - The capability traits adapters implement (`QuoteSource`, `KlineSource`,
//!   `FundamentalSource`, all built on `Provider`)
//! - `ProviderDescriptor`, the static priority and rate-limit configuration
//!
//! # Architecture
//!
//! The provider system is designed to be:
//! - **Provider-agnostic**: the orchestrator only sees capability traits and
//!   typed `ProviderError` kinds, never provider-specific parsing
//! - **Fixed at build time**: adapters are registered once on the
//!   orchestrator builder; there is no dynamic loading
//! - **Resilient**: rate limiting and ordered failover protect against
//!   provider failures

mod descriptor;
mod traits;

pub use descriptor::ProviderDescriptor;
pub use traits::{FundamentalSource, KlineSource, Provider, QuoteSource};
