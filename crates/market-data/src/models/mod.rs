//! Market data models
//!
//! This module contains the core data types for market data operations:
//! - `types` - Type aliases for common identifiers (ProviderId, Symbol)
//! - `symbol` - Provider-agnostic code normalization and board classification
//! - `request` - Logical requests (DataRequest, DatasetKind, KlinePeriod, Freshness)
//! - `quote` - Quote and kline bar records
//! - `fundamentals` - Fundamentals snapshot
//! - `data` - The dataset-shaped payload carried in envelopes (MarketData)
//! - `envelope` - Validation verdicts and the ResultEnvelope contract

mod data;
mod envelope;
mod fundamentals;
mod quote;
mod request;
mod symbol;
mod types;

pub use data::MarketData;
pub use envelope::{ResultEnvelope, ValidationVerdict};
pub use fundamentals::Fundamentals;
pub use quote::{Bar, Quote};
pub use request::{DataRequest, DatasetKind, Freshness, KlinePeriod, RequestParams};
pub use symbol::{normalize_symbol, Board};
pub use types::{ProviderId, Symbol};
