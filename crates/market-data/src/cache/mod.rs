//! Result cache shared by all providers.
//!
//! Keys are provider-agnostic (see [`DataRequest::cache_key`](crate::models::DataRequest::cache_key)),
//! so whichever provider answered first serves every later caller until the
//! entry expires.

mod store;

pub use store::{CacheEntryInfo, CacheStats, CacheStore, SweeperHandle};
