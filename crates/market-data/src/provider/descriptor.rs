//! Static per-provider configuration.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::DatasetKind;

/// Default priority when a descriptor does not list one for a dataset.
const DEFAULT_PRIORITY: u8 = 10;

/// Default maximum concurrent requests per provider.
const DEFAULT_CONCURRENCY_LIMIT: usize = 5;

/// Default minimum spacing between dispatches.
const DEFAULT_MIN_INTERVAL_MS: u64 = 100;

/// Describes one provider: where it sits in each dataset's priority order and
/// how hard it may be called.
///
/// Loaded once at startup and never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDescriptor {
    /// Must match the adapter's [`Provider::id`](super::Provider::id).
    pub name: String,

    /// Per-dataset priority. Lower values = higher priority.
    #[serde(default)]
    pub priorities: HashMap<DatasetKind, u8>,

    /// Priority for datasets not listed in `priorities`.
    #[serde(default = "default_priority")]
    pub default_priority: u8,

    /// Maximum concurrent calls in flight.
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,

    /// Minimum delay between consecutive dispatches.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Per-call timeout override. Falls back to the global request timeout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,

    /// Disabled providers are skipped without being contacted.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_priority() -> u8 {
    DEFAULT_PRIORITY
}

fn default_concurrency_limit() -> usize {
    DEFAULT_CONCURRENCY_LIMIT
}

fn default_min_interval_ms() -> u64 {
    DEFAULT_MIN_INTERVAL_MS
}

fn default_enabled() -> bool {
    true
}

impl ProviderDescriptor {
    /// Descriptor with default budgets.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priorities: HashMap::new(),
            default_priority: DEFAULT_PRIORITY,
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            min_interval_ms: DEFAULT_MIN_INTERVAL_MS,
            timeout_ms: None,
            enabled: true,
        }
    }

    pub fn with_priority(mut self, kind: DatasetKind, priority: u8) -> Self {
        self.priorities.insert(kind, priority);
        self
    }

    pub fn with_limits(mut self, concurrency_limit: usize, min_interval: Duration) -> Self {
        self.concurrency_limit = concurrency_limit;
        self.min_interval_ms = min_interval.as_millis() as u64;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Priority for a dataset. Lower values = higher priority.
    pub fn priority_for(&self, kind: DatasetKind) -> u8 {
        self.priorities
            .get(&kind)
            .copied()
            .unwrap_or(self.default_priority)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}
