//! Per-request fetch diagnostics.

use std::time::Duration;

use crate::errors::MarketDataError;
use crate::models::ProviderId;

/// Why a provider was skipped without being contacted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Descriptor has `enabled: false`.
    Disabled,
}

/// What happened to one provider during a fetch.
#[derive(Clone, Debug, PartialEq)]
pub enum AttemptOutcome {
    Success,
    Skipped(SkipReason),
    Failed(MarketDataError),
}

/// Record of a single provider attempt during a fetch.
#[derive(Clone, Debug)]
pub struct ProviderAttempt {
    pub provider_id: ProviderId,
    pub outcome: AttemptOutcome,
    /// Wall time spent on the attempt, including rate-limit waits.
    pub elapsed: Duration,
}

impl ProviderAttempt {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Success)
    }

    pub fn error(&self) -> Option<&MarketDataError> {
        match &self.outcome {
            AttemptOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match &self.outcome {
            AttemptOutcome::Skipped(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Detailed account of how a request was resolved.
#[derive(Clone, Debug, Default)]
pub struct FetchDiagnostics {
    /// Served from the cache without contacting any provider.
    pub cache_hit: bool,
    /// Waited on another caller's in-flight fetch for the same key.
    pub coalesced: bool,
    pub attempts: Vec<ProviderAttempt>,
}

impl FetchDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_skip(&mut self, provider_id: ProviderId, reason: SkipReason) {
        self.attempts.push(ProviderAttempt {
            provider_id,
            outcome: AttemptOutcome::Skipped(reason),
            elapsed: Duration::ZERO,
        });
    }

    pub fn record_error(&mut self, provider_id: ProviderId, error: MarketDataError, elapsed: Duration) {
        self.attempts.push(ProviderAttempt {
            provider_id,
            outcome: AttemptOutcome::Failed(error),
            elapsed,
        });
    }

    pub fn record_success(&mut self, provider_id: ProviderId, elapsed: Duration) {
        self.attempts.push(ProviderAttempt {
            provider_id,
            outcome: AttemptOutcome::Success,
            elapsed,
        });
    }

    /// Summary for logging/debugging.
    pub fn summary(&self) -> String {
        if self.cache_hit {
            return "CACHE: HIT".to_string();
        }

        self.attempts
            .iter()
            .map(|a| match &a.outcome {
                AttemptOutcome::Success => format!("{}: SUCCESS", a.provider_id),
                AttemptOutcome::Skipped(reason) => {
                    format!("{}: SKIPPED ({:?})", a.provider_id, reason)
                }
                AttemptOutcome::Failed(err) => format!("{}: ERROR ({})", a.provider_id, err),
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// Provider failures in attempt order, e.g. `"EM: timeout; SINA: unavailable"`.
    pub fn failure_summary(&self) -> String {
        self.errors()
            .iter()
            .map(|err| err.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Check if any provider succeeded.
    pub fn has_success(&self) -> bool {
        self.attempts.iter().any(ProviderAttempt::is_success)
    }

    /// Number of providers actually called.
    pub fn providers_contacted(&self) -> usize {
        self.attempts
            .iter()
            .filter(|a| a.skip_reason().is_none())
            .count()
    }

    /// Get all skip reasons.
    pub fn skip_reasons(&self) -> Vec<(&ProviderId, &SkipReason)> {
        self.attempts
            .iter()
            .filter_map(|a| a.skip_reason().map(|s| (&a.provider_id, s)))
            .collect()
    }

    /// Get all errors.
    pub fn errors(&self) -> Vec<&MarketDataError> {
        self.attempts.iter().filter_map(ProviderAttempt::error).collect()
    }
}
