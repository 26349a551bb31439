//! Provider orchestration.
//!
//! This module wires the providers together:
//! - Priority ordering and failover (`Orchestrator`)
//! - Rate limiting per provider (`RateLimiterManager`)
//! - Data validation (`DataValidator`)
//! - Per-request diagnostics and quality-issue reporting

mod diagnostics;
mod orchestrator;
mod rate_limiter;
mod sink;
mod validator;

pub use diagnostics::{AttemptOutcome, FetchDiagnostics, ProviderAttempt, SkipReason};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use rate_limiter::RateLimiterManager;
pub use sink::{LogIssueSink, QualityIssue, QualityIssueSink};
pub use validator::{DataValidator, ValidationIssue, ValidationSeverity, ValidatorConfig};
