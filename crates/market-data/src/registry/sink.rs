//! Quality-issue reporting.
//!
//! Rejected and degraded provider results are reported to a sink so they can
//! be reviewed later. Writes are fire-and-forget: the orchestrator never waits
//! on a sink and a failing sink only produces a warning.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::MarketDataError;
use crate::models::DatasetKind;

/// One data-quality finding.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityIssue {
    pub dataset: DatasetKind,
    pub identifier: String,
    pub reason: String,
    /// Provider that produced the data.
    pub source: String,
    /// The offending payload as returned by the provider.
    pub payload: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

/// Destination for quality issues (a table, a queue, a log).
#[async_trait]
pub trait QualityIssueSink: Send + Sync {
    async fn record_issue(&self, issue: QualityIssue) -> Result<(), MarketDataError>;
}

/// Writes issues to the log at warn level. The default sink.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogIssueSink;

#[async_trait]
impl QualityIssueSink for LogIssueSink {
    async fn record_issue(&self, issue: QualityIssue) -> Result<(), MarketDataError> {
        log::warn!(
            "Data quality issue [{} {}] from '{}': {}",
            issue.dataset,
            issue.identifier,
            issue.source,
            issue.reason
        );
        Ok(())
    }
}
