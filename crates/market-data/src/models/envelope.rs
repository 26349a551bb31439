use serde::{Deserialize, Serialize};

/// Outcome of validating one candidate record (or record set).
///
/// - `valid=false`: a hard rule failed; the data must not be cached or returned.
/// - `valid=true, degraded=true`: accepted, but with warnings.
/// - `valid=true, degraded=false`: clean.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationVerdict {
    pub valid: bool,
    pub warnings: Vec<String>,
    pub degraded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degrade_reason: Option<String>,
}

impl ValidationVerdict {
    pub fn ok() -> Self {
        Self {
            valid: true,
            warnings: Vec::new(),
            degraded: false,
            degrade_reason: None,
        }
    }

    /// Accepted with warnings.
    pub fn degraded(warnings: Vec<String>) -> Self {
        if warnings.is_empty() {
            return Self::ok();
        }
        let reason = warnings.join("; ");
        Self {
            valid: true,
            warnings,
            degraded: true,
            degrade_reason: Some(reason),
        }
    }

    /// Rejected. `reasons` lists the hard failures first, then any warnings.
    pub fn invalid(reasons: Vec<String>) -> Self {
        Self {
            valid: false,
            warnings: reasons,
            degraded: false,
            degrade_reason: None,
        }
    }

    /// One-line description for logs and diagnostics.
    pub fn summary(&self) -> String {
        if self.warnings.is_empty() {
            "ok".to_string()
        } else {
            self.warnings.join("; ")
        }
    }
}

/// The uniform result contract returned to every caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEnvelope<T> {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Provider that produced the data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    pub cached: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<ValidationVerdict>,
}

impl<T> ResultEnvelope<T> {
    /// Freshly fetched from `source`.
    pub fn fetched(data: T, source: impl Into<String>, quality: ValidationVerdict) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            source: Some(source.into()),
            cached: false,
            quality: Some(quality),
        }
    }

    /// Served from the cache; `source` is the provider that originally produced it.
    pub fn from_cache(data: T, source: impl Into<String>, quality: ValidationVerdict) -> Self {
        Self {
            cached: true,
            ..Self::fetched(data, source, quality)
        }
    }

    /// Terminal failure. Never carries data or a quality verdict, so it can
    /// never be mistaken for a degraded success.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            source: None,
            cached: false,
            quality: None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.success && self.quality.as_ref().map(|q| q.degraded).unwrap_or(false)
    }

    /// Convert the payload, turning a shape mismatch into a failure.
    pub fn narrow<U>(self, f: impl FnOnce(T) -> Option<U>) -> ResultEnvelope<U> {
        if !self.success {
            return ResultEnvelope::failure(self.error.unwrap_or_default());
        }

        match self.data.and_then(f) {
            Some(data) => ResultEnvelope {
                success: true,
                data: Some(data),
                error: None,
                source: self.source,
                cached: self.cached,
                quality: self.quality,
            },
            None => ResultEnvelope::failure("unexpected payload shape"),
        }
    }
}
