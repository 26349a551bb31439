use std::fmt;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::symbol::normalize_symbol;
use super::types::Symbol;
use crate::cache::CacheStore;

/// Logical dataset a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Quote,
    Kline,
    Fundamental,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 3] = [Self::Quote, Self::Kline, Self::Fundamental];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Kline => "kline",
            Self::Fundamental => "fundamental",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bar width for kline requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KlinePeriod {
    #[serde(rename = "1m")]
    Minute1,
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "30m")]
    Minute30,
    #[serde(rename = "60m")]
    Minute60,
    #[serde(rename = "day")]
    Daily,
    #[serde(rename = "week")]
    Weekly,
    #[serde(rename = "month")]
    Monthly,
}

impl KlinePeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minute1 => "1m",
            Self::Minute5 => "5m",
            Self::Minute15 => "15m",
            Self::Minute30 => "30m",
            Self::Minute60 => "60m",
            Self::Daily => "day",
            Self::Weekly => "week",
            Self::Monthly => "month",
        }
    }

    pub fn is_intraday(&self) -> bool {
        matches!(
            self,
            Self::Minute1 | Self::Minute5 | Self::Minute15 | Self::Minute30 | Self::Minute60
        )
    }
}

/// Optional request parameters. Only the ones that apply to the dataset are set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    pub period: Option<KlinePeriod>,
    pub limit: Option<usize>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// How fresh the caller needs the data to be.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Freshness {
    /// Any unexpired cache entry is acceptable.
    #[default]
    Cached,
    /// A cache entry older than this is treated as a miss.
    MaxAge(Duration),
    /// Skip the cache read; the result is still cached.
    Live,
}

/// A single logical data request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRequest {
    kind: DatasetKind,
    identifiers: Vec<Symbol>,
    params: RequestParams,
    freshness: Freshness,
}

impl DataRequest {
    /// Latest quote for one instrument.
    pub fn quote(symbol: &str) -> Self {
        Self::new(DatasetKind::Quote, vec![normalize_symbol(symbol)])
    }

    /// Latest quotes for several instruments in one upstream call.
    ///
    /// Identifiers are normalized, sorted and de-duplicated so that the same
    /// set always maps to the same cache slot.
    pub fn batch<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut identifiers: Vec<Symbol> = symbols
            .into_iter()
            .map(|s| normalize_symbol(s.as_ref()))
            .filter(|s| !s.is_empty())
            .collect();
        identifiers.sort();
        identifiers.dedup();
        Self::new(DatasetKind::Quote, identifiers)
    }

    /// The most recent `limit` bars of the given period.
    pub fn kline(symbol: &str, period: KlinePeriod, limit: usize) -> Self {
        let mut request = Self::new(DatasetKind::Kline, vec![normalize_symbol(symbol)]);
        request.params.period = Some(period);
        request.params.limit = Some(limit);
        request
    }

    /// Fundamentals snapshot for one instrument.
    pub fn fundamentals(symbol: &str) -> Self {
        Self::new(DatasetKind::Fundamental, vec![normalize_symbol(symbol)])
    }

    fn new(kind: DatasetKind, identifiers: Vec<Symbol>) -> Self {
        Self {
            kind,
            identifiers,
            params: RequestParams::default(),
            freshness: Freshness::default(),
        }
    }

    /// Restrict a kline request to a date range (inclusive).
    pub fn with_range(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.params.start = start;
        self.params.end = end;
        self
    }

    pub fn with_freshness(mut self, freshness: Freshness) -> Self {
        self.freshness = freshness;
        self
    }

    pub fn kind(&self) -> DatasetKind {
        self.kind
    }

    pub fn identifiers(&self) -> &[Symbol] {
        &self.identifiers
    }

    /// First identifier; the only one for non-batch requests.
    pub fn primary_identifier(&self) -> &str {
        self.identifiers.first().map(String::as_str).unwrap_or_default()
    }

    pub fn is_batch(&self) -> bool {
        self.identifiers.len() > 1
    }

    pub fn params(&self) -> &RequestParams {
        &self.params
    }

    pub fn freshness(&self) -> Freshness {
        self.freshness
    }

    /// Deterministic cache key. Provider-agnostic: every provider's answer to
    /// this request lands in the same slot.
    pub fn cache_key(&self) -> String {
        let identifiers = self.identifiers.join(",");
        let limit = self.params.limit.map(|l| l.to_string());
        let start = self.params.start.map(|d| d.to_string());
        let end = self.params.end.map(|d| d.to_string());

        CacheStore::generate_key(
            self.kind.as_str(),
            [
                Some(identifiers.as_str()),
                self.params.period.as_ref().map(KlinePeriod::as_str),
                limit.as_deref(),
                start.as_deref(),
                end.as_deref(),
            ],
        )
    }
}
