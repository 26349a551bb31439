use serde::{Deserialize, Serialize};

use super::fundamentals::Fundamentals;
use super::quote::{Bar, Quote};

/// Payload of a resolved request, one variant per dataset shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "camelCase")]
pub enum MarketData {
    Quote(Quote),
    Quotes(Vec<Quote>),
    Bars(Vec<Bar>),
    Fundamentals(Fundamentals),
}

impl MarketData {
    pub fn into_quote(self) -> Option<Quote> {
        match self {
            Self::Quote(q) => Some(q),
            _ => None,
        }
    }

    pub fn into_quotes(self) -> Option<Vec<Quote>> {
        match self {
            Self::Quotes(q) => Some(q),
            Self::Quote(q) => Some(vec![q]),
            _ => None,
        }
    }

    pub fn into_bars(self) -> Option<Vec<Bar>> {
        match self {
            Self::Bars(b) => Some(b),
            _ => None,
        }
    }

    pub fn into_fundamentals(self) -> Option<Fundamentals> {
        match self {
            Self::Fundamentals(f) => Some(f),
            _ => None,
        }
    }

    /// Number of records carried.
    pub fn record_count(&self) -> usize {
        match self {
            Self::Quote(_) | Self::Fundamentals(_) => 1,
            Self::Quotes(q) => q.len(),
            Self::Bars(b) => b.len(),
        }
    }
}
