use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fundamentals snapshot for one instrument
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fundamentals {
    pub symbol: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Trailing twelve-month price/earnings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pe_ttm: Option<Decimal>,

    /// Price/book
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pb: Option<Decimal>,

    /// Earnings per share
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eps: Option<Decimal>,

    /// Return on equity, in percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roe: Option<Decimal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_market_cap: Option<Decimal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub float_market_cap: Option<Decimal>,

    /// Period end of the latest financial report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_date: Option<NaiveDate>,

    #[serde(default)]
    pub source: String,
}

impl Fundamentals {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: None,
            pe_ttm: None,
            pb: None,
            eps: None,
            roe: None,
            total_market_cap: None,
            float_market_cap: None,
            report_date: None,
            source: String::new(),
        }
    }
}
