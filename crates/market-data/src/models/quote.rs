use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Real-time quote snapshot
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// Provider-agnostic code
    pub symbol: String,

    /// Display name (may carry the ST marker)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Last traded price
    pub price: Decimal,

    /// Change versus previous close, in percent
    pub change_percent: Decimal,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open: Option<Decimal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<Decimal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<Decimal>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_close: Option<Decimal>,

    /// Traded volume in shares
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<Decimal>,

    /// Exchange timestamp of the snapshot
    pub timestamp: DateTime<Utc>,

    /// Special-treatment flag (narrower price-limit band)
    #[serde(default)]
    pub is_st: bool,

    /// Provider that produced the quote (EM, SINA, ...)
    #[serde(default)]
    pub source: String,
}

impl Quote {
    /// Create a quote with the required fields only
    pub fn new(
        symbol: impl Into<String>,
        price: Decimal,
        change_percent: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            name: None,
            price,
            change_percent,
            open: None,
            high: None,
            low: None,
            prev_close: None,
            volume: None,
            timestamp,
            is_st: false,
            source: String::new(),
        }
    }

    /// Whether the instrument is under special treatment, either flagged by
    /// the provider or marked in its name ("ST", "*ST").
    pub fn is_special_treatment(&self) -> bool {
        self.is_st
            || self
                .name
                .as_deref()
                .map(|n| {
                    let n = n.trim_start().trim_start_matches('*');
                    n.starts_with("ST") || n.starts_with("st")
                })
                .unwrap_or(false)
    }
}

/// One kline bar
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bar {
    /// Bar open time
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,

    /// Traded amount in currency (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            amount: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_quote_new() {
        let quote = Quote::new("600519", dec!(1855.01), dec!(1.2), Utc::now());
        assert_eq!(quote.price, dec!(1855.01));
        assert!(quote.open.is_none());
        assert!(quote.source.is_empty());
        assert!(!quote.is_special_treatment());
    }

    #[test]
    fn test_special_treatment_from_name() {
        let mut quote = Quote::new("600001", dec!(3.2), dec!(0.5), Utc::now());
        quote.name = Some("*ST Example".to_string());
        assert!(quote.is_special_treatment());

        quote.name = Some("ST Other".to_string());
        assert!(quote.is_special_treatment());

        quote.name = Some("Kweichow Moutai".to_string());
        assert!(!quote.is_special_treatment());

        quote.is_st = true;
        assert!(quote.is_special_treatment());
    }

    #[test]
    fn test_quote_serializes_camel_case() {
        let quote = Quote::new("600519", dec!(1855.01), dec!(1.2), Utc::now());
        let value = serde_json::to_value(&quote).unwrap();
        assert!(value.get("changePercent").is_some());
        assert!(value.get("open").is_none());
    }
}
