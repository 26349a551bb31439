//! Market data validation.
//!
//! Checks records returned by providers before they are trusted or cached:
//! - Price positivity and absolute range
//! - Daily change within the board's price-limit band (ST aware)
//! - OHLC invariants and non-negative volume
//! - Staleness against a caller-supplied clock
//! - Cross-source divergence against a recent quote from another provider
//!
//! The validator is purely functional. It never logs and never performs I/O;
//! the current time is always passed in.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{normalize_symbol, Bar, Board, Fundamentals, Quote, ValidationVerdict};

/// Validation severity levels.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationSeverity {
    /// Hard failure - reject the record, try next provider.
    Hard,
    /// Soft warning - accept the record, mark it degraded.
    Soft,
}

/// A single finding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationIssue {
    pub severity: ValidationSeverity,
    pub message: String,
}

impl ValidationIssue {
    fn hard(message: impl Into<String>) -> Self {
        Self {
            severity: ValidationSeverity::Hard,
            message: message.into(),
        }
    }

    fn soft(message: impl Into<String>) -> Self {
        Self {
            severity: ValidationSeverity::Soft,
            message: message.into(),
        }
    }
}

/// Validator configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidatorConfig {
    /// Lowest plausible price.
    pub min_price: Decimal,
    /// Highest plausible price.
    pub max_price: Decimal,
    /// Main-board daily limit, in percent.
    pub change_limit: Decimal,
    /// Limit for special-treatment instruments, in percent.
    pub st_change_limit: Decimal,
    /// ChiNext / STAR limit, in percent.
    pub growth_change_limit: Decimal,
    /// Beijing exchange limit, in percent.
    pub beijing_change_limit: Decimal,
    /// Slack added to every limit to absorb rounding of the reported change.
    pub limit_tolerance: Decimal,
    /// Quotes older than this are flagged stale.
    pub max_quote_delay_ms: u64,
    /// Timestamps further than this in the future are flagged.
    pub max_clock_skew_ms: u64,
    /// Relative price divergence between providers that raises a warning.
    pub cross_source_threshold: Decimal,
    /// Two quotes are comparable when their timestamps are this close.
    pub cross_source_window_ms: u64,
    /// Whether to warn on zero volume.
    pub warn_on_zero_volume: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            min_price: Decimal::new(1, 2),          // 0.01
            max_price: Decimal::from(1_000_000i64), // sanity ceiling
            change_limit: Decimal::from(10),
            st_change_limit: Decimal::from(5),
            growth_change_limit: Decimal::from(20),
            beijing_change_limit: Decimal::from(30),
            limit_tolerance: Decimal::new(5, 1), // 0.5
            max_quote_delay_ms: 5 * 60 * 1000,
            max_clock_skew_ms: 60 * 1000,
            cross_source_threshold: Decimal::new(2, 2), // 2%
            cross_source_window_ms: 60 * 1000,
            warn_on_zero_volume: false,
        }
    }
}

/// Market data validator.
#[derive(Clone, Debug, Default)]
pub struct DataValidator {
    config: ValidatorConfig,
}

impl DataValidator {
    /// Create a new validator with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a validator with custom configuration.
    pub fn with_config(config: ValidatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate a single quote.
    ///
    /// `reference` is a recent quote for the same code, usually from another
    /// provider; when it is close enough in time the prices are compared.
    pub fn validate_quote(
        &self,
        quote: &Quote,
        reference: Option<&Quote>,
        now: DateTime<Utc>,
    ) -> ValidationVerdict {
        let mut issues = self.quote_issues(quote, now);
        if let Some(reference) = reference {
            self.check_cross_source(quote, reference, &mut issues);
        }
        verdict_from(issues)
    }

    /// Validate a batch of quotes answering a request for `requested` codes.
    ///
    /// Quotes that fail a hard rule are dropped and the verdict is degraded.
    /// Requested codes missing from the response are a warning. If nothing
    /// survives the batch is invalid.
    pub fn validate_quotes(
        &self,
        quotes: &[Quote],
        requested: &[String],
        now: DateTime<Utc>,
    ) -> (Vec<Quote>, ValidationVerdict) {
        if quotes.is_empty() {
            return (Vec::new(), ValidationVerdict::invalid(vec!["empty batch".to_string()]));
        }

        let total = quotes.len();
        let mut kept = Vec::with_capacity(total);
        let mut rejected = Vec::new();
        let mut warnings = Vec::new();

        for quote in quotes {
            let issues = self.quote_issues(quote, now);
            let (hard, soft) = split(issues);
            if hard.is_empty() {
                warnings.extend(soft.into_iter().map(|m| format!("{}: {}", quote.symbol, m)));
                kept.push(quote.clone());
            } else {
                rejected.push(format!("{}: {}", quote.symbol, hard.join(", ")));
            }
        }

        if kept.is_empty() {
            let mut reasons = vec![format!("all {} quotes failed validation", total)];
            reasons.extend(rejected);
            return (kept, ValidationVerdict::invalid(reasons));
        }

        if !rejected.is_empty() {
            warnings.push(format!(
                "dropped {} of {} quotes ({})",
                rejected.len(),
                total,
                rejected.join("; ")
            ));
        }

        let returned: Vec<String> = kept.iter().map(|q| normalize_symbol(&q.symbol)).collect();
        let missing: Vec<&str> = requested
            .iter()
            .filter(|code| !returned.contains(&normalize_symbol(code)))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            warnings.push(format!("missing quotes for {}", missing.join(",")));
        }

        (kept, ValidationVerdict::degraded(warnings))
    }

    /// Validate a kline series.
    ///
    /// Bars failing a hard rule are dropped (degraded). An empty series, or
    /// one where every bar fails, is invalid.
    pub fn validate_bars(&self, bars: &[Bar]) -> (Vec<Bar>, ValidationVerdict) {
        if bars.is_empty() {
            return (Vec::new(), ValidationVerdict::invalid(vec!["empty series".to_string()]));
        }

        let total = bars.len();
        let ascending = bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp);

        let mut kept = Vec::with_capacity(total);
        let mut first_rejection: Option<String> = None;
        let mut soft_count = 0usize;

        for bar in bars {
            let (hard, soft) = split(self.bar_issues(bar));
            if hard.is_empty() {
                soft_count += usize::from(!soft.is_empty());
                kept.push(bar.clone());
            } else if first_rejection.is_none() {
                first_rejection = Some(format!("{}: {}", bar.timestamp, hard.join(", ")));
            }
        }

        let dropped = total - kept.len();
        if kept.is_empty() {
            let mut reasons = vec![format!("all {} bars failed validation", total)];
            reasons.extend(first_rejection);
            return (kept, ValidationVerdict::invalid(reasons));
        }

        let mut warnings = Vec::new();
        if dropped > 0 {
            warnings.push(format!(
                "dropped {} of {} bars (first: {})",
                dropped,
                total,
                first_rejection.unwrap_or_default()
            ));
        }
        if soft_count > 0 {
            warnings.push(format!("{} bars have close/open outside high-low", soft_count));
        }
        if !ascending {
            warnings.push("bars not in ascending time order".to_string());
        }

        (kept, ValidationVerdict::degraded(warnings))
    }

    /// Validate a fundamentals snapshot.
    pub fn validate_fundamentals(
        &self,
        fundamentals: &Fundamentals,
        today: NaiveDate,
    ) -> ValidationVerdict {
        let mut issues = Vec::new();

        if let Some(cap) = fundamentals.total_market_cap {
            if cap <= Decimal::ZERO {
                issues.push(ValidationIssue::hard(format!(
                    "non-positive market cap: {}",
                    cap
                )));
            }
        }

        if let (Some(total), Some(float)) =
            (fundamentals.total_market_cap, fundamentals.float_market_cap)
        {
            if float > total {
                issues.push(ValidationIssue::soft(format!(
                    "float market cap ({}) exceeds total ({})",
                    float, total
                )));
            }
        }

        if let Some(pe) = fundamentals.pe_ttm {
            if pe < Decimal::ZERO {
                issues.push(ValidationIssue::soft(format!("negative PE: {}", pe)));
            }
        }

        if let Some(pb) = fundamentals.pb {
            if pb < Decimal::ZERO {
                issues.push(ValidationIssue::soft(format!("negative PB: {}", pb)));
            }
        }

        if let Some(date) = fundamentals.report_date {
            if date > today {
                issues.push(ValidationIssue::hard(format!(
                    "report date {} is in the future",
                    date
                )));
            }
        }

        verdict_from(issues)
    }

    /// Daily limit band for a quote, in percent.
    pub fn change_limit_for(&self, quote: &Quote) -> Decimal {
        if quote.is_special_treatment() {
            return self.config.st_change_limit;
        }

        match Board::from_code(&normalize_symbol(&quote.symbol)) {
            board if board.is_growth() => self.config.growth_change_limit,
            Board::Beijing => self.config.beijing_change_limit,
            _ => self.config.change_limit,
        }
    }

    fn quote_issues(&self, quote: &Quote, now: DateTime<Utc>) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        self.check_price(quote, &mut issues);
        self.check_change(quote, &mut issues);
        self.check_quote_ohlc(quote, &mut issues);
        self.check_volume(quote.volume, &mut issues);
        self.check_staleness(quote, now, &mut issues);

        issues
    }

    /// Price must be positive and within the configured range.
    fn check_price(&self, quote: &Quote, issues: &mut Vec<ValidationIssue>) {
        if quote.price <= Decimal::ZERO {
            issues.push(ValidationIssue::hard(format!(
                "non-positive price: {}",
                quote.price
            )));
            return;
        }

        if quote.price < self.config.min_price || quote.price > self.config.max_price {
            issues.push(ValidationIssue::hard(format!(
                "price {} outside range {}-{}",
                quote.price, self.config.min_price, self.config.max_price
            )));
        }
    }

    /// Change must fit the price-limit band.
    fn check_change(&self, quote: &Quote, issues: &mut Vec<ValidationIssue>) {
        let limit = self.change_limit_for(quote);
        if quote.change_percent.abs() > limit + self.config.limit_tolerance {
            issues.push(ValidationIssue::hard(format!(
                "change {}% exceeds limit ±{}%",
                quote.change_percent, limit
            )));
        }
    }

    /// OHLC invariants for the intraday fields a quote may carry.
    fn check_quote_ohlc(&self, quote: &Quote, issues: &mut Vec<ValidationIssue>) {
        let (high, low) = match (quote.high, quote.low) {
            (Some(h), Some(l)) => (h, l),
            _ => return,
        };

        if high < low {
            issues.push(ValidationIssue::hard(format!(
                "high ({}) is less than low ({})",
                high, low
            )));
            return;
        }

        if quote.price < low || quote.price > high {
            issues.push(ValidationIssue::soft(format!(
                "price ({}) outside high/low range ({}-{})",
                quote.price, low, high
            )));
        }
    }

    fn check_volume(&self, volume: Option<Decimal>, issues: &mut Vec<ValidationIssue>) {
        if let Some(volume) = volume {
            if volume < Decimal::ZERO {
                issues.push(ValidationIssue::hard(format!("negative volume: {}", volume)));
            } else if self.config.warn_on_zero_volume && volume.is_zero() {
                issues.push(ValidationIssue::soft("zero volume"));
            }
        }
    }

    fn check_staleness(&self, quote: &Quote, now: DateTime<Utc>, issues: &mut Vec<ValidationIssue>) {
        let age = now.signed_duration_since(quote.timestamp);

        if age > millis(self.config.max_quote_delay_ms) {
            issues.push(ValidationIssue::soft(format!(
                "stale quote: {}s old",
                age.num_seconds()
            )));
        } else if -age > millis(self.config.max_clock_skew_ms) {
            issues.push(ValidationIssue::soft(format!(
                "timestamp {}s in the future",
                (-age).num_seconds()
            )));
        }
    }

    fn check_cross_source(&self, quote: &Quote, reference: &Quote, issues: &mut Vec<ValidationIssue>) {
        if reference.source == quote.source || reference.price <= Decimal::ZERO {
            return;
        }

        let gap = quote.timestamp.signed_duration_since(reference.timestamp).abs();
        if gap > millis(self.config.cross_source_window_ms) {
            return;
        }

        let divergence = (quote.price - reference.price).abs() / reference.price;
        if divergence > self.config.cross_source_threshold {
            issues.push(ValidationIssue::soft(format!(
                "price {} diverges {}% from {} ({})",
                quote.price,
                (divergence * Decimal::ONE_HUNDRED).round_dp(2),
                reference.source,
                reference.price
            )));
        }
    }

    fn bar_issues(&self, bar: &Bar) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        for (label, value) in [
            ("open", bar.open),
            ("high", bar.high),
            ("low", bar.low),
            ("close", bar.close),
        ] {
            if value <= Decimal::ZERO {
                issues.push(ValidationIssue::hard(format!(
                    "non-positive {}: {}",
                    label, value
                )));
            }
        }

        if bar.high < bar.low {
            issues.push(ValidationIssue::hard(format!(
                "high ({}) is less than low ({})",
                bar.high, bar.low
            )));
        } else if bar.open < bar.low
            || bar.open > bar.high
            || bar.close < bar.low
            || bar.close > bar.high
        {
            issues.push(ValidationIssue::soft("open/close outside high-low range"));
        }

        self.check_volume(Some(bar.volume), &mut issues);
        issues
    }
}

fn millis(ms: u64) -> ChronoDuration {
    ChronoDuration::milliseconds(ms as i64)
}

/// Split issues into (hard, soft) messages.
fn split(issues: Vec<ValidationIssue>) -> (Vec<String>, Vec<String>) {
    let mut hard = Vec::new();
    let mut soft = Vec::new();
    for issue in issues {
        match issue.severity {
            ValidationSeverity::Hard => hard.push(issue.message),
            ValidationSeverity::Soft => soft.push(issue.message),
        }
    }
    (hard, soft)
}

fn verdict_from(issues: Vec<ValidationIssue>) -> ValidationVerdict {
    let (hard, soft) = split(issues);
    if hard.is_empty() {
        ValidationVerdict::degraded(soft)
    } else {
        ValidationVerdict::invalid(hard.into_iter().chain(soft).collect())
    }
}
