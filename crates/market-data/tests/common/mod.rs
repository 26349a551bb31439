#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use tickerhub_market_data::{
    DatasetKind, MarketDataConfig, MarketDataError, Provider, ProviderDescriptor, ProviderError,
    QualityIssue, QualityIssueSink, Quote, QuoteSource,
};

/// How a mock answers.
#[derive(Clone, Debug)]
pub enum Behavior {
    /// Return a quote at this price and change percent.
    Price(Decimal, Decimal),
    Fail(ProviderError),
    /// Sleep, then answer with a valid quote.
    Hang(Duration),
}

pub struct MockQuoteSource {
    id: &'static str,
    behavior: Mutex<Behavior>,
    available: AtomicBool,
    /// Identifiers left out of batch answers.
    missing: Vec<String>,
    /// Exchange tag prepended to returned codes, e.g. `sz`.
    prefix: &'static str,
    delay: Duration,
    liveness_delay: Duration,
    pub calls: AtomicUsize,
    active: AtomicUsize,
    pub peak: AtomicUsize,
}

impl MockQuoteSource {
    pub fn new(id: &'static str, behavior: Behavior) -> Self {
        Self {
            id,
            behavior: Mutex::new(behavior),
            available: AtomicBool::new(true),
            missing: Vec::new(),
            prefix: "",
            delay: Duration::ZERO,
            liveness_delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn valid(id: &'static str) -> Self {
        Self::new(id, Behavior::Price(dec!(1855.01), dec!(1.2)))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_prefix(mut self, prefix: &'static str) -> Self {
        self.prefix = prefix;
        self
    }

    pub fn with_liveness_delay(mut self, delay: Duration) -> Self {
        self.liveness_delay = delay;
        self
    }

    pub fn with_missing(mut self, missing: &[&str]) -> Self {
        self.missing = missing.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn unavailable(self) -> Self {
        self.available.store(false, Ordering::SeqCst);
        self
    }

    pub fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn quote(&self, symbol: &str, price: Decimal, change: Decimal) -> Quote {
        let symbol = format!("{}{}", self.prefix, symbol);
        let mut quote = Quote::new(symbol, price, change, Utc::now());
        quote.volume = Some(dec!(1000000));
        quote
    }
}

#[async_trait]
impl Provider for MockQuoteSource {
    fn id(&self) -> &'static str {
        self.id
    }

    async fn is_available(&self) -> bool {
        if !self.liveness_delay.is_zero() {
            tokio::time::sleep(self.liveness_delay).await;
        }
        self.available.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteSource for MockQuoteSource {
    async fn get_quote(&self, symbol: &str) -> Result<Quote, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let behavior = self.behavior.lock().unwrap().clone();
        let result = match behavior {
            Behavior::Price(price, change) => Ok(self.quote(symbol, price, change)),
            Behavior::Fail(err) => Err(err),
            Behavior::Hang(duration) => {
                tokio::time::sleep(duration).await;
                Ok(self.quote(symbol, dec!(1855.01), dec!(1.2)))
            }
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn get_batch(&self, symbols: &[String]) -> Result<Vec<Quote>, ProviderError> {
        let mut quotes = Vec::new();
        for symbol in symbols.iter().filter(|s| !self.missing.contains(*s)) {
            quotes.push(self.get_quote(symbol).await?);
        }
        Ok(quotes)
    }
}

/// Sink that keeps every issue in memory.
#[derive(Default)]
pub struct RecordingSink {
    pub issues: Mutex<Vec<QualityIssue>>,
}

impl RecordingSink {
    pub fn issues(&self) -> Vec<QualityIssue> {
        self.issues.lock().unwrap().clone()
    }
}

#[async_trait]
impl QualityIssueSink for RecordingSink {
    async fn record_issue(&self, issue: QualityIssue) -> Result<(), MarketDataError> {
        self.issues.lock().unwrap().push(issue);
        Ok(())
    }
}

/// Sink that always fails.
pub struct FailingSink;

#[async_trait]
impl QualityIssueSink for FailingSink {
    async fn record_issue(&self, _issue: QualityIssue) -> Result<(), MarketDataError> {
        Err(MarketDataError::IssueSink("table locked".to_string()))
    }
}

/// Quote providers in the given order, no spacing, 5 concurrent.
pub fn quote_config(names: &[&str]) -> MarketDataConfig {
    MarketDataConfig {
        providers: names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                ProviderDescriptor::new(*name)
                    .with_priority(DatasetKind::Quote, i as u8 + 1)
                    .with_limits(5, Duration::ZERO)
            })
            .collect(),
        ..Default::default()
    }
}

/// Let spawned sink writes run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}
