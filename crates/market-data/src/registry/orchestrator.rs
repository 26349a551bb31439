//! Orchestrator for market data providers.
//!
//! The orchestrator is the single entry point callers use. For every request it:
//! - Serves unexpired cache entries without contacting any provider
//! - Otherwise walks the dataset's static priority list, skipping disabled
//!   and unreachable providers
//! - Calls each provider through the rate limiter, under a timeout
//! - Validates the result and fails over on errors or hard rejections
//! - Normalizes, caches and returns the first accepted result
//!
//! Failures are aggregated into diagnostics; only exhaustion of every
//! provider surfaces to the caller, as a `success: false` envelope.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use log::{debug, info, warn};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::Mutex as AsyncMutex;

use super::{
    DataValidator, FetchDiagnostics, LogIssueSink, QualityIssue, QualityIssueSink,
    RateLimiterManager, SkipReason,
};
use crate::cache::{CacheStore, SweeperHandle};
use crate::config::MarketDataConfig;
use crate::errors::{ConfigError, MarketDataError, ProviderError};
use crate::models::{
    normalize_symbol, Bar, DataRequest, DatasetKind, Freshness, Fundamentals, KlinePeriod,
    MarketData, ProviderId, Quote, ResultEnvelope, ValidationVerdict,
};
use crate::provider::{FundamentalSource, KlineSource, ProviderDescriptor, QuoteSource};

/// Bars requested when a kline request carries no limit.
const DEFAULT_KLINE_LIMIT: usize = 120;

/// What the cache holds for a resolved request.
#[derive(Clone, Debug)]
struct CachedResult {
    data: MarketData,
    source: String,
    quality: ValidationVerdict,
}

/// Resolves [`DataRequest`]s against the registered providers.
pub struct Orchestrator {
    config: MarketDataConfig,
    descriptors: HashMap<String, ProviderDescriptor>,
    quote_sources: HashMap<String, Arc<dyn QuoteSource>>,
    kline_sources: HashMap<String, Arc<dyn KlineSource>>,
    fundamental_sources: HashMap<String, Arc<dyn FundamentalSource>>,
    /// Provider names per dataset, highest priority first.
    priorities: HashMap<DatasetKind, Vec<String>>,
    cache: Arc<CacheStore>,
    limiter: Arc<RateLimiterManager>,
    validator: DataValidator,
    sink: Arc<dyn QualityIssueSink>,
    /// Last accepted quote per code, used as the cross-source reference.
    recent_quotes: DashMap<String, Quote>,
    /// Per-key locks for request coalescing.
    inflight: DashMap<String, Arc<AsyncMutex<()>>>,
    /// Sweeper started by the builder; stops when the orchestrator drops.
    sweeper: Option<SweeperHandle>,
}

impl Orchestrator {
    pub fn builder(config: MarketDataConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(config)
    }

    /// Resolve a request.
    pub async fn resolve(&self, request: &DataRequest) -> ResultEnvelope<MarketData> {
        self.resolve_with_diagnostics(request).await.0
    }

    /// Resolve a request, also returning a record of every provider attempt.
    pub async fn resolve_with_diagnostics(
        &self,
        request: &DataRequest,
    ) -> (ResultEnvelope<MarketData>, FetchDiagnostics) {
        let key = request.cache_key();
        let mut diagnostics = FetchDiagnostics::new();

        if let Some(envelope) = self.read_cache(&key, request.freshness()) {
            debug!("Cache hit for '{}'", key);
            diagnostics.cache_hit = true;
            return (envelope, diagnostics);
        }

        if !self.config.coalesce_requests || request.freshness() == Freshness::Live {
            let envelope = self.fetch(request, &key, &mut diagnostics).await;
            return (envelope, diagnostics);
        }

        let lock = Arc::clone(self.inflight.entry(key.clone()).or_default().value());
        let guard = lock.lock().await;

        let envelope = match self.read_cache(&key, request.freshness()) {
            Some(envelope) => {
                debug!("Coalesced request for '{}' served from cache", key);
                diagnostics.cache_hit = true;
                diagnostics.coalesced = true;
                envelope
            }
            None => self.fetch(request, &key, &mut diagnostics).await,
        };

        drop(guard);
        drop(lock);
        self.inflight
            .remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);

        (envelope, diagnostics)
    }

    /// Latest quote for one instrument.
    pub async fn get_quote(&self, symbol: &str) -> ResultEnvelope<Quote> {
        self.resolve(&DataRequest::quote(symbol))
            .await
            .narrow(MarketData::into_quote)
    }

    /// Latest quotes for several instruments, served by one provider.
    pub async fn get_quotes<I, S>(&self, symbols: I) -> ResultEnvelope<Vec<Quote>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.resolve(&DataRequest::batch(symbols))
            .await
            .narrow(MarketData::into_quotes)
    }

    /// The most recent `limit` bars.
    pub async fn get_history(
        &self,
        symbol: &str,
        period: KlinePeriod,
        limit: usize,
    ) -> ResultEnvelope<Vec<Bar>> {
        self.resolve(&DataRequest::kline(symbol, period, limit))
            .await
            .narrow(MarketData::into_bars)
    }

    pub async fn get_fundamentals(&self, symbol: &str) -> ResultEnvelope<Fundamentals> {
        self.resolve(&DataRequest::fundamentals(symbol))
            .await
            .narrow(MarketData::into_fundamentals)
    }

    /// Drop the cached result for a request. Returns whether one existed.
    pub fn invalidate(&self, request: &DataRequest) -> bool {
        self.cache.delete(&request.cache_key())
    }

    /// Start the cache sweeper if the config asks for one and the builder
    /// could not, because it ran outside a tokio runtime.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_sweeper(&self) -> Option<SweeperHandle> {
        if self.sweeper.is_some() {
            return None;
        }
        let interval = self.config.cache.sweep_interval()?;
        Some(self.cache.spawn_sweeper(interval))
    }

    /// Whether the builder started the cache sweeper.
    pub fn has_sweeper(&self) -> bool {
        self.sweeper.is_some()
    }

    /// Provider names for a dataset, highest priority first.
    pub fn provider_order(&self, kind: DatasetKind) -> Vec<&str> {
        self.priorities
            .get(&kind)
            .map(|names| names.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiterManager> {
        &self.limiter
    }

    pub fn config(&self) -> &MarketDataConfig {
        &self.config
    }

    fn read_cache(&self, key: &str, freshness: Freshness) -> Option<ResultEnvelope<MarketData>> {
        let hit: CachedResult = match freshness {
            Freshness::Cached => self.cache.get(key)?,
            Freshness::MaxAge(max_age) => self.cache.get_fresh(key, max_age)?,
            Freshness::Live => return None,
        };
        Some(ResultEnvelope::from_cache(hit.data, hit.source, hit.quality))
    }

    /// Walk the priority list until a provider yields an accepted result.
    async fn fetch(
        &self,
        request: &DataRequest,
        key: &str,
        diagnostics: &mut FetchDiagnostics,
    ) -> ResultEnvelope<MarketData> {
        let kind = request.kind();
        let order = self.priorities.get(&kind).map(Vec::as_slice).unwrap_or_default();

        for name in order {
            let provider_id: ProviderId = Cow::Owned(name.clone());

            if !self.descriptors.get(name).map(|d| d.enabled).unwrap_or(false) {
                debug!("Provider '{}' is disabled, skipping", name);
                diagnostics.record_skip(provider_id, SkipReason::Disabled);
                continue;
            }

            let started = Instant::now();

            if let Err(err) = self.check_liveness(kind, name).await {
                debug!("Provider '{}' failed its liveness check: {}, skipping", name, err);
                diagnostics.record_error(provider_id, err, started.elapsed());
                continue;
            }

            debug!("Fetching '{}' from provider '{}'", key, name);

            let data = match self.call(name, request).await {
                Ok(data) => tag_source(data, name),
                Err(err) => {
                    debug!("Provider '{}' failed for '{}': {}, trying next", name, key, err);
                    diagnostics.record_error(provider_id, err, started.elapsed());
                    continue;
                }
            };

            let (data, quality) = self.validate(request, data);

            if !quality.valid {
                let reason = quality.summary();
                warn!("Rejected data for '{}' from '{}': {}", key, name, reason);
                self.report_issue(request, name, &reason, &data);
                diagnostics.record_error(
                    provider_id,
                    MarketDataError::ProviderDataInvalid {
                        provider: name.clone(),
                        reason,
                    },
                    started.elapsed(),
                );
                continue;
            }

            let data = normalize(request, data);

            if let Some(reason) = &quality.degrade_reason {
                self.report_issue(request, name, reason, &data);
            }

            if let MarketData::Quote(quote) = &data {
                self.recent_quotes.insert(quote.symbol.clone(), quote.clone());
            } else if let MarketData::Quotes(quotes) = &data {
                for quote in quotes {
                    self.recent_quotes.insert(quote.symbol.clone(), quote.clone());
                }
            }

            self.cache.set(
                key,
                CachedResult {
                    data: data.clone(),
                    source: name.clone(),
                    quality: quality.clone(),
                },
                Some(self.config.cache.ttl_for(kind)),
            );

            diagnostics.record_success(provider_id, started.elapsed());
            debug!(
                "Resolved '{}' ({} records) via {}",
                key,
                data.record_count(),
                diagnostics.summary()
            );
            return ResultEnvelope::fetched(data, name.clone(), quality);
        }

        let error = if diagnostics.errors().is_empty() {
            format!("no provider available for {}", kind)
        } else {
            diagnostics.failure_summary()
        };
        info!(
            "All providers exhausted for '{}'. Diagnostics: {}",
            key,
            diagnostics.summary()
        );
        ResultEnvelope::failure(MarketDataError::AllProvidersExhausted(error).to_string())
    }

    /// Liveness check, gated and bounded like a data call.
    async fn check_liveness(&self, kind: DatasetKind, name: &str) -> Result<(), MarketDataError> {
        let timeout = self.timeout_for(name);

        let result = self
            .limiter
            .schedule(name, || {
                tokio::time::timeout(timeout, self.is_available(kind, name))
            })
            .await;

        match result {
            Ok(true) => Ok(()),
            Ok(false) => Err(MarketDataError::from_provider(
                name,
                ProviderError::Unavailable(String::new()),
            )),
            Err(_) => Err(MarketDataError::ProviderTimeout {
                provider: name.to_string(),
            }),
        }
    }

    async fn is_available(&self, kind: DatasetKind, name: &str) -> bool {
        match kind {
            DatasetKind::Quote => match self.quote_sources.get(name) {
                Some(source) => source.is_available().await,
                None => false,
            },
            DatasetKind::Kline => match self.kline_sources.get(name) {
                Some(source) => source.is_available().await,
                None => false,
            },
            DatasetKind::Fundamental => match self.fundamental_sources.get(name) {
                Some(source) => source.is_available().await,
                None => false,
            },
        }
    }

    /// One provider call, gated by the rate limiter and bounded by the
    /// provider's timeout. Time spent queueing does not count against it.
    async fn call(&self, name: &str, request: &DataRequest) -> Result<MarketData, MarketDataError> {
        let timeout = self.timeout_for(name);

        let result = self
            .limiter
            .schedule(name, || {
                tokio::time::timeout(timeout, self.fetch_from(name, request))
            })
            .await;

        match result {
            Ok(Ok(data)) => Ok(data),
            Ok(Err(err)) => Err(MarketDataError::from_provider(name, err)),
            Err(_) => Err(MarketDataError::ProviderTimeout {
                provider: name.to_string(),
            }),
        }
    }

    async fn fetch_from(&self, name: &str, request: &DataRequest) -> Result<MarketData, ProviderError> {
        let symbol = request.primary_identifier();
        let missing = || ProviderError::Unavailable(format!("no {} adapter", request.kind()));

        match request.kind() {
            DatasetKind::Quote => {
                let source = self.quote_sources.get(name).ok_or_else(missing)?;
                if request.is_batch() {
                    source.get_batch(request.identifiers()).await.map(MarketData::Quotes)
                } else {
                    source.get_quote(symbol).await.map(MarketData::Quote)
                }
            }
            DatasetKind::Kline => {
                let source = self.kline_sources.get(name).ok_or_else(missing)?;
                let params = request.params();
                let period = params.period.unwrap_or(KlinePeriod::Daily);
                let limit = params.limit.unwrap_or(DEFAULT_KLINE_LIMIT);
                source
                    .get_history(symbol, period, limit)
                    .await
                    .map(MarketData::Bars)
            }
            DatasetKind::Fundamental => {
                let source = self.fundamental_sources.get(name).ok_or_else(missing)?;
                source
                    .get_fundamentals(symbol)
                    .await
                    .map(MarketData::Fundamentals)
            }
        }
    }

    fn timeout_for(&self, name: &str) -> Duration {
        self.descriptors
            .get(name)
            .and_then(ProviderDescriptor::timeout)
            .unwrap_or_else(|| self.config.request_timeout())
    }

    /// Validate provider data. Returns the accepted records when valid, or
    /// the data unchanged when rejected.
    fn validate(&self, request: &DataRequest, data: MarketData) -> (MarketData, ValidationVerdict) {
        let now = Utc::now();

        match data {
            MarketData::Quote(quote) => {
                let reference = self
                    .recent_quotes
                    .get(&quote.symbol)
                    .map(|r| r.value().clone());
                let verdict = self.validator.validate_quote(&quote, reference.as_ref(), now);
                (MarketData::Quote(quote), verdict)
            }
            MarketData::Quotes(quotes) => {
                let (kept, verdict) =
                    self.validator
                        .validate_quotes(&quotes, request.identifiers(), now);
                if verdict.valid {
                    (MarketData::Quotes(kept), verdict)
                } else {
                    (MarketData::Quotes(quotes), verdict)
                }
            }
            MarketData::Bars(bars) => {
                let (kept, verdict) = self.validator.validate_bars(&bars);
                if verdict.valid {
                    (MarketData::Bars(kept), verdict)
                } else {
                    (MarketData::Bars(bars), verdict)
                }
            }
            MarketData::Fundamentals(fundamentals) => {
                let verdict = self
                    .validator
                    .validate_fundamentals(&fundamentals, now.date_naive());
                (MarketData::Fundamentals(fundamentals), verdict)
            }
        }
    }

    /// Hand an issue to the sink without waiting for it.
    fn report_issue(&self, request: &DataRequest, source: &str, reason: &str, data: &impl Serialize) {
        let issue = QualityIssue {
            dataset: request.kind(),
            identifier: request.identifiers().join(","),
            reason: reason.to_string(),
            source: source.to_string(),
            payload: serde_json::to_value(data).unwrap_or(serde_json::Value::Null),
            recorded_at: Utc::now(),
        };

        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            let identifier = issue.identifier.clone();
            if let Err(err) = sink.record_issue(issue).await {
                warn!("Failed to record quality issue for '{}': {}", identifier, err);
            }
        });
    }
}

/// Stamp provenance and the bare instrument code on every record.
fn tag_source(data: MarketData, name: &str) -> MarketData {
    match data {
        MarketData::Quote(mut quote) => {
            quote.source = name.to_string();
            quote.symbol = normalize_symbol(&quote.symbol);
            MarketData::Quote(quote)
        }
        MarketData::Quotes(mut quotes) => {
            for quote in &mut quotes {
                quote.source = name.to_string();
                quote.symbol = normalize_symbol(&quote.symbol);
            }
            MarketData::Quotes(quotes)
        }
        MarketData::Fundamentals(mut fundamentals) => {
            fundamentals.source = name.to_string();
            fundamentals.symbol = normalize_symbol(&fundamentals.symbol);
            MarketData::Fundamentals(fundamentals)
        }
        bars @ MarketData::Bars(_) => bars,
    }
}

/// Bring accepted data into canonical shape.
///
/// Batches are ordered by code; bars are sorted, de-duplicated by
/// timestamp, clipped to the requested date range and trimmed to the most
/// recent `limit`.
fn normalize(request: &DataRequest, data: MarketData) -> MarketData {
    match data {
        MarketData::Quotes(mut quotes) => {
            quotes.sort_by(|a, b| a.symbol.cmp(&b.symbol));
            quotes.dedup_by(|a, b| a.symbol == b.symbol);
            MarketData::Quotes(quotes)
        }
        MarketData::Bars(mut bars) => {
            let params = request.params();
            bars.sort_by_key(|b| b.timestamp);
            bars.dedup_by_key(|b| b.timestamp);
            bars.retain(|b| {
                let date = b.timestamp.date_naive();
                params.start.map_or(true, |start| date >= start)
                    && params.end.map_or(true, |end| date <= end)
            });
            if let Some(limit) = params.limit {
                if bars.len() > limit {
                    bars.drain(..bars.len() - limit);
                }
            }
            MarketData::Bars(bars)
        }
        single => single,
    }
}

/// Builds an [`Orchestrator`] from configuration and adapters.
pub struct OrchestratorBuilder {
    config: MarketDataConfig,
    quote_sources: Vec<Arc<dyn QuoteSource>>,
    kline_sources: Vec<Arc<dyn KlineSource>>,
    fundamental_sources: Vec<Arc<dyn FundamentalSource>>,
    cache: Option<Arc<CacheStore>>,
    limiter: Option<Arc<RateLimiterManager>>,
    sink: Option<Arc<dyn QualityIssueSink>>,
}

impl OrchestratorBuilder {
    pub fn new(config: MarketDataConfig) -> Self {
        Self {
            config,
            quote_sources: Vec::new(),
            kline_sources: Vec::new(),
            fundamental_sources: Vec::new(),
            cache: None,
            limiter: None,
            sink: None,
        }
    }

    pub fn quote_source(mut self, source: Arc<dyn QuoteSource>) -> Self {
        self.quote_sources.push(source);
        self
    }

    pub fn kline_source(mut self, source: Arc<dyn KlineSource>) -> Self {
        self.kline_sources.push(source);
        self
    }

    pub fn fundamental_source(mut self, source: Arc<dyn FundamentalSource>) -> Self {
        self.fundamental_sources.push(source);
        self
    }

    /// Share a cache store instead of building one from the config.
    pub fn cache(mut self, cache: Arc<CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Share a rate limiter instead of building one from the config.
    pub fn rate_limiter(mut self, limiter: Arc<RateLimiterManager>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Defaults to [`LogIssueSink`].
    pub fn issue_sink(mut self, sink: Arc<dyn QualityIssueSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Validate the configuration and wire everything together.
    ///
    /// Every adapter needs a descriptor with the same name, and no name may
    /// be registered twice for the same capability.
    pub fn build(self) -> Result<Orchestrator, ConfigError> {
        self.config.validate()?;

        let descriptors: HashMap<String, ProviderDescriptor> = self
            .config
            .providers
            .iter()
            .map(|d| (d.name.clone(), d.clone()))
            .collect();

        let quote_sources = index_sources(self.quote_sources, |s| s.id(), &descriptors)?;
        let kline_sources = index_sources(self.kline_sources, |s| s.id(), &descriptors)?;
        let fundamental_sources =
            index_sources(self.fundamental_sources, |s| s.id(), &descriptors)?;

        let mut priorities = HashMap::new();
        for kind in DatasetKind::ALL {
            let registered = |name: &str| match kind {
                DatasetKind::Quote => quote_sources.contains_key(name),
                DatasetKind::Kline => kline_sources.contains_key(name),
                DatasetKind::Fundamental => fundamental_sources.contains_key(name),
            };

            // Stable sort: equal priorities keep descriptor order
            let mut ordered: Vec<&ProviderDescriptor> = self
                .config
                .providers
                .iter()
                .filter(|d| registered(&d.name))
                .collect();
            ordered.sort_by_key(|d| d.priority_for(kind));

            let names: Vec<String> = ordered.into_iter().map(|d| d.name.clone()).collect();
            debug!("Provider order for {}: {:?}", kind, names);
            priorities.insert(kind, names);
        }

        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(CacheStore::new(&self.config.cache)));
        let limiter = self.limiter.unwrap_or_else(|| {
            Arc::new(RateLimiterManager::new(
                &self.config.rate_limit,
                &self.config.providers,
            ))
        });
        let sink = self.sink.unwrap_or_else(|| Arc::new(LogIssueSink));
        let validator = DataValidator::with_config(self.config.validator.clone());

        let sweeper = match (self.config.cache.sweep_interval(), Handle::try_current()) {
            (Some(interval), Ok(_)) if cache.is_enabled() => Some(cache.spawn_sweeper(interval)),
            (Some(_), Err(_)) => {
                warn!("No tokio runtime at build time, cache sweeper not started");
                None
            }
            _ => None,
        };

        Ok(Orchestrator {
            config: self.config,
            descriptors,
            quote_sources,
            kline_sources,
            fundamental_sources,
            priorities,
            cache,
            limiter,
            validator,
            sink,
            recent_quotes: DashMap::new(),
            inflight: DashMap::new(),
            sweeper,
        })
    }
}

fn index_sources<T: ?Sized>(
    sources: Vec<Arc<T>>,
    id: impl Fn(&T) -> &'static str,
    descriptors: &HashMap<String, ProviderDescriptor>,
) -> Result<HashMap<String, Arc<T>>, ConfigError> {
    let mut indexed = HashMap::with_capacity(sources.len());
    for source in sources {
        let name = id(source.as_ref());
        if !descriptors.contains_key(name) {
            return Err(ConfigError::UnknownProvider(name.to_string()));
        }
        if indexed.insert(name.to_string(), source).is_some() {
            return Err(ConfigError::DuplicateProvider(name.to_string()));
        }
    }
    Ok(indexed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::provider::Provider;

    struct MockHistory {
        id: &'static str,
        bars: Vec<Bar>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Provider for MockHistory {
        fn id(&self) -> &'static str {
            self.id
        }
    }

    #[async_trait]
    impl KlineSource for MockHistory {
        async fn get_history(
            &self,
            _symbol: &str,
            _period: KlinePeriod,
            _limit: usize,
        ) -> Result<Vec<Bar>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.bars.clone())
        }
    }

    fn bar(day: u32, close: rust_decimal::Decimal) -> Bar {
        Bar::new(
            Utc.with_ymd_and_hms(2024, 3, day, 7, 0, 0).unwrap(),
            close,
            close + dec!(1),
            close - dec!(1),
            close,
            dec!(1000),
        )
    }

    fn config(names: &[&str]) -> MarketDataConfig {
        MarketDataConfig {
            providers: names
                .iter()
                .map(|n| ProviderDescriptor::new(*n).with_limits(5, Duration::ZERO))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_priority_order_with_ties() {
        let mut cfg = config(&[]);
        cfg.providers = vec![
            ProviderDescriptor::new("A").with_priority(DatasetKind::Kline, 3),
            ProviderDescriptor::new("B").with_priority(DatasetKind::Kline, 1),
            ProviderDescriptor::new("C").with_priority(DatasetKind::Kline, 3),
        ];

        let mut builder = Orchestrator::builder(cfg);
        for id in ["A", "B", "C"] {
            builder = builder.kline_source(Arc::new(MockHistory {
                id,
                bars: Vec::new(),
                calls: AtomicUsize::new(0),
            }));
        }
        let orchestrator = builder.build().unwrap();

        assert_eq!(orchestrator.provider_order(DatasetKind::Kline), vec!["B", "A", "C"]);
        // No quote adapters registered
        assert!(orchestrator.provider_order(DatasetKind::Quote).is_empty());
    }

    #[test]
    fn test_adapter_without_descriptor_rejected() {
        let result = Orchestrator::builder(config(&["EM"]))
            .kline_source(Arc::new(MockHistory {
                id: "SINA",
                bars: Vec::new(),
                calls: AtomicUsize::new(0),
            }))
            .build();
        assert!(matches!(result, Err(ConfigError::UnknownProvider(name)) if name == "SINA"));
    }

    #[test]
    fn test_duplicate_adapter_rejected() {
        let em = Arc::new(MockHistory {
            id: "EM",
            bars: Vec::new(),
            calls: AtomicUsize::new(0),
        });
        let result = Orchestrator::builder(config(&["EM"]))
            .kline_source(em.clone())
            .kline_source(em)
            .build();
        assert!(matches!(result, Err(ConfigError::DuplicateProvider(_))));
    }

    #[tokio::test]
    async fn test_bars_are_normalized() {
        let em = Arc::new(MockHistory {
            id: "EM",
            bars: vec![bar(5, dec!(12)), bar(1, dec!(10)), bar(4, dec!(11)), bar(4, dec!(11))],
            calls: AtomicUsize::new(0),
        });
        let orchestrator = Orchestrator::builder(config(&["EM"]))
            .kline_source(em.clone())
            .build()
            .unwrap();

        let envelope = orchestrator
            .get_history("sz300750", KlinePeriod::Daily, 2)
            .await;
        assert!(envelope.success);
        let bars = envelope.data.unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, dec!(11));
        assert_eq!(bars[1].close, dec!(12));
        // Out-of-order input is a soft warning
        assert!(envelope.quality.unwrap().degraded);
    }

    #[tokio::test]
    async fn test_date_range_clips_bars() {
        let em = Arc::new(MockHistory {
            id: "EM",
            bars: vec![bar(1, dec!(10)), bar(4, dec!(11)), bar(5, dec!(12))],
            calls: AtomicUsize::new(0),
        });
        let orchestrator = Orchestrator::builder(config(&["EM"]))
            .kline_source(em)
            .build()
            .unwrap();

        let request = DataRequest::kline("300750", KlinePeriod::Daily, 10).with_range(
            NaiveDate::from_ymd_opt(2024, 3, 2),
            NaiveDate::from_ymd_opt(2024, 3, 4),
        );
        let bars = orchestrator.resolve(&request).await.data.unwrap().into_bars().unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].close, dec!(11));
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let em = Arc::new(MockHistory {
            id: "EM",
            bars: vec![bar(1, dec!(10))],
            calls: AtomicUsize::new(0),
        });
        let orchestrator = Orchestrator::builder(config(&["EM"]))
            .kline_source(em.clone())
            .build()
            .unwrap();

        let request = DataRequest::kline("300750", KlinePeriod::Daily, 10);
        orchestrator.resolve(&request).await;
        assert!(orchestrator.resolve(&request).await.cached);
        assert_eq!(em.calls.load(Ordering::SeqCst), 1);

        assert!(orchestrator.invalidate(&request));
        assert!(!orchestrator.resolve(&request).await.cached);
        assert_eq!(em.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_no_adapters_is_failure() {
        let orchestrator = Orchestrator::builder(config(&["EM"])).build().unwrap();
        let envelope = orchestrator.get_fundamentals("600519").await;
        assert!(!envelope.success);
        assert_eq!(envelope.error.as_deref(), Some("no provider available for fundamental"));
    }
}
