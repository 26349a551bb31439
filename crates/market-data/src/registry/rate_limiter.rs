//! Per-provider request scheduling.
//!
//! Every provider call goes through [`RateLimiterManager::schedule`], which
//! enforces, in order:
//! - a concurrency ceiling (FIFO semaphore, one per provider)
//! - a minimum spacing between consecutive dispatches to the same provider
//! - an optional global requests-per-second ceiling (token bucket)
//!
//! Waiting callers are suspended, never rejected.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, warn};
use tokio::sync::Semaphore;

use crate::config::RateLimitConfig;
use crate::provider::ProviderDescriptor;

/// Token bucket used for the global ceiling.
#[derive(Debug)]
struct TokenBucket {
    /// Current number of available tokens.
    tokens: f64,
    /// Last time the bucket was updated.
    last_update: Instant,
    /// Token refill rate (tokens per second).
    rate: f64,
    /// Maximum bucket capacity.
    capacity: f64,
}

impl TokenBucket {
    /// Bucket refilling at `requests_per_second`, allowing a one-second burst.
    fn per_second(requests_per_second: f64) -> Self {
        let capacity = requests_per_second.max(1.0);
        Self {
            tokens: capacity,
            last_update: Instant::now(),
            rate: requests_per_second,
            capacity,
        }
    }

    /// Refill tokens based on elapsed time.
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_update = now;
    }

    fn try_acquire(&mut self) -> bool {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Wait time until a token becomes available.
    fn time_until_available(&mut self) -> Duration {
        self.refill();

        if self.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - self.tokens) / self.rate)
        }
    }
}

/// Scheduling state for one provider.
struct ProviderLimiter {
    semaphore: Semaphore,
    concurrency_limit: usize,
    min_interval: Duration,
    /// Earliest instant the next dispatch may start.
    next_slot: Mutex<Instant>,
}

impl ProviderLimiter {
    fn new(concurrency_limit: usize, min_interval: Duration) -> Self {
        let concurrency_limit = concurrency_limit.max(1);
        Self {
            semaphore: Semaphore::new(concurrency_limit),
            concurrency_limit,
            min_interval,
            next_slot: Mutex::new(Instant::now()),
        }
    }

    fn from_descriptor(descriptor: &ProviderDescriptor) -> Self {
        Self::new(descriptor.concurrency_limit, descriptor.min_interval())
    }

    /// Reserve the next dispatch slot and return how long to wait for it.
    fn reserve_slot(&self) -> Duration {
        if self.min_interval.is_zero() {
            return Duration::ZERO;
        }

        let mut next = self.next_slot.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter slot mutex was poisoned, recovering");
            poisoned.into_inner()
        });

        let now = Instant::now();
        let start = (*next).max(now);
        *next = start + self.min_interval;
        start - now
    }
}

/// Schedules provider calls under their descriptors' budgets.
///
/// Providers without a descriptor get the descriptor defaults on first use.
pub struct RateLimiterManager {
    enabled: bool,
    limiters: Mutex<HashMap<String, Arc<ProviderLimiter>>>,
    global: Option<Mutex<TokenBucket>>,
}

impl RateLimiterManager {
    pub fn new(config: &RateLimitConfig, descriptors: &[ProviderDescriptor]) -> Self {
        let limiters = descriptors
            .iter()
            .map(|d| (d.name.clone(), Arc::new(ProviderLimiter::from_descriptor(d))))
            .collect();

        let global = config
            .global_requests_per_second
            .filter(|rps| *rps > 0.0)
            .map(|rps| Mutex::new(TokenBucket::per_second(rps)));

        Self {
            enabled: config.enabled,
            limiters: Mutex::new(limiters),
            global,
        }
    }

    /// Manager that lets every call through immediately.
    pub fn disabled() -> Self {
        Self::new(
            &RateLimitConfig {
                enabled: false,
                global_requests_per_second: None,
            },
            &[],
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Lock the limiters mutex, recovering from poison if necessary.
    fn lock_limiters(&self) -> MutexGuard<'_, HashMap<String, Arc<ProviderLimiter>>> {
        self.limiters.lock().unwrap_or_else(|poisoned| {
            warn!("Rate limiter map mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn limiter_for(&self, provider: &str) -> Arc<ProviderLimiter> {
        let mut limiters = self.lock_limiters();
        Arc::clone(limiters.entry(provider.to_string()).or_insert_with(|| {
            Arc::new(ProviderLimiter::from_descriptor(&ProviderDescriptor::new(
                provider,
            )))
        }))
    }

    /// Run `f` once the provider's budget allows it.
    ///
    /// The concurrency permit is held until the returned future completes or
    /// is dropped, so a caller-side timeout releases it too.
    pub async fn schedule<F, Fut, T>(&self, provider: &str, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if !self.enabled {
            return f().await;
        }

        let limiter = self.limiter_for(provider);

        let _permit = match limiter.semaphore.acquire().await {
            Ok(permit) => Some(permit),
            Err(_) => {
                warn!("Semaphore for '{}' is closed, dispatching unthrottled", provider);
                None
            }
        };

        let wait = limiter.reserve_slot();
        if !wait.is_zero() {
            debug!("Rate limiter: spacing '{}' by {:?}", provider, wait);
            tokio::time::sleep(wait).await;
        }

        self.acquire_global().await;

        f().await
    }

    /// Calls currently holding a permit for `provider`.
    pub fn in_flight(&self, provider: &str) -> usize {
        let limiter = self.lock_limiters().get(provider).cloned();
        limiter
            .map(|l| l.concurrency_limit - l.semaphore.available_permits())
            .unwrap_or(0)
    }

    async fn acquire_global(&self) {
        let Some(global) = &self.global else {
            return;
        };

        loop {
            let wait_time = {
                let mut bucket = global.lock().unwrap_or_else(|poisoned| {
                    warn!("Global rate limiter mutex was poisoned, recovering");
                    poisoned.into_inner()
                });

                if bucket.try_acquire() {
                    return;
                }
                bucket.time_until_available()
            };

            debug!("Rate limiter: global ceiling, waiting {:?}", wait_time);
            tokio::time::sleep(wait_time).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::join_all;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn manager(descriptors: &[ProviderDescriptor]) -> RateLimiterManager {
        RateLimiterManager::new(&RateLimitConfig::default(), descriptors)
    }

    #[test]
    fn test_token_bucket_burst_then_empty() {
        let mut bucket = TokenBucket::per_second(3.0);
        for _ in 0..3 {
            assert!(bucket.try_acquire());
        }
        assert!(!bucket.try_acquire());
        assert!(bucket.time_until_available() > Duration::ZERO);
    }

    #[test]
    fn test_token_bucket_refill() {
        let mut bucket = TokenBucket::per_second(1.0);
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());

        bucket.last_update = Instant::now() - Duration::from_secs(2);
        assert!(bucket.try_acquire());
    }

    #[tokio::test]
    async fn test_concurrency_never_exceeds_limit() {
        let limiter = manager(&[ProviderDescriptor::new("SINA").with_limits(2, Duration::ZERO)]);
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        let calls = (0..10).map(|_| {
            limiter.schedule("SINA", || async {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            })
        });
        join_all(calls).await;

        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(limiter.in_flight("SINA"), 0);
    }

    #[tokio::test]
    async fn test_queued_calls_dispatch_in_order() {
        let limiter = manager(&[ProviderDescriptor::new("EM").with_limits(1, Duration::ZERO)]);
        let order = Mutex::new(Vec::new());

        // join_all polls in sequence, so call i queues before call i + 1
        let calls = (0..8).map(|i| {
            let order = &order;
            limiter.schedule("EM", move || async move {
                order.lock().unwrap().push(i);
                tokio::time::sleep(Duration::from_millis(5)).await;
            })
        });
        join_all(calls).await;

        assert_eq!(order.into_inner().unwrap(), (0..8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_min_interval_spaces_dispatches() {
        let limiter =
            manager(&[ProviderDescriptor::new("EM").with_limits(5, Duration::from_millis(20))]);

        let start = Instant::now();
        let calls = (0..4).map(|_| limiter.schedule("EM", || async { Instant::now() }));
        let mut stamps = join_all(calls).await;
        stamps.sort();

        // Three gaps of 20ms
        assert!(start.elapsed() >= Duration::from_millis(60));
        for pair in stamps.windows(2) {
            assert!(pair[1].duration_since(pair[0]) >= Duration::from_millis(15));
        }
    }

    #[tokio::test]
    async fn test_providers_are_isolated() {
        let limiter = manager(&[
            ProviderDescriptor::new("EM").with_limits(1, Duration::ZERO),
            ProviderDescriptor::new("SINA").with_limits(1, Duration::ZERO),
        ]);

        let slow = limiter.schedule("EM", || tokio::time::sleep(Duration::from_millis(50)));
        let fast = async {
            let start = Instant::now();
            limiter.schedule("SINA", || async {}).await;
            start.elapsed()
        };

        let (_, waited) = tokio::join!(slow, fast);
        assert!(waited < Duration::from_millis(40));
    }

    #[tokio::test]
    async fn test_unknown_provider_uses_defaults() {
        let limiter = manager(&[]);
        let value = limiter.schedule("TENCENT", || async { 7 }).await;
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_disabled_is_passthrough() {
        let limiter = RateLimiterManager::disabled();
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        let calls = (0..5).map(|_| {
            limiter.schedule("EM", || async {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            })
        });
        join_all(calls).await;

        assert_eq!(peak.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_global_ceiling_waits() {
        let limiter = RateLimiterManager::new(
            &RateLimitConfig {
                enabled: true,
                global_requests_per_second: Some(50.0),
            },
            &[
                ProviderDescriptor::new("EM").with_limits(100, Duration::ZERO),
            ],
        );

        // 50 burst tokens, the 51st waits ~20ms
        let start = Instant::now();
        for _ in 0..51 {
            limiter.schedule("EM", || async {}).await;
        }
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_permit_released_on_drop() {
        let limiter = manager(&[ProviderDescriptor::new("EM").with_limits(1, Duration::ZERO)]);

        let timed_out = tokio::time::timeout(
            Duration::from_millis(10),
            limiter.schedule("EM", || tokio::time::sleep(Duration::from_secs(5))),
        )
        .await;
        assert!(timed_out.is_err());
        assert_eq!(limiter.in_flight("EM"), 0);

        let value = limiter.schedule("EM", || async { 1 }).await;
        assert_eq!(value, 1);
    }
}
