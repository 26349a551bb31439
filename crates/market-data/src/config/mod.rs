//! Orchestrator configuration.
//!
//! Configuration is read once at startup, either from a JSON file or from the
//! environment (with `.env` support), then validated. Nothing here is
//! reloaded at runtime.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::models::DatasetKind;
use crate::provider::ProviderDescriptor;
use crate::registry::ValidatorConfig;

/// Path to a JSON config file.
pub const ENV_CONFIG_PATH: &str = "TICKERHUB_CONFIG";
pub const ENV_CACHE_ENABLED: &str = "TICKERHUB_CACHE_ENABLED";
pub const ENV_CACHE_DEFAULT_TTL_MS: &str = "TICKERHUB_CACHE_DEFAULT_TTL_MS";
pub const ENV_RATE_LIMIT_ENABLED: &str = "TICKERHUB_RATE_LIMIT_ENABLED";
pub const ENV_RATE_LIMIT_RPS: &str = "TICKERHUB_RATE_LIMIT_RPS";
pub const ENV_REQUEST_TIMEOUT_MS: &str = "TICKERHUB_REQUEST_TIMEOUT_MS";

/// Top-level configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarketDataConfig {
    pub cache: CacheConfig,
    pub rate_limit: RateLimitConfig,
    pub validator: ValidatorConfig,

    /// Provider descriptors. Order breaks priority ties.
    pub providers: Vec<ProviderDescriptor>,

    /// Per-call timeout for providers without their own.
    pub request_timeout_ms: u64,

    /// Serialize concurrent misses for the same cache key so only one
    /// upstream call is made.
    pub coalesce_requests: bool,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            rate_limit: RateLimitConfig::default(),
            validator: ValidatorConfig::default(),
            providers: Vec::new(),
            request_timeout_ms: 10_000,
            coalesce_requests: false,
        }
    }
}

/// Cache settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheConfig {
    pub enabled: bool,

    /// TTL for datasets without an entry in `ttls`.
    pub default_ttl_ms: u64,

    /// Per-dataset TTLs.
    pub ttls: HashMap<DatasetKind, u64>,

    /// Reads before a key is promoted to the hot tier.
    pub hot_threshold: u64,

    /// Hot keys whose decayed read count falls below this are demoted.
    pub demote_floor: u64,

    /// Upper bound for extended (hot) TTLs.
    pub cold_tier_ttl_ms: u64,

    /// How often the background sweeper runs. Zero disables it.
    pub sweep_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let ttls = HashMap::from([
            (DatasetKind::Quote, 5_000),
            (DatasetKind::Kline, 300_000),
            (DatasetKind::Fundamental, 3_600_000),
        ]);

        Self {
            enabled: true,
            default_ttl_ms: 60_000,
            ttls,
            hot_threshold: 10,
            demote_floor: 5,
            cold_tier_ttl_ms: 3_600_000,
            sweep_interval_ms: 60_000,
        }
    }
}

impl CacheConfig {
    pub fn ttl_for(&self, kind: DatasetKind) -> Duration {
        Duration::from_millis(self.ttls.get(&kind).copied().unwrap_or(self.default_ttl_ms))
    }

    pub fn cold_tier_ttl(&self) -> Duration {
        Duration::from_millis(self.cold_tier_ttl_ms)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_ms > 0).then(|| Duration::from_millis(self.sweep_interval_ms))
    }
}

/// Rate limiting settings. Per-provider budgets live on the descriptors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateLimitConfig {
    pub enabled: bool,

    /// Optional ceiling on total dispatches per second across all providers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_requests_per_second: Option<f64>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            global_requests_per_second: None,
        }
    }
}

impl MarketDataConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn descriptor(&self, name: &str) -> Option<&ProviderDescriptor> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Load from the process environment.
    ///
    /// Loads `.env` if present, reads the file named by `TICKERHUB_CONFIG`
    /// (defaults otherwise), then applies the `TICKERHUB_*` overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut config = match std::env::var(ENV_CONFIG_PATH) {
            Ok(path) if !path.trim().is_empty() => {
                log::info!("Loading market data config from {}", path);
                let contents =
                    std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                        path: path.clone(),
                        source,
                    })?;
                serde_json::from_str(&contents)?
            }
            _ => Self::default(),
        };

        config.apply_env_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `TICKERHUB_*` overrides using `lookup` to read variables.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_CACHE_ENABLED) {
            self.cache.enabled = parse_bool(ENV_CACHE_ENABLED, &value)?;
        }
        if let Some(value) = lookup(ENV_CACHE_DEFAULT_TTL_MS) {
            self.cache.default_ttl_ms = parse_value(ENV_CACHE_DEFAULT_TTL_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_RATE_LIMIT_ENABLED) {
            self.rate_limit.enabled = parse_bool(ENV_RATE_LIMIT_ENABLED, &value)?;
        }
        if let Some(value) = lookup(ENV_RATE_LIMIT_RPS) {
            self.rate_limit.global_requests_per_second =
                Some(parse_value(ENV_RATE_LIMIT_RPS, &value)?);
        }
        if let Some(value) = lookup(ENV_REQUEST_TIMEOUT_MS) {
            self.request_timeout_ms = parse_value(ENV_REQUEST_TIMEOUT_MS, &value)?;
        }
        Ok(())
    }

    /// Reject settings that cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("requestTimeoutMs must be > 0".into()));
        }

        if let Some(rps) = self.rate_limit.global_requests_per_second {
            if !(rps.is_finite() && rps > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "globalRequestsPerSecond must be positive, got {}",
                    rps
                )));
            }
        }

        self.validate_cache()?;

        let mut seen = HashSet::new();
        for provider in &self.providers {
            if provider.name.trim().is_empty() {
                return Err(ConfigError::InvalidProvider {
                    provider: provider.name.clone(),
                    message: "name must not be empty".into(),
                });
            }
            if !seen.insert(provider.name.as_str()) {
                return Err(ConfigError::DuplicateProvider(provider.name.clone()));
            }
            if provider.concurrency_limit == 0 {
                return Err(ConfigError::InvalidProvider {
                    provider: provider.name.clone(),
                    message: "concurrencyLimit must be > 0".into(),
                });
            }
            if provider.timeout_ms == Some(0) {
                return Err(ConfigError::InvalidProvider {
                    provider: provider.name.clone(),
                    message: "timeoutMs must be > 0".into(),
                });
            }
        }

        Ok(())
    }

    fn validate_cache(&self) -> Result<(), ConfigError> {
        let cache = &self.cache;
        if cache.default_ttl_ms == 0 || cache.ttls.values().any(|ttl| *ttl == 0) {
            return Err(ConfigError::InvalidCache("TTLs must be > 0".into()));
        }
        if cache.cold_tier_ttl_ms < cache.default_ttl_ms {
            return Err(ConfigError::InvalidCache(format!(
                "coldTierTtlMs ({}) is below defaultTtlMs ({})",
                cache.cold_tier_ttl_ms, cache.default_ttl_ms
            )));
        }
        if cache.demote_floor > cache.hot_threshold {
            return Err(ConfigError::InvalidCache(format!(
                "demoteFloor ({}) exceeds hotThreshold ({})",
                cache.demote_floor, cache.hot_threshold
            )));
        }
        Ok(())
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid_value(name, value)),
    }
}

fn parse_value<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| invalid_value(name, value))
}

fn invalid_value(name: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_string(),
        value: value.to_string(),
    }
}
