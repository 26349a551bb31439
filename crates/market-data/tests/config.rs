mod common;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use common::MockQuoteSource;
use tickerhub_market_data::{ConfigError, DatasetKind, MarketDataConfig, Orchestrator};

const CONFIG: &str = r#"{
    "cache": {
        "ttls": { "quote": 3000, "kline": 600000 },
        "hotThreshold": 20,
        "sweepIntervalMs": 0
    },
    "rateLimit": { "enabled": true, "globalRequestsPerSecond": 20 },
    "requestTimeoutMs": 2500,
    "providers": [
        { "name": "EM", "priorities": { "quote": 2, "kline": 1 }, "concurrencyLimit": 3 },
        { "name": "SINA", "priorities": { "quote": 1 }, "minIntervalMs": 250, "timeoutMs": 800 },
        { "name": "TENCENT", "enabled": false }
    ]
}"#;

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn loads_config_from_file() {
    let file = write_config(CONFIG);
    let config = MarketDataConfig::from_file(file.path()).unwrap();

    assert_eq!(config.cache.ttl_for(DatasetKind::Quote), Duration::from_secs(3));
    assert_eq!(config.cache.ttl_for(DatasetKind::Kline), Duration::from_secs(600));
    assert_eq!(config.cache.sweep_interval(), None);
    assert_eq!(config.request_timeout(), Duration::from_millis(2500));
    assert_eq!(config.providers.len(), 3);

    let sina = config.descriptor("SINA").unwrap();
    assert_eq!(sina.min_interval(), Duration::from_millis(250));
    assert_eq!(sina.timeout(), Some(Duration::from_millis(800)));
    assert!(!config.descriptor("TENCENT").unwrap().enabled);
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = MarketDataConfig::from_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
}

#[test]
fn invalid_file_is_rejected() {
    let file = write_config(r#"{ "providers": [ { "name": "EM" }, { "name": "EM" } ] }"#);
    let err = MarketDataConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateProvider(_)));
}

#[tokio::test]
async fn orchestrator_follows_file_priorities() {
    let file = write_config(CONFIG);
    let config = MarketDataConfig::from_file(file.path()).unwrap();

    let em = Arc::new(MockQuoteSource::valid("EM"));
    let sina = Arc::new(MockQuoteSource::valid("SINA"));
    let tencent = Arc::new(MockQuoteSource::valid("TENCENT"));
    let orchestrator = Orchestrator::builder(config)
        .quote_source(em.clone())
        .quote_source(sina.clone())
        .quote_source(tencent.clone())
        .build()
        .unwrap();

    // TENCENT falls back to the default priority (10)
    assert_eq!(
        orchestrator.provider_order(DatasetKind::Quote),
        vec!["SINA", "EM", "TENCENT"]
    );

    let envelope = orchestrator.get_quote("600519").await;
    assert_eq!(envelope.source.as_deref(), Some("SINA"));
    assert_eq!(em.call_count(), 0);
    assert!(orchestrator.start_sweeper().is_none());
}
