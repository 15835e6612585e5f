//! USD→VND exchange rate, cached for an hour.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::cache::ExchangeRateCache;
use crate::error::SyncError;

/// Public endpoint returning `{"rates": {"VND": ...}}` for USD.
pub const DEFAULT_EXCHANGE_RATE_URL: &str = "https://api.exchangerate-api.com/v4/latest/USD";

/// Rate used when no usable rate can be fetched.
pub const FALLBACK_USD_VND_RATE: f64 = 24_000.0;

/// Fetches the current USD→VND rate.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// `Ok(None)` when the response carries no usable VND rate.
    async fn usd_to_vnd(&self) -> Result<Option<f64>, SyncError>;
}

#[derive(Deserialize)]
struct LatestRates {
    #[serde(default)]
    rates: std::collections::HashMap<String, serde_json::Value>,
}

/// [`RateSource`] over a `latest/USD` style JSON endpoint.
#[derive(Debug, Clone)]
pub struct HttpRateSource {
    http: reqwest::Client,
    url: String,
}

impl HttpRateSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn usd_to_vnd(&self) -> Result<Option<f64>, SyncError> {
        let response = self.http.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Transport(format!("HTTP {status}")));
        }
        let latest: LatestRates = serde_json::from_str(&response.text().await?)?;
        Ok(latest
            .rates
            .get("VND")
            .and_then(serde_json::Value::as_f64)
            .filter(|rate| rate.is_finite() && *rate > 0.0))
    }
}

/// Cache-first rate lookup. Never fails: fetch errors and unusable rates
/// fall back to [`FALLBACK_USD_VND_RATE`], which is cached like a fetched
/// rate.
pub struct ExchangeRates {
    source: Arc<dyn RateSource>,
    cache: ExchangeRateCache,
}

impl ExchangeRates {
    pub fn new(source: Arc<dyn RateSource>, cache: ExchangeRateCache) -> Self {
        Self { source, cache }
    }

    pub async fn usd_to_vnd(&self) -> f64 {
        if let Some(rate) = self.cache.fresh_rate() {
            debug!(rate, "Exchange rate from cache");
            return rate;
        }

        let rate = match self.source.usd_to_vnd().await {
            Ok(Some(rate)) => rate,
            Ok(None) => {
                warn!("Exchange rate response had no VND rate, using fallback");
                FALLBACK_USD_VND_RATE
            }
            Err(e) => {
                warn!(error = %e, "Exchange rate fetch failed, using fallback");
                FALLBACK_USD_VND_RATE
            }
        };
        self.cache.write(rate);
        rate
    }

    /// `usd` converted to whole đồng.
    pub async fn convert_usd_to_vnd(&self, usd: f64) -> i64 {
        (usd * self.usd_to_vnd().await).round() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryStore, EXCHANGE_RATE_TTL};
    use crate::test_support::serve_once;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedSource {
        reply: Result<Option<f64>, ()>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RateSource for FixedSource {
        async fn usd_to_vnd(&self) -> Result<Option<f64>, SyncError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.map_err(|()| SyncError::Transport("offline".into()))
        }
    }

    fn rates(
        reply: Result<Option<f64>, ()>,
    ) -> (Arc<FixedSource>, ExchangeRates, ExchangeRateCache) {
        let source = Arc::new(FixedSource {
            reply,
            calls: AtomicUsize::new(0),
        });
        let cache = ExchangeRateCache::new(Arc::new(MemoryStore::new()), EXCHANGE_RATE_TTL);
        let rates = ExchangeRates::new(source.clone(), cache.clone());
        (source, rates, cache)
    }

    #[tokio::test]
    async fn fetches_once_then_serves_cache() {
        let (source, rates, cache) = rates(Ok(Some(25_400.0)));
        assert_eq!(rates.usd_to_vnd().await, 25_400.0);
        assert_eq!(rates.usd_to_vnd().await, 25_400.0);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.read().unwrap().rate, 25_400.0);
    }

    #[tokio::test]
    async fn failures_fall_back_and_are_cached() {
        let (source, rates, cache) = rates(Err(()));
        assert_eq!(rates.usd_to_vnd().await, FALLBACK_USD_VND_RATE);
        assert_eq!(cache.read().unwrap().rate, FALLBACK_USD_VND_RATE);
        rates.usd_to_vnd().await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

    }

    #[tokio::test]
    async fn missing_rate_falls_back() {
        let (_, rates, _) = rates(Ok(None));
        assert_eq!(rates.usd_to_vnd().await, FALLBACK_USD_VND_RATE);
    }

    #[tokio::test]
    async fn converts_to_whole_dong() {
        let (_, rates, _) = rates(Ok(Some(25_000.5)));
        assert_eq!(rates.convert_usd_to_vnd(2.0).await, 50_001);
    }

    #[tokio::test]
    async fn http_source_reads_vnd_rate() {
        let body = r#"{"base":"USD","rates":{"EUR":0.9,"VND":25410.5}}"#;
        let (base, _) = serve_once("200 OK", body).await;
        let source = HttpRateSource::new(base, Duration::from_secs(5)).unwrap();
        assert_eq!(source.usd_to_vnd().await.unwrap(), Some(25_410.5));

        let (base, _) = serve_once("200 OK", r#"{"rates":{"EUR":0.9}}"#).await;
        let source = HttpRateSource::new(base, Duration::from_secs(5)).unwrap();
        assert_eq!(source.usd_to_vnd().await.unwrap(), None);

        let (base, _) = serve_once("503 Service Unavailable", "").await;
        let source = HttpRateSource::new(base, Duration::from_secs(5)).unwrap();
        assert!(matches!(source.usd_to_vnd().await, Err(SyncError::Transport(_))));
    }
}
