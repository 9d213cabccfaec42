//! HTTP client for the alerting API
//!
//! A thin wrapper over `reqwest`: builds URLs, maps transport failures,
//! non-success statuses and undecodable bodies onto [`MonitorError`], and
//! caches wallet transaction lookups.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::future::Cache;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;

use sentinel_core::{
    AlertListResponse, AlertRecord, StatsSnapshot, WalletIdentity, WalletTransaction,
    WalletTransactionsResponse,
};

use crate::config::{ApiConfig, CacheConfig};
use crate::error::{MonitorError, MonitorResult};

/// The alerting API as the views consume it
pub trait AlertSource: Send + Sync + 'static {
    /// Most recent alerts first
    fn fetch_alerts(&self, limit: usize) -> impl Future<Output = MonitorResult<Vec<AlertRecord>>> + Send;

    fn fetch_alert_stats(&self) -> impl Future<Output = MonitorResult<StatsSnapshot>> + Send;

    fn fetch_wallet_transactions(
        &self,
        wallet: &WalletIdentity,
    ) -> impl Future<Output = MonitorResult<Vec<WalletTransaction>>> + Send;
}

/// HTTP client for the Sentinel alerting API
pub struct AlertApiClient {
    client: Client,
    base_url: String,
    wallet_cache: Cache<String, Arc<Vec<WalletTransaction>>>,
}

impl AlertApiClient {
    pub fn new(api: &ApiConfig, cache: &CacheConfig) -> MonitorResult<Self> {
        let client = Client::builder()
            .timeout(api.timeout())
            .build()
            .map_err(|e| MonitorError::Config(format!("failed to create HTTP client: {}", e)))?;

        let wallet_cache = Cache::builder()
            .max_capacity(cache.max_capacity)
            .time_to_live(Duration::from_secs(cache.ttl_seconds))
            .build();

        Ok(Self {
            client,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            wallet_cache,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Health check
    pub async fn health(&self) -> MonitorResult<Value> {
        self.get("/health", &[]).await
    }

    // HTTP helper methods

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> MonitorResult<T> {
        let start = Instant::now();
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                tracing::debug!(path = %path, error = %e, "Request failed");
                MonitorError::from(e)
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(MonitorError::from)?;

        if !status.is_success() {
            let detail = extract_detail(&body);
            tracing::debug!(path = %path, status = %status, detail = ?detail, "API returned an error");
            return Err(MonitorError::Api {
                status: status.as_u16(),
                detail,
            });
        }

        let parsed = serde_json::from_slice(&body)
            .map_err(|e| MonitorError::MalformedResponse(format!("{}: {}", path, e)))?;

        tracing::debug!(
            path = %path,
            duration_ms = %start.elapsed().as_millis(),
            "Request completed"
        );
        Ok(parsed)
    }
}

impl AlertSource for AlertApiClient {
    async fn fetch_alerts(&self, limit: usize) -> MonitorResult<Vec<AlertRecord>> {
        let response: AlertListResponse = self.get("/alerts", &[("limit", limit.to_string())]).await?;
        Ok(decode_alert_batch(response.alerts))
    }

    async fn fetch_alert_stats(&self) -> MonitorResult<StatsSnapshot> {
        self.get("/alerts/stats", &[]).await
    }

    async fn fetch_wallet_transactions(&self, wallet: &WalletIdentity) -> MonitorResult<Vec<WalletTransaction>> {
        if let Some(cached) = self.wallet_cache.get(wallet.as_str()).await {
            tracing::debug!(wallet = %wallet, "Wallet transactions served from cache");
            return Ok(cached.as_ref().clone());
        }

        let path = format!("/wallet/{}/transactions", wallet);
        let response: WalletTransactionsResponse = self.get(&path, &[]).await?;
        if response.wallet != wallet.as_str() {
            tracing::debug!(requested = %wallet, returned = %response.wallet, "Backend echoed a different wallet");
        }

        let transactions = Arc::new(response.transactions);
        self.wallet_cache
            .insert(wallet.as_str().to_string(), Arc::clone(&transactions))
            .await;
        Ok(transactions.as_ref().clone())
    }
}

/// Decode alerts one by one, skipping records that fail validation
pub(crate) fn decode_alert_batch(values: Vec<Value>) -> Vec<AlertRecord> {
    let total = values.len();
    let records: Vec<AlertRecord> = values
        .into_iter()
        .filter_map(|value| match AlertRecord::from_value(value) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed alert record");
                None
            }
        })
        .collect();

    if records.len() < total {
        tracing::warn!(kept = records.len(), total, "Alert batch contained malformed records");
    }
    records
}

/// Pull the `detail` message out of an error body, if there is one
pub(crate) fn extract_detail(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    match value.get("detail")? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_detail_string() {
        let body = br#"{"detail": "Failed to fetch statistics: timeout"}"#;
        assert_eq!(extract_detail(body).as_deref(), Some("Failed to fetch statistics: timeout"));
    }

    #[test]
    fn test_extract_detail_structured() {
        let body = br#"{"detail": [{"loc": ["query", "limit"], "msg": "too large"}]}"#;
        let detail = extract_detail(body).unwrap();
        assert!(detail.contains("too large"));
    }

    #[test]
    fn test_extract_detail_missing_or_not_json() {
        assert_eq!(extract_detail(br#"{"error": "nope"}"#), None);
        assert_eq!(extract_detail(b"<html>Bad Gateway</html>"), None);
        assert_eq!(extract_detail(br#"{"detail": null}"#), None);
    }

    #[test]
    fn test_decode_batch_skips_bad_records() {
        let batch = vec![
            json!({"id": 1, "risk_score": 0.9, "risk_level": "high", "amount_usd": 10.0, "timestamp": "2024-02-07T12:00:00"}),
            json!({"risk_score": 0.9, "risk_level": "high", "amount_usd": 10.0, "timestamp": "2024-02-07T12:00:00"}),
            json!({"id": 3, "risk_score": 0.4, "risk_level": "medium", "amount_usd": -5.0, "timestamp": "2024-02-07T12:00:00"}),
            json!({"id": 4, "risk_score": 0.2, "risk_level": "low", "amount_usd": 3.5, "timestamp": "2024-02-07T12:00:01Z"}),
        ];
        let records = decode_alert_batch(batch);
        assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 4]);
    }

    #[tokio::test]
    async fn test_client_trims_base_url() {
        let api = ApiConfig {
            base_url: "http://localhost:8000/api/v1/".to_string(),
            timeout_ms: 1_000,
        };
        let client = AlertApiClient::new(&api, &CacheConfig::default()).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000/api/v1");
    }

    #[tokio::test]
    async fn test_request_that_never_leaves_is_network_failure() {
        let api = ApiConfig {
            // no scheme: reqwest rejects the URL before opening a socket
            base_url: "alerts.invalid/api/v1".to_string(),
            timeout_ms: 2_000,
        };
        let client = AlertApiClient::new(&api, &CacheConfig::default()).unwrap();
        let err = client.fetch_alert_stats().await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NetworkFailure);
        assert_eq!(err.status_code(), None);
    }
}
