//! Configuration management for the monitor
//!
//! Sources, lowest precedence first:
//!
//! 1. built-in defaults (`api.base_url` defaults to `$SENTINEL_API_URL` when
//!    set, otherwise `http://localhost:8000/api/v1`)
//! 2. an optional `sentinel-monitor.{toml,json,yaml}` file in the working directory
//! 3. `SENTINEL__<SECTION>__<KEY>` environment variables, e.g.
//!    `SENTINEL__API__BASE_URL` or `SENTINEL__POLLING__OVERLAP=allow`

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{MonitorError, MonitorResult};
use crate::scheduler::{OverlapPolicy, SchedulerOptions};

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

/// Alerting API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL including the version prefix; `SENTINEL_API_URL` seeds the default
    #[serde(default = "default_api_url")]
    pub base_url: String,
    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_api_url() -> String {
    std::env::var("SENTINEL_API_URL").unwrap_or_else(|_| "http://localhost:8000/api/v1".to_string())
}

fn default_timeout_ms() -> u64 {
    10_000
}

/// Poll cadence per view
#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_dashboard_interval")]
    pub dashboard_interval_ms: u64,
    #[serde(default = "default_transactions_interval")]
    pub transactions_interval_ms: u64,
    #[serde(default = "default_wallet_interval")]
    pub wallet_interval_ms: u64,
    #[serde(default)]
    pub overlap: OverlapPolicy,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            dashboard_interval_ms: default_dashboard_interval(),
            transactions_interval_ms: default_transactions_interval(),
            wallet_interval_ms: default_wallet_interval(),
            overlap: OverlapPolicy::default(),
        }
    }
}

fn default_dashboard_interval() -> u64 {
    5_000
}

fn default_transactions_interval() -> u64 {
    4_000
}

fn default_wallet_interval() -> u64 {
    30_000
}

/// Sizes of the bounded view state
#[derive(Debug, Clone, Deserialize)]
pub struct WindowConfig {
    /// Points kept by the risk chart
    #[serde(default = "default_series_capacity")]
    pub series_capacity: usize,
    /// `limit` sent with every alerts request, `1..=MAX_ALERT_LIMIT`
    #[serde(default = "default_alert_limit")]
    pub alert_limit: usize,
    /// Records shown in the live pool
    #[serde(default = "default_pending_size")]
    pub pending_size: usize,
    /// Entries kept in the dashboard alert feed
    #[serde(default = "default_feed_limit")]
    pub feed_limit: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            series_capacity: default_series_capacity(),
            alert_limit: default_alert_limit(),
            pending_size: default_pending_size(),
            feed_limit: default_feed_limit(),
        }
    }
}

fn default_series_capacity() -> usize {
    sentinel_core::DEFAULT_SERIES_CAPACITY
}

/// Largest `limit` the alerts endpoint accepts
pub const MAX_ALERT_LIMIT: usize = 1_000;

fn default_alert_limit() -> usize {
    20
}

fn default_pending_size() -> usize {
    sentinel_core::DEFAULT_PENDING_SIZE
}

fn default_feed_limit() -> usize {
    10
}

/// Durable wallet session
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_path")]
    pub path: PathBuf,
    #[serde(default = "default_session_key")]
    pub key: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            path: default_session_path(),
            key: default_session_key(),
        }
    }
}

fn default_session_path() -> PathBuf {
    PathBuf::from(".sentinel/session.json")
}

fn default_session_key() -> String {
    "wallet".to_string()
}

/// Cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Maximum cache entries
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
    /// Cache TTL in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: default_max_capacity(),
            ttl_seconds: default_ttl(),
        }
    }
}

fn default_max_capacity() -> u64 {
    256
}

fn default_ttl() -> u64 {
    60
}

/// Headless renderer output
#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_frame_interval")]
    pub frame_interval_ms: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: default_frame_interval(),
        }
    }
}

fn default_frame_interval() -> u64 {
    5_000
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> MonitorResult<Self> {
        let settings = config::Config::builder()
            // Start with defaults
            .set_default("api.base_url", default_api_url())?
            .set_default("api.timeout_ms", default_timeout_ms() as i64)?
            .set_default("polling.dashboard_interval_ms", default_dashboard_interval() as i64)?
            .set_default("polling.transactions_interval_ms", default_transactions_interval() as i64)?
            .set_default("polling.wallet_interval_ms", default_wallet_interval() as i64)?
            .set_default("polling.overlap", "skip")?
            .set_default("window.series_capacity", default_series_capacity() as i64)?
            .set_default("window.alert_limit", default_alert_limit() as i64)?
            .set_default("window.pending_size", default_pending_size() as i64)?
            .set_default("window.feed_limit", default_feed_limit() as i64)?
            .set_default("session.path", default_session_path().to_string_lossy().into_owned())?
            .set_default("session.key", default_session_key())?
            .set_default("cache.max_capacity", default_max_capacity() as i64)?
            .set_default("cache.ttl_seconds", default_ttl() as i64)?
            .set_default("render.frame_interval_ms", default_frame_interval() as i64)?
            // Load from file if present
            .add_source(config::File::with_name("sentinel-monitor").required(false))
            // Override with environment variables (SENTINEL__API__BASE_URL, etc.)
            .add_source(
                config::Environment::with_prefix("SENTINEL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> MonitorResult<()> {
        let intervals = [
            ("polling.dashboard_interval_ms", self.polling.dashboard_interval_ms),
            ("polling.transactions_interval_ms", self.polling.transactions_interval_ms),
            ("polling.wallet_interval_ms", self.polling.wallet_interval_ms),
            ("render.frame_interval_ms", self.render.frame_interval_ms),
            ("api.timeout_ms", self.api.timeout_ms),
        ];
        for (key, value) in intervals {
            if value == 0 {
                return Err(MonitorError::Config(format!("{} must be greater than zero", key)));
            }
        }
        if !(1..=MAX_ALERT_LIMIT).contains(&self.window.alert_limit) {
            return Err(MonitorError::Config(format!(
                "window.alert_limit must be between 1 and {}, got {}",
                MAX_ALERT_LIMIT, self.window.alert_limit
            )));
        }
        if self.api.base_url.trim().is_empty() {
            return Err(MonitorError::Config("api.base_url cannot be empty".into()));
        }
        Ok(())
    }

    /// Scheduler options shared by every view
    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            fetch_timeout: self.api.timeout(),
            overlap: self.polling.overlap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_dashboard_cadence() {
        let config = AppConfig::default();
        assert_eq!(config.polling.dashboard_interval_ms, 5_000);
        assert_eq!(config.polling.transactions_interval_ms, 4_000);
        assert_eq!(config.window.series_capacity, 20);
        assert_eq!(config.window.pending_size, 5);
        assert_eq!(config.polling.overlap, OverlapPolicy::Skip);
        assert_eq!(config.session.key, "wallet");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let mut config = AppConfig::default();
        config.polling.transactions_interval_ms = 0;
        assert!(matches!(config.validate(), Err(MonitorError::Config(_))));
    }

    #[test]
    fn test_alert_limit_must_fit_the_endpoint() {
        let mut config = AppConfig::default();
        config.window.alert_limit = 0;
        assert!(matches!(config.validate(), Err(MonitorError::Config(_))));

        config.window.alert_limit = MAX_ALERT_LIMIT + 1;
        assert!(matches!(config.validate(), Err(MonitorError::Config(_))));

        config.window.alert_limit = MAX_ALERT_LIMIT;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_api_url_env_seeds_default() {
        std::env::set_var("SENTINEL_API_URL", "http://alerts.staging:8000/api/v1");
        let seeded = ApiConfig::default();
        std::env::remove_var("SENTINEL_API_URL");

        assert_eq!(seeded.base_url, "http://alerts.staging:8000/api/v1");
    }

    #[test]
    fn test_scheduler_options_follow_api_timeout() {
        let mut config = AppConfig::default();
        config.api.timeout_ms = 2_500;
        config.polling.overlap = OverlapPolicy::Allow;
        let options = config.scheduler_options();
        assert_eq!(options.fetch_timeout, Duration::from_millis(2_500));
        assert_eq!(options.overlap, OverlapPolicy::Allow);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: AppConfig = serde_json::from_value(serde_json::json!({
            "api": { "base_url": "http://alerts.internal/api/v1" },
            "polling": { "overlap": "allow" }
        }))
        .unwrap();
        assert_eq!(config.api.base_url, "http://alerts.internal/api/v1");
        assert_eq!(config.api.timeout_ms, 10_000);
        assert_eq!(config.polling.overlap, OverlapPolicy::Allow);
        assert_eq!(config.window.feed_limit, 10);
    }
}
