//! Data models for alert synchronization
//!
//! These mirror the records served by the alerting API plus the derived,
//! view-facing structures (series points, pool lists) that the reconcilers
//! produce every poll cycle.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

// =============================================================================
// Wallet Identity
// =============================================================================

/// The connected wallet address.
///
/// Opaque to the core: no checksum or chain-specific validation happens here,
/// only that the address is a non-empty string once trimmed. It is replaced
/// wholesale when the user reconnects, never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletIdentity(String);

impl WalletIdentity {
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidWallet("address is empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Alerts
// =============================================================================

/// Risk classification assigned by the remote model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
    /// Any level string this client does not know about.
    #[serde(other)]
    Unknown,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
            RiskLevel::Unknown => "unknown",
        }
    }
}

/// One monitored transaction judged risky by the prediction service.
///
/// Read-only to the core. The only invariant relied upon is that `id` is
/// unique and stable across polls; it keys de-duplication in the alert feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: u64,

    /// Wallet that issued the transaction (absent for anonymous submissions)
    #[serde(default)]
    pub wallet_address: Option<String>,

    /// Transaction amount in USD, never negative
    pub amount_usd: f64,

    /// Model score in `0.0..=1.0`
    pub risk_score: f64,

    pub risk_level: RiskLevel,

    #[serde(with = "lenient_utc")]
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub tx_hash: Option<String>,

    /// Hash of the on-chain alert registry entry, if one was written
    #[serde(default)]
    pub on_chain_tx_hash: Option<String>,

    #[serde(default)]
    pub verified: bool,

    #[serde(default)]
    pub false_positive: Option<bool>,

    #[serde(default)]
    pub notes: Option<String>,
}

impl AlertRecord {
    /// Decode and validate a single alert from its JSON form.
    pub fn from_value(value: serde_json::Value) -> CoreResult<Self> {
        if value.get("id").map_or(true, serde_json::Value::is_null) {
            return Err(CoreError::MissingField("id"));
        }
        let record: AlertRecord = serde_json::from_value(value)?;
        record.validate()?;
        Ok(record)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if !self.amount_usd.is_finite() || self.amount_usd < 0.0 {
            return Err(CoreError::InvalidField {
                field: "amount_usd",
                reason: format!("expected a non-negative amount, got {}", self.amount_usd),
            });
        }
        if !self.risk_score.is_finite() || !(0.0..=1.0).contains(&self.risk_score) {
            return Err(CoreError::InvalidField {
                field: "risk_score",
                reason: format!("expected a score in [0, 1], got {}", self.risk_score),
            });
        }
        Ok(())
    }
}

/// Body of `GET /alerts`
#[derive(Debug, Clone, Deserialize)]
pub struct AlertListResponse {
    /// Raw alert objects, decoded one by one so a single bad record
    /// does not discard the whole batch
    pub alerts: Vec<serde_json::Value>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page: u64,
    #[serde(default)]
    pub page_size: u64,
}

// =============================================================================
// Aggregate Statistics
// =============================================================================

/// Aggregate prediction statistics from `GET /alerts/stats`.
///
/// Always replaced as a whole. Missing fields decode to their defaults, and a
/// missing `avg_risk_score` stays `None` so the reconciler can tell "absent"
/// apart from a genuine zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    #[serde(default)]
    pub total_predictions: u64,
    #[serde(default)]
    pub total_alerts: u64,
    #[serde(default)]
    pub alert_rate: Option<f64>,
    #[serde(default)]
    pub avg_risk_score: Option<f64>,
}

// =============================================================================
// Derived View Structures
// =============================================================================

/// One point of the risk chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    /// Wall-clock label shown on the x axis (`HH:MM:SS`)
    pub time_label: String,
    /// Risk on a 0-100 scale
    pub risk_value: f64,
    pub recorded_at: DateTime<Utc>,
}

impl SeriesPoint {
    pub fn new(recorded_at: DateTime<Utc>, risk_value: f64) -> Self {
        Self {
            time_label: recorded_at.format("%H:%M:%S").to_string(),
            risk_value,
            recorded_at,
        }
    }
}

/// Transient tag carried by entries of the live pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolEntry {
    #[serde(flatten)]
    pub record: AlertRecord,
    pub status: PoolStatus,
}

/// The transaction monitor's two lists, redrawn from every polled batch.
///
/// `pending` and `completed` are not disjoint by id: a record in the head of
/// the batch shows up in both.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PoolState {
    pub pending: Vec<PoolEntry>,
    pub completed: Vec<AlertRecord>,
}

// =============================================================================
// Wallet Activity
// =============================================================================

/// An on-chain transaction enriched with a heuristic risk score by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub tx_hash: String,
    pub from: String,
    #[serde(default)]
    pub to: Option<String>,
    pub amount_eth: f64,
    pub gas_gwei: f64,
    #[serde(with = "lenient_utc")]
    pub timestamp: DateTime<Utc>,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
}

/// Body of `GET /wallet/{address}/transactions`
#[derive(Debug, Clone, Deserialize)]
pub struct WalletTransactionsResponse {
    pub wallet: String,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub transactions: Vec<WalletTransaction>,
}

/// Timestamps from the backend are ISO-8601 and usually lack an offset;
/// those are taken as UTC.
mod lenient_utc {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(parsed.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|e| de::Error::custom(format!("invalid timestamp '{}': {}", raw, e)))
    }
}
