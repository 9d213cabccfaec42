//! Severity classification for alert display
//!
//! Maps the remote model's risk level and score onto the coarse buckets the
//! dashboard styles by. Every function here is total: unknown inputs fall into
//! the mildest bucket rather than failing.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{AlertRecord, RiskLevel, StatsSnapshot};
use crate::session::shorten_address;

/// Coarse UI severity of an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::High => "high",
        }
    }
}

/// An alert prepared for the live feed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedAlert {
    pub id: u64,
    pub wallet_display: String,
    pub amount_usd: f64,
    pub severity: Severity,
    /// `risk_score` on a 0-100 integer scale
    pub display_score: u8,
    pub badge: BadgeTone,
    pub risk_level: RiskLevel,
    pub timestamp: DateTime<Utc>,
}

pub fn severity_for(level: RiskLevel) -> Severity {
    match level {
        RiskLevel::High | RiskLevel::Critical => Severity::High,
        RiskLevel::Low | RiskLevel::Medium | RiskLevel::Unknown => Severity::Warning,
    }
}

/// `round(score * 100)`, clamped into `0..=100`. Non-finite scores show as 0.
pub fn display_score(risk_score: f64) -> u8 {
    if !risk_score.is_finite() {
        return 0;
    }
    (risk_score * 100.0).round().clamp(0.0, 100.0) as u8
}

pub fn classify(record: &AlertRecord) -> ClassifiedAlert {
    let score = display_score(record.risk_score);
    ClassifiedAlert {
        id: record.id,
        wallet_display: record
            .wallet_address
            .as_deref()
            .map(shorten_address)
            .unwrap_or_else(|| "unknown".to_string()),
        amount_usd: record.amount_usd,
        severity: severity_for(record.risk_level),
        display_score: score,
        badge: badge_tone(score),
        risk_level: record.risk_level,
        timestamp: record.timestamp,
    }
}

// =============================================================================
// Score Badges and Threat Level
// =============================================================================

/// Color band of a score badge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeTone {
    Normal,
    Elevated,
    Critical,
}

pub fn badge_tone(display_score: u8) -> BadgeTone {
    match display_score {
        80.. => BadgeTone::Critical,
        50..=79 => BadgeTone::Elevated,
        _ => BadgeTone::Normal,
    }
}

/// Headline threat level for the KPI row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatLevel {
    Low,
    Elevated,
    High,
}

const ELEVATED_ALERT_RATE: f64 = 0.1;
const HIGH_ALERT_RATE: f64 = 0.3;

/// Threat level from the share of predictions that raised an alert.
///
/// Uses `alert_rate` when the backend sends it, otherwise derives it from the
/// two counters. No predictions at all reads as `Low`.
pub fn threat_level(stats: &StatsSnapshot) -> ThreatLevel {
    let rate = stats.alert_rate.filter(|r| r.is_finite()).unwrap_or_else(|| {
        if stats.total_predictions == 0 {
            0.0
        } else {
            stats.total_alerts as f64 / stats.total_predictions as f64
        }
    });

    if rate >= HIGH_ALERT_RATE {
        ThreatLevel::High
    } else if rate >= ELEVATED_ALERT_RATE {
        ThreatLevel::Elevated
    } else {
        ThreatLevel::Low
    }
}
