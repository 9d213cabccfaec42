//! Dashboard view: KPI stats, risk chart and live alert feed

use std::sync::{Arc, RwLock};

use chrono::Utc;
use serde::Serialize;

use sentinel_core::{
    reconcile_feed, reconcile_stats, shorten, threat_level, AlertRecord, ClassifiedAlert,
    SeriesPoint, StatsSnapshot, ThreatLevel, WalletIdentity, WindowedSeries,
};

use crate::client::AlertSource;
use crate::config::WindowConfig;
use crate::error::{MonitorError, MonitorResult};
use crate::scheduler::PollCycle;

use super::{read, write};

#[derive(Debug)]
struct DashboardState {
    series: WindowedSeries,
    stats: Option<StatsSnapshot>,
    alerts: Vec<ClassifiedAlert>,
    last_error: Option<MonitorError>,
}

/// Both halves of one dashboard poll; either may fail on its own
#[derive(Debug)]
pub struct DashboardFetch {
    pub alerts: MonitorResult<Vec<AlertRecord>>,
    pub stats: MonitorResult<StatsSnapshot>,
}

/// Everything the dashboard renders, as of one instant
#[derive(Debug, Clone, Serialize)]
pub struct DashboardFrame {
    pub wallet: String,
    pub stats: Option<StatsSnapshot>,
    pub threat_level: Option<ThreatLevel>,
    pub series: Vec<SeriesPoint>,
    pub alerts: Vec<ClassifiedAlert>,
    pub last_error: Option<String>,
}

pub struct DashboardView<S: AlertSource> {
    source: Arc<S>,
    alert_limit: usize,
    feed_limit: usize,
    wallet_display: String,
    state: RwLock<DashboardState>,
}

impl<S: AlertSource> DashboardView<S> {
    pub fn new(source: Arc<S>, window: &WindowConfig, wallet: Option<&WalletIdentity>) -> Self {
        Self {
            source,
            alert_limit: window.alert_limit,
            feed_limit: window.feed_limit,
            wallet_display: shorten(wallet),
            state: RwLock::new(DashboardState {
                series: WindowedSeries::new(window.series_capacity),
                stats: None,
                alerts: Vec::new(),
                last_error: None,
            }),
        }
    }

    pub fn current_series(&self) -> Vec<SeriesPoint> {
        read(&self.state).series.snapshot()
    }

    pub fn current_alerts(&self) -> Vec<ClassifiedAlert> {
        read(&self.state).alerts.clone()
    }

    pub fn current_stats(&self) -> Option<StatsSnapshot> {
        read(&self.state).stats
    }

    pub fn current_threat_level(&self) -> Option<ThreatLevel> {
        read(&self.state).stats.as_ref().map(threat_level)
    }

    pub fn current_wallet_display(&self) -> String {
        self.wallet_display.clone()
    }

    pub fn last_error(&self) -> Option<MonitorError> {
        read(&self.state).last_error.clone()
    }

    pub fn frame(&self) -> DashboardFrame {
        let state = read(&self.state);
        DashboardFrame {
            wallet: self.wallet_display.clone(),
            stats: state.stats,
            threat_level: state.stats.as_ref().map(threat_level),
            series: state.series.snapshot(),
            alerts: state.alerts.clone(),
            last_error: state.last_error.as_ref().map(ToString::to_string),
        }
    }
}

impl<S: AlertSource> PollCycle for DashboardView<S> {
    type Fetched = DashboardFetch;

    fn name(&self) -> &'static str {
        "dashboard"
    }

    async fn fetch(&self) -> MonitorResult<DashboardFetch> {
        let (alerts, stats) = futures::join!(
            self.source.fetch_alerts(self.alert_limit),
            self.source.fetch_alert_stats()
        );

        match (alerts, stats) {
            (Err(alerts_err), Err(stats_err)) => {
                tracing::debug!(error = %alerts_err, "Alert fetch failed alongside stats");
                Err(stats_err)
            }
            (alerts, stats) => Ok(DashboardFetch { alerts, stats }),
        }
    }

    fn apply(&self, fetched: DashboardFetch) {
        let mut state = write(&self.state);
        let mut failure = None;

        match fetched.alerts {
            Ok(batch) => state.alerts = reconcile_feed(&batch, self.feed_limit),
            Err(e) => {
                tracing::warn!(view = "dashboard", error = %e, "Alert feed not refreshed");
                failure = Some(e);
            }
        }

        match fetched.stats {
            Ok(fetched) => {
                let update = reconcile_stats(state.stats.as_ref(), fetched, Utc::now());
                if update.changed {
                    tracing::debug!(
                        total_predictions = update.snapshot.total_predictions,
                        total_alerts = update.snapshot.total_alerts,
                        "Stats changed"
                    );
                }
                if update.snapshot.avg_risk_score.is_none() {
                    tracing::warn!("Stats response has no avg_risk_score, charting 0");
                }
                state.stats = Some(update.snapshot);
                state.series.append(update.point);
            }
            Err(e) => {
                tracing::warn!(view = "dashboard", error = %e, "Stats not refreshed");
                failure = Some(e);
            }
        }

        state.last_error = failure;
    }

    fn on_failure(&self, error: &MonitorError) {
        write(&self.state).last_error = Some(error.clone());
    }
}
