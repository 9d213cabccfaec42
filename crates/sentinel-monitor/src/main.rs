//! Sentinel Monitor
//!
//! Headless front end for the Sentinel risk dashboard. Polls the alerting API
//! for every view and prints one JSON frame per render interval to stdout
//! until interrupted.
//!
//! ```text
//! sentinel-monitor                     run the views
//! sentinel-monitor connect <address>   store the wallet session and exit
//! sentinel-monitor disconnect          forget the wallet session and exit
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sentinel_core::WalletIdentity;
use sentinel_monitor::views::{DashboardFrame, TransactionMonitorFrame, WalletActivityFrame};
use sentinel_monitor::{
    AlertApiClient, AppConfig, DashboardView, PollingScheduler, SchedulerStats, SessionStore,
    TransactionMonitorView, WalletActivityView,
};

#[derive(Serialize)]
struct Frame {
    rendered_at: DateTime<Utc>,
    dashboard: DashboardFrame,
    transactions: TransactionMonitorFrame,
    wallet: Option<WalletActivityFrame>,
    schedulers: SchedulerFrame,
}

#[derive(Serialize)]
struct SchedulerFrame {
    dashboard: SchedulerStats,
    transactions: SchedulerStats,
    wallet: Option<SchedulerStats>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries frames
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("sentinel_monitor=info,sentinel_core=info")
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Using default configuration");
        AppConfig::default()
    });

    let session = SessionStore::new(&config.session);

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None => {}
        Some("connect") => {
            let raw = args
                .get(1)
                .ok_or_else(|| anyhow::anyhow!("usage: sentinel-monitor connect <address>"))?;
            let wallet = WalletIdentity::parse(raw)?;
            session.save(&wallet)?;
            return Ok(());
        }
        Some("disconnect") => {
            session.clear()?;
            return Ok(());
        }
        Some(other) => anyhow::bail!("unknown command: {}", other),
    }

    tracing::info!(
        api_url = %config.api.base_url,
        dashboard_ms = config.polling.dashboard_interval_ms,
        transactions_ms = config.polling.transactions_interval_ms,
        overlap = ?config.polling.overlap,
        "Starting Sentinel Monitor"
    );

    let client = Arc::new(AlertApiClient::new(&config.api, &config.cache)?);
    match client.health().await {
        Ok(health) => tracing::info!(health = %health, "Alerting API reachable"),
        Err(e) => tracing::warn!(error = %e, "Alerting API health check failed, polling anyway"),
    }

    let wallet = session.load();
    tracing::info!(wallet = %sentinel_core::shorten(wallet.as_ref()), "Session loaded");

    let options = config.scheduler_options();

    let dashboard = Arc::new(DashboardView::new(
        Arc::clone(&client),
        &config.window,
        wallet.as_ref(),
    ));
    let mut dashboard_poll = PollingScheduler::new(options);
    dashboard_poll.start(
        Duration::from_millis(config.polling.dashboard_interval_ms),
        Arc::clone(&dashboard),
    )?;

    let transactions = Arc::new(TransactionMonitorView::new(
        Arc::clone(&client),
        &config.window,
        wallet.as_ref(),
    ));
    let mut transactions_poll = PollingScheduler::new(options);
    transactions_poll.start(
        Duration::from_millis(config.polling.transactions_interval_ms),
        Arc::clone(&transactions),
    )?;

    let activity = match wallet {
        Some(wallet) => {
            let view = Arc::new(WalletActivityView::new(Arc::clone(&client), wallet));
            let mut poll = PollingScheduler::new(options);
            poll.start(
                Duration::from_millis(config.polling.wallet_interval_ms),
                Arc::clone(&view),
            )?;
            Some((view, poll))
        }
        None => {
            tracing::info!("No wallet connected, wallet activity view disabled");
            None
        }
    };

    let mut render = tokio::time::interval(Duration::from_millis(config.render.frame_interval_ms));
    render.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            _ = &mut interrupt => {
                tracing::info!("Interrupt received, shutting down");
                break;
            }
            _ = render.tick() => {
                let frame = Frame {
                    rendered_at: Utc::now(),
                    dashboard: dashboard.frame(),
                    transactions: transactions.frame(),
                    wallet: activity.as_ref().map(|(view, _)| view.frame()),
                    schedulers: SchedulerFrame {
                        dashboard: dashboard_poll.stats(),
                        transactions: transactions_poll.stats(),
                        wallet: activity.as_ref().map(|(_, poll)| poll.stats()),
                    },
                };
                match serde_json::to_string(&frame) {
                    Ok(line) => println!("{}", line),
                    Err(e) => tracing::error!(error = %e, "Failed to encode frame"),
                }
            }
        }
    }

    dashboard_poll.shutdown().await;
    transactions_poll.shutdown().await;
    if let Some((_, poll)) = activity {
        poll.shutdown().await;
    }

    tracing::info!("Sentinel Monitor stopped");
    Ok(())
}
