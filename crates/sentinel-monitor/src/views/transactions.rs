//! Transaction monitor: the live pool and the completed list

use std::sync::{Arc, RwLock};

use serde::Serialize;

use sentinel_core::{reconcile_pool, shorten, AlertRecord, PoolState, WalletIdentity};

use crate::client::AlertSource;
use crate::config::WindowConfig;
use crate::error::{MonitorError, MonitorResult};
use crate::scheduler::PollCycle;

use super::{read, write};

#[derive(Debug, Clone, Serialize)]
pub struct TransactionMonitorFrame {
    pub wallet: String,
    pub pool: PoolState,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct MonitorState {
    pool: PoolState,
    last_error: Option<MonitorError>,
}

pub struct TransactionMonitorView<S: AlertSource> {
    source: Arc<S>,
    alert_limit: usize,
    pending_size: usize,
    wallet_display: String,
    state: RwLock<MonitorState>,
}

impl<S: AlertSource> TransactionMonitorView<S> {
    pub fn new(source: Arc<S>, window: &WindowConfig, wallet: Option<&WalletIdentity>) -> Self {
        Self {
            source,
            alert_limit: window.alert_limit,
            pending_size: window.pending_size,
            wallet_display: shorten(wallet),
            state: RwLock::new(MonitorState::default()),
        }
    }

    pub fn current_pool_state(&self) -> PoolState {
        read(&self.state).pool.clone()
    }

    pub fn current_wallet_display(&self) -> String {
        self.wallet_display.clone()
    }

    pub fn last_error(&self) -> Option<MonitorError> {
        read(&self.state).last_error.clone()
    }

    pub fn frame(&self) -> TransactionMonitorFrame {
        let state = read(&self.state);
        TransactionMonitorFrame {
            wallet: self.wallet_display.clone(),
            pool: state.pool.clone(),
            last_error: state.last_error.as_ref().map(ToString::to_string),
        }
    }
}

impl<S: AlertSource> PollCycle for TransactionMonitorView<S> {
    type Fetched = Vec<AlertRecord>;

    fn name(&self) -> &'static str {
        "transactions"
    }

    async fn fetch(&self) -> MonitorResult<Vec<AlertRecord>> {
        self.source.fetch_alerts(self.alert_limit).await
    }

    fn apply(&self, batch: Vec<AlertRecord>) {
        let pool = reconcile_pool(&batch, self.pending_size);
        tracing::debug!(
            pending = pool.pending.len(),
            completed = pool.completed.len(),
            "Pool reconciled"
        );

        let mut state = write(&self.state);
        state.pool = pool;
        state.last_error = None;
    }

    fn on_failure(&self, error: &MonitorError) {
        write(&self.state).last_error = Some(error.clone());
    }
}
