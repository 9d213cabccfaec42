//! Wallet activity view
//!
//! Only built when a wallet is connected. Transactions come through the
//! client's cache, so a short interval does not translate into backend load.

use std::sync::{Arc, RwLock};

use serde::Serialize;

use sentinel_core::{shorten, WalletIdentity, WalletTransaction};

use crate::client::AlertSource;
use crate::error::{MonitorError, MonitorResult};
use crate::scheduler::PollCycle;

use super::{read, write};

#[derive(Debug, Clone, Serialize)]
pub struct WalletActivityFrame {
    pub wallet: String,
    pub loading: bool,
    pub transactions: Vec<WalletTransaction>,
    pub last_error: Option<String>,
}

#[derive(Debug)]
struct ActivityState {
    transactions: Vec<WalletTransaction>,
    loading: bool,
    last_error: Option<MonitorError>,
}

pub struct WalletActivityView<S: AlertSource> {
    source: Arc<S>,
    wallet: WalletIdentity,
    state: RwLock<ActivityState>,
}

impl<S: AlertSource> WalletActivityView<S> {
    pub fn new(source: Arc<S>, wallet: WalletIdentity) -> Self {
        Self {
            source,
            wallet,
            state: RwLock::new(ActivityState {
                transactions: Vec::new(),
                loading: true,
                last_error: None,
            }),
        }
    }

    pub fn wallet(&self) -> &WalletIdentity {
        &self.wallet
    }

    pub fn current_transactions(&self) -> Vec<WalletTransaction> {
        read(&self.state).transactions.clone()
    }

    /// True until the first cycle completes, whatever its outcome
    pub fn is_loading(&self) -> bool {
        read(&self.state).loading
    }

    pub fn current_wallet_display(&self) -> String {
        shorten(Some(&self.wallet))
    }

    pub fn last_error(&self) -> Option<MonitorError> {
        read(&self.state).last_error.clone()
    }

    pub fn frame(&self) -> WalletActivityFrame {
        let state = read(&self.state);
        WalletActivityFrame {
            wallet: shorten(Some(&self.wallet)),
            loading: state.loading,
            transactions: state.transactions.clone(),
            last_error: state.last_error.as_ref().map(ToString::to_string),
        }
    }
}

impl<S: AlertSource> PollCycle for WalletActivityView<S> {
    type Fetched = Vec<WalletTransaction>;

    fn name(&self) -> &'static str {
        "wallet"
    }

    async fn fetch(&self) -> MonitorResult<Vec<WalletTransaction>> {
        self.source.fetch_wallet_transactions(&self.wallet).await
    }

    fn apply(&self, transactions: Vec<WalletTransaction>) {
        let mut state = write(&self.state);
        if state.loading {
            tracing::info!(
                wallet = %shorten(Some(&self.wallet)),
                count = transactions.len(),
                "Wallet activity loaded"
            );
        }
        state.transactions = transactions;
        state.loading = false;
        state.last_error = None;
    }

    fn on_failure(&self, error: &MonitorError) {
        let mut state = write(&self.state);
        state.loading = false;
        state.last_error = Some(error.clone());
    }
}
