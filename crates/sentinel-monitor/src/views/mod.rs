//! Polled views
//!
//! Each view owns its state behind a lock and implements [`PollCycle`], so a
//! [`PollingScheduler`] can drive it. Renderers read through the `current_*`
//! accessors or take a whole serializable frame.
//!
//! [`PollCycle`]: crate::scheduler::PollCycle
//! [`PollingScheduler`]: crate::scheduler::PollingScheduler

pub mod dashboard;
pub mod transactions;
pub mod wallet;

pub use dashboard::{DashboardFetch, DashboardFrame, DashboardView};
pub use transactions::{TransactionMonitorFrame, TransactionMonitorView};
pub use wallet::{WalletActivityFrame, WalletActivityView};

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

// poisoning is ignored: apply replaces fields wholesale
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
