//! # Sentinel Monitor
//!
//! Async polling engine for the Sentinel risk dashboard.
//!
//! Each view (dashboard, transaction monitor, wallet activity) is driven by its
//! own [`PollingScheduler`]: fixed cadence, immediate first cycle, responses
//! applied strictly in issue order, and nothing applied once the scheduler has
//! been stopped. The alerting API is reached through [`AlertApiClient`] and the
//! connected wallet is read from the [`SessionStore`].

pub mod client;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod session_store;
pub mod views;

pub use client::{AlertApiClient, AlertSource};
pub use config::AppConfig;
pub use error::{ErrorKind, MonitorError, MonitorResult};
pub use scheduler::{OverlapPolicy, PollCycle, PollingScheduler, SchedulerOptions, SchedulerStats};
pub use session_store::SessionStore;
pub use views::{DashboardView, TransactionMonitorView, WalletActivityView};
