//! # Sentinel Core
//!
//! Domain models and pure reconciliation logic for the Sentinel risk dashboard.
//!
//! This crate holds everything that does not suspend: alert records as the
//! alerting API delivers them, severity classification, the bounded risk
//! series that feeds the chart, and the reconcilers that turn one polled batch
//! into view state. The async polling side lives in `sentinel-monitor`.

pub mod classifier;
pub mod error;
pub mod models;
pub mod reconcile;
pub mod series;
pub mod session;

pub use classifier::*;
pub use error::*;
pub use models::*;
pub use reconcile::*;
pub use series::*;
pub use session::*;
