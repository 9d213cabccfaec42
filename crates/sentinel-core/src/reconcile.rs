//! Reconcilers turning one polled result into view state
//!
//! Each function is synchronous and complete: the polling side calls them
//! only after a fetch has resolved, so a renderer never sees a half-applied
//! cycle.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::classifier::{classify, ClassifiedAlert};
use crate::models::{AlertRecord, PoolEntry, PoolState, PoolStatus, SeriesPoint, StatsSnapshot};

/// Records shown in the live pool
pub const DEFAULT_PENDING_SIZE: usize = 5;

// =============================================================================
// Stats
// =============================================================================

/// Outcome of reconciling one stats poll
#[derive(Debug, Clone, PartialEq)]
pub struct StatsUpdate {
    /// The fetched snapshot, verbatim
    pub snapshot: StatsSnapshot,
    /// Point to append to the risk series
    pub point: SeriesPoint,
    /// Whether the snapshot differs from the previous one
    pub changed: bool,
}

/// Replace the stats snapshot and derive this cycle's series point.
///
/// The previous snapshot is never merged in: a field that came back as zero
/// stays zero. A missing or non-finite `avg_risk_score` charts as 0 instead of
/// failing the cycle.
pub fn reconcile_stats(
    previous: Option<&StatsSnapshot>,
    fetched: StatsSnapshot,
    now: DateTime<Utc>,
) -> StatsUpdate {
    let risk = fetched
        .avg_risk_score
        .filter(|avg| avg.is_finite())
        .map(|avg| round_2dp(avg * 100.0))
        .unwrap_or(0.0);

    StatsUpdate {
        changed: previous != Some(&fetched),
        snapshot: fetched,
        point: SeriesPoint::new(now, risk),
    }
}

fn round_2dp(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// =============================================================================
// Transaction Pool
// =============================================================================

/// Split one alert batch into the live pool and the completed list.
///
/// This is a presentational split, not a lifecycle: nothing moves from
/// `pending` to `completed`. Both lists are redrawn from the latest batch.
pub fn reconcile_pool(batch: &[AlertRecord], pending_size: usize) -> PoolState {
    PoolState {
        pending: batch
            .iter()
            .take(pending_size)
            .map(|record| PoolEntry {
                record: record.clone(),
                status: PoolStatus::Pending,
            })
            .collect(),
        completed: batch.to_vec(),
    }
}

// =============================================================================
// Alert Feed
// =============================================================================

/// Classified, id-unique alert feed in batch order, capped at `limit`.
///
/// The first occurrence of an id wins; the batch is most-recent-first.
pub fn reconcile_feed(batch: &[AlertRecord], limit: usize) -> Vec<ClassifiedAlert> {
    let mut seen = HashSet::with_capacity(batch.len());
    batch
        .iter()
        .filter(|record| seen.insert(record.id))
        .take(limit)
        .map(classify)
        .collect()
}
