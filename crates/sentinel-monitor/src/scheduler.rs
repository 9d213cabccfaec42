//! Fixed-cadence polling bound to a view's lifetime
//!
//! A [`PollingScheduler`] drives one [`PollCycle`]: it fires immediately on
//! `start`, then once per interval measured start-to-start. Every fetch gets a
//! [`Ticket`] from a [`SequenceGate`]; a result, success or failure, is used
//! only if its ticket is newer than every result resolved so far and the gate
//! is still open. `stop` closes
//! the gate under the same lock that guards apply, so once it returns no cycle
//! issued before it can touch view state, whenever its request resolves.

use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::{MonitorError, MonitorResult};

/// One fetch-and-reconcile round.
///
/// `fetch` is the only suspending step. `apply` is synchronous and must leave
/// the view consistent when it returns.
pub trait PollCycle: Send + Sync + 'static {
    type Fetched: Send + 'static;

    /// Name used in logs
    fn name(&self) -> &'static str;

    fn fetch(&self) -> impl Future<Output = MonitorResult<Self::Fetched>> + Send;

    fn apply(&self, fetched: Self::Fetched);

    /// Called for failed cycles while the scheduler is still running
    fn on_failure(&self, _error: &MonitorError) {}
}

/// What to do when a tick fires while a fetch is still outstanding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Skip the tick; at most one fetch in flight
    #[default]
    Skip,
    /// Fire anyway; stale responses are dropped by sequence number
    Allow,
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerOptions {
    /// Upper bound for one fetch, independent of the interval
    pub fetch_timeout: Duration,
    pub overlap: OverlapPolicy,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(10),
            overlap: OverlapPolicy::Skip,
        }
    }
}

// =============================================================================
// Sequence Gate
// =============================================================================

/// Sequence number handed to one issued cycle
#[derive(Debug, PartialEq, Eq)]
pub struct Ticket(u64);

impl Ticket {
    pub fn seq(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// A newer response resolved first
    Stale,
    /// The gate was closed before the response arrived
    Closed,
}

#[derive(Debug)]
struct GateState {
    next_seq: u64,
    /// Highest ticket resolved, successfully or not
    last_resolved: u64,
    open: bool,
}

/// Orders applies by issue sequence and fences them off after `close`.
///
/// One gate lives for one run of a scheduler; restarting creates a new gate,
/// so tickets from an earlier run can never be applied.
#[derive(Debug)]
pub struct SequenceGate {
    state: Mutex<GateState>,
}

impl Default for SequenceGate {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState {
                next_seq: 1,
                last_resolved: 0,
                open: true,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Next ticket, or `None` once the gate is closed
    pub fn issue(&self) -> Option<Ticket> {
        let mut state = self.lock();
        if !state.open {
            return None;
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        Some(Ticket(seq))
    }

    /// Run `apply` if the gate is open and `ticket` is newer than anything
    /// resolved so far. The lock is held while `apply` runs.
    pub fn apply_if_current<F: FnOnce()>(&self, ticket: Ticket, apply: F) -> ApplyOutcome {
        self.resolve(ticket, apply)
    }

    /// Failure counterpart of [`apply_if_current`](Self::apply_if_current).
    ///
    /// A failure also resolves its ticket, so an older success arriving later
    /// is stale.
    pub fn report_if_current<F: FnOnce()>(&self, ticket: Ticket, report: F) -> ApplyOutcome {
        self.resolve(ticket, report)
    }

    fn resolve<F: FnOnce()>(&self, ticket: Ticket, f: F) -> ApplyOutcome {
        let mut state = self.lock();
        if !state.open {
            return ApplyOutcome::Closed;
        }
        if ticket.0 <= state.last_resolved {
            return ApplyOutcome::Stale;
        }
        state.last_resolved = ticket.0;
        f();
        ApplyOutcome::Applied
    }

    pub fn close(&self) {
        self.lock().open = false;
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }
}

// =============================================================================
// Metrics
// =============================================================================

#[derive(Debug, Default)]
struct SchedulerMetrics {
    issued: AtomicU64,
    applied: AtomicU64,
    failed: AtomicU64,
    skipped: AtomicU64,
    stale: AtomicU64,
    discarded: AtomicU64,
}

/// Counters for one scheduler, across all of its runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub issued: u64,
    pub applied: u64,
    pub failed: u64,
    /// Ticks skipped because a fetch was still in flight
    pub skipped: u64,
    /// Responses dropped because a newer one had resolved
    pub stale: u64,
    /// Responses that resolved after `stop`
    pub discarded: u64,
}

impl SchedulerMetrics {
    fn snapshot(&self) -> SchedulerStats {
        SchedulerStats {
            issued: self.issued.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

// =============================================================================
// Scheduler
// =============================================================================

struct RunningPoll {
    cancel: CancellationToken,
    gate: Arc<SequenceGate>,
    task: JoinHandle<()>,
}

/// Polls one view on a fixed cadence between `start` and `stop`.
///
/// Dropping a running scheduler stops it.
pub struct PollingScheduler<C: PollCycle> {
    options: SchedulerOptions,
    metrics: Arc<SchedulerMetrics>,
    running: Option<RunningPoll>,
    _cycle: std::marker::PhantomData<fn() -> C>,
}

impl<C: PollCycle> PollingScheduler<C> {
    pub fn new(options: SchedulerOptions) -> Self {
        Self {
            options,
            metrics: Arc::new(SchedulerMetrics::default()),
            running: None,
            _cycle: std::marker::PhantomData,
        }
    }

    /// Start polling `cycle` every `interval`, beginning immediately.
    ///
    /// Starting an already running scheduler is a no-op.
    pub fn start(&mut self, interval: Duration, cycle: Arc<C>) -> MonitorResult<()> {
        if interval.is_zero() {
            return Err(MonitorError::Config("poll interval must be greater than zero".into()));
        }
        if self.is_running() {
            tracing::debug!(view = cycle.name(), "Scheduler already running");
            return Ok(());
        }

        let cancel = CancellationToken::new();
        let gate = Arc::new(SequenceGate::new());

        tracing::info!(
            view = cycle.name(),
            interval_ms = interval.as_millis() as u64,
            overlap = ?self.options.overlap,
            "Starting poll scheduler"
        );

        let task = tokio::spawn(drive(
            cycle,
            interval,
            self.options,
            Arc::clone(&gate),
            cancel.clone(),
            Arc::clone(&self.metrics),
        ));

        self.running = Some(RunningPoll { cancel, gate, task });
        Ok(())
    }

    /// Stop polling. Cycles still in flight finish, but their results are
    /// discarded.
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.gate.close();
            running.cancel.cancel();
            tracing::info!("Poll scheduler stopped");
        }
    }

    /// Stop and wait for the timer loop to exit
    pub async fn shutdown(mut self) {
        if let Some(running) = self.running.take() {
            running.gate.close();
            running.cancel.cancel();
            if let Err(e) = running.task.await {
                tracing::warn!(error = %e, "Poll loop ended abnormally");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.metrics.snapshot()
    }
}

impl<C: PollCycle> Drop for PollingScheduler<C> {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn drive<C: PollCycle>(
    cycle: Arc<C>,
    interval: Duration,
    options: SchedulerOptions,
    gate: Arc<SequenceGate>,
    cancel: CancellationToken,
    metrics: Arc<SchedulerMetrics>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let in_flight = Arc::new(AtomicUsize::new(0));

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if options.overlap == OverlapPolicy::Skip && in_flight.load(Ordering::SeqCst) > 0 {
            bump(&metrics.skipped);
            tracing::debug!(view = cycle.name(), "Previous cycle still in flight, skipping tick");
            continue;
        }

        let Some(ticket) = gate.issue() else { break };
        bump(&metrics.issued);
        in_flight.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(run_cycle(
            Arc::clone(&cycle),
            ticket,
            options.fetch_timeout,
            Arc::clone(&gate),
            Arc::clone(&in_flight),
            Arc::clone(&metrics),
        ));
    }

    tracing::debug!(view = cycle.name(), "Poll loop exited");
}

async fn run_cycle<C: PollCycle>(
    cycle: Arc<C>,
    ticket: Ticket,
    fetch_timeout: Duration,
    gate: Arc<SequenceGate>,
    in_flight: Arc<AtomicUsize>,
    metrics: Arc<SchedulerMetrics>,
) {
    let seq = ticket.seq();
    let view = cycle.name();

    let result = match tokio::time::timeout(fetch_timeout, cycle.fetch()).await {
        Ok(result) => result,
        Err(_) => Err(MonitorError::Timeout(fetch_timeout)),
    };
    in_flight.fetch_sub(1, Ordering::SeqCst);

    match result {
        Ok(fetched) => match gate.apply_if_current(ticket, || cycle.apply(fetched)) {
            ApplyOutcome::Applied => {
                bump(&metrics.applied);
                tracing::debug!(view, seq, "Applied poll cycle");
            }
            ApplyOutcome::Stale => {
                bump(&metrics.stale);
                tracing::debug!(view, seq, "Dropping stale response");
            }
            ApplyOutcome::Closed => {
                bump(&metrics.discarded);
                tracing::debug!(view, seq, "Dropping response that resolved after stop");
            }
        },
        Err(e) => match gate.report_if_current(ticket, || {
            tracing::warn!(
                view,
                seq,
                error = %e,
                kind = ?e.kind(),
                status = ?e.status_code(),
                "Poll cycle failed"
            );
            cycle.on_failure(&e);
        }) {
            ApplyOutcome::Applied => bump(&metrics.failed),
            ApplyOutcome::Stale => {
                bump(&metrics.stale);
                tracing::debug!(view, seq, error = %e, "Dropping stale failure");
            }
            ApplyOutcome::Closed => bump(&metrics.discarded),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use tokio::sync::oneshot;

    type Response = MonitorResult<u32>;

    /// Each fetch takes the next scripted receiver; with none left it never resolves.
    #[derive(Default)]
    struct ScriptedCycle {
        responses: Mutex<VecDeque<oneshot::Receiver<Response>>>,
        applied: Mutex<Vec<u32>>,
        failures: Mutex<Vec<MonitorError>>,
    }

    impl ScriptedCycle {
        fn scripted(count: usize) -> (Arc<Self>, Vec<oneshot::Sender<Response>>) {
            let cycle = Self::default();
            let mut senders = Vec::with_capacity(count);
            for _ in 0..count {
                let (tx, rx) = oneshot::channel();
                senders.push(tx);
                cycle.responses.lock().unwrap().push_back(rx);
            }
            (Arc::new(cycle), senders)
        }

        fn applied(&self) -> Vec<u32> {
            self.applied.lock().unwrap().clone()
        }

        fn failures(&self) -> usize {
            self.failures.lock().unwrap().len()
        }
    }

    impl PollCycle for ScriptedCycle {
        type Fetched = u32;

        fn name(&self) -> &'static str {
            "scripted"
        }

        fn fetch(&self) -> impl Future<Output = MonitorResult<u32>> + Send {
            let next = self.responses.lock().unwrap().pop_front();
            async move {
                match next {
                    Some(rx) => rx
                        .await
                        .unwrap_or_else(|_| Err(MonitorError::Network("sender dropped".into()))),
                    None => std::future::pending().await,
                }
            }
        }

        fn apply(&self, fetched: u32) {
            self.applied.lock().unwrap().push(fetched);
        }

        fn on_failure(&self, error: &MonitorError) {
            self.failures.lock().unwrap().push(error.clone());
        }
    }

    fn options(overlap: OverlapPolicy) -> SchedulerOptions {
        SchedulerOptions {
            fetch_timeout: Duration::from_secs(3600),
            overlap,
        }
    }

    /// Let spawned tasks run; the paused clock only advances once everything is idle.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[test]
    fn test_gate_drops_older_ticket() {
        let gate = SequenceGate::new();
        let first = gate.issue().unwrap();
        let second = gate.issue().unwrap();
        assert_eq!(first.seq(), 1);
        assert_eq!(second.seq(), 2);

        let mut state = Vec::new();
        assert_eq!(gate.apply_if_current(second, || state.push(2)), ApplyOutcome::Applied);
        assert_eq!(gate.apply_if_current(first, || state.push(1)), ApplyOutcome::Stale);
        assert_eq!(state, vec![2]);
    }

    #[test]
    fn test_closed_gate_refuses_everything() {
        let gate = SequenceGate::new();
        let ticket = gate.issue().unwrap();
        gate.close();

        let mut touched = false;
        assert_eq!(gate.apply_if_current(ticket, || touched = true), ApplyOutcome::Closed);
        assert!(!touched);
        assert!(gate.issue().is_none());
    }

    #[test]
    fn test_failure_resolves_its_ticket() {
        let gate = SequenceGate::new();
        let first = gate.issue().unwrap();
        let second = gate.issue().unwrap();

        let mut state = Vec::new();
        assert_eq!(gate.report_if_current(second, || state.push("err 2")), ApplyOutcome::Applied);
        assert_eq!(gate.apply_if_current(first, || state.push("ok 1")), ApplyOutcome::Stale);
        assert_eq!(state, vec!["err 2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_cycle_fires_immediately() {
        let (cycle, mut senders) = ScriptedCycle::scripted(1);
        senders.remove(0).send(Ok(7)).unwrap();

        let mut scheduler = PollingScheduler::new(options(OverlapPolicy::Skip));
        scheduler.start(Duration::from_secs(5), Arc::clone(&cycle)).unwrap();
        settle().await;

        assert_eq!(cycle.applied(), vec![7]);
        assert_eq!(scheduler.stats().issued, 1);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_order_responses_apply_newest_only() {
        let (cycle, mut senders) = ScriptedCycle::scripted(2);
        let mut scheduler = PollingScheduler::new(options(OverlapPolicy::Allow));
        scheduler.start(Duration::from_millis(10), Arc::clone(&cycle)).unwrap();

        // ticks at 0ms and 10ms issue R1 and R2
        tokio::time::sleep(Duration::from_millis(15)).await;
        let r2 = senders.pop().unwrap();
        let r1 = senders.pop().unwrap();

        r2.send(Ok(2)).unwrap();
        settle().await;
        r1.send(Ok(1)).unwrap();
        settle().await;

        assert_eq!(cycle.applied(), vec![2]);
        let stats = scheduler.stats();
        assert_eq!(stats.applied, 1);
        assert_eq!(stats.stale, 1);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_older_failure_after_newer_success_is_dropped() {
        let (cycle, mut senders) = ScriptedCycle::scripted(2);
        let mut scheduler = PollingScheduler::new(options(OverlapPolicy::Allow));
        scheduler.start(Duration::from_millis(10), Arc::clone(&cycle)).unwrap();

        tokio::time::sleep(Duration::from_millis(15)).await;
        let r2 = senders.pop().unwrap();
        let r1 = senders.pop().unwrap();

        r2.send(Ok(2)).unwrap();
        settle().await;
        r1.send(Err(MonitorError::Network("connection reset".into()))).unwrap();
        settle().await;

        assert_eq!(cycle.applied(), vec![2]);
        assert_eq!(cycle.failures(), 0);
        let stats = scheduler.stats();
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.stale, 1);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_older_success_after_newer_failure_is_dropped() {
        let (cycle, mut senders) = ScriptedCycle::scripted(2);
        let mut scheduler = PollingScheduler::new(options(OverlapPolicy::Allow));
        scheduler.start(Duration::from_millis(10), Arc::clone(&cycle)).unwrap();

        tokio::time::sleep(Duration::from_millis(15)).await;
        let r2 = senders.pop().unwrap();
        let r1 = senders.pop().unwrap();

        r2.send(Err(MonitorError::Api { status: 503, detail: None })).unwrap();
        settle().await;
        r1.send(Ok(1)).unwrap();
        settle().await;

        assert!(cycle.applied().is_empty());
        assert_eq!(cycle.failures(), 1);
        let stats = scheduler.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.stale, 1);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_response_after_stop_is_discarded() {
        let (cycle, mut senders) = ScriptedCycle::scripted(1);
        let mut scheduler = PollingScheduler::new(options(OverlapPolicy::Skip));
        scheduler.start(Duration::from_secs(5), Arc::clone(&cycle)).unwrap();
        settle().await;

        scheduler.stop();
        assert!(!scheduler.is_running());
        senders.remove(0).send(Ok(9)).unwrap();
        settle().await;

        assert!(cycle.applied().is_empty());
        assert_eq!(scheduler.stats().discarded, 1);
        assert_eq!(scheduler.stats().applied, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_after_stop_is_not_reported() {
        let (cycle, mut senders) = ScriptedCycle::scripted(1);
        let mut scheduler = PollingScheduler::new(options(OverlapPolicy::Skip));
        scheduler.start(Duration::from_secs(5), Arc::clone(&cycle)).unwrap();
        settle().await;

        scheduler.stop();
        senders
            .remove(0)
            .send(Err(MonitorError::Network("connection reset".into())))
            .unwrap();
        settle().await;

        assert_eq!(cycle.failures(), 0);
        assert_eq!(scheduler.stats().failed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_cycle_keeps_cadence() {
        let (cycle, senders) = ScriptedCycle::scripted(2);
        let mut senders = senders.into_iter();
        senders
            .next()
            .unwrap()
            .send(Err(MonitorError::Api { status: 500, detail: None }))
            .unwrap();
        senders.next().unwrap().send(Ok(3)).unwrap();

        let mut scheduler = PollingScheduler::new(options(OverlapPolicy::Skip));
        scheduler.start(Duration::from_millis(10), Arc::clone(&cycle)).unwrap();
        tokio::time::sleep(Duration::from_millis(15)).await;

        assert_eq!(cycle.failures(), 1);
        assert_eq!(cycle.applied(), vec![3]);
        let stats = scheduler.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.applied, 1);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_policy_never_overlaps() {
        let (cycle, mut senders) = ScriptedCycle::scripted(1);
        let mut scheduler = PollingScheduler::new(options(OverlapPolicy::Skip));
        scheduler.start(Duration::from_millis(10), Arc::clone(&cycle)).unwrap();

        // ticks at 10ms and 20ms fire while the first fetch is outstanding
        tokio::time::sleep(Duration::from_millis(25)).await;
        let stats = scheduler.stats();
        assert_eq!(stats.issued, 1);
        assert_eq!(stats.skipped, 2);

        senders.remove(0).send(Ok(1)).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(cycle.applied(), vec![1]);
        assert_eq!(scheduler.stats().issued, 2);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_times_out() {
        let (cycle, _senders) = ScriptedCycle::scripted(1);
        let mut scheduler = PollingScheduler::new(SchedulerOptions {
            fetch_timeout: Duration::from_millis(50),
            overlap: OverlapPolicy::Skip,
        });
        scheduler.start(Duration::from_secs(1), Arc::clone(&cycle)).unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(scheduler.stats().failed, 1);
        assert_eq!(
            cycle.failures.lock().unwrap()[0],
            MonitorError::Timeout(Duration::from_millis(50))
        );
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_ignores_previous_run() {
        let (cycle, mut senders) = ScriptedCycle::scripted(2);
        let mut scheduler = PollingScheduler::new(options(OverlapPolicy::Skip));
        scheduler.start(Duration::from_secs(5), Arc::clone(&cycle)).unwrap();
        settle().await;
        scheduler.stop();

        scheduler.start(Duration::from_secs(5), Arc::clone(&cycle)).unwrap();
        settle().await;

        let second = senders.pop().unwrap();
        let first = senders.pop().unwrap();
        first.send(Ok(1)).unwrap();
        second.send(Ok(2)).unwrap();
        settle().await;

        assert_eq!(cycle.applied(), vec![2]);
        scheduler.shutdown().await;
    }

    #[tokio::test]
    async fn test_zero_interval_is_rejected() {
        let (cycle, _senders) = ScriptedCycle::scripted(0);
        let mut scheduler = PollingScheduler::new(SchedulerOptions::default());
        assert!(scheduler.start(Duration::ZERO, cycle).is_err());
        assert!(!scheduler.is_running());
    }
}
