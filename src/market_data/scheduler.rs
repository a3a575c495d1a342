// Refresh scheduler: owns polling cadence and cancellation of fetch cycles.

use std::sync::Arc;
use std::time::{Instant as StdInstant, SystemTime};

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RefreshSettings;
use crate::error::{CycleError, SchedulerError};
use crate::market_data::aggregator::{Aggregate, Aggregator};
use crate::market_data::types::FundingRate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CycleStatus {
    Idle,     // nothing fetched yet
    Fetching, // a cycle is in flight
    Ready,    // last cycle succeeded, possibly partially
    Failed,   // last cycle failed; previous snapshot kept
}

/// Result of one successful cycle. Never mutated once published.
#[derive(Debug, Clone)]
pub struct RateSnapshot {
    pub rates: Vec<FundingRate>,
    pub fetched_at: SystemTime,
    pub failed_sources: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BoardState {
    pub status: CycleStatus,
    pub snapshot: Option<Arc<RateSnapshot>>,
    pub last_error: Option<String>,
    pub cycle: u64,
    pub auto_refresh: bool,
}

impl BoardState {
    fn initial(auto_refresh: bool) -> Self {
        Self { status: CycleStatus::Idle, snapshot: None, last_error: None, cycle: 0, auto_refresh }
    }

    pub fn in_flight(&self) -> bool {
        self.status == CycleStatus::Fetching
    }

    pub fn last_updated(&self) -> Option<SystemTime> {
        self.snapshot.as_ref().map(|s| s.fetched_at)
    }

    pub fn rates(&self) -> &[FundingRate] {
        self.snapshot.as_ref().map(|s| s.rates.as_slice()).unwrap_or(&[])
    }
}

enum Command {
    Trigger(Option<oneshot::Sender<u64>>),
    SetAutoRefresh(bool),
    Shutdown,
}

struct CycleOutcome {
    id: u64,
    started: StdInstant,
    result: Result<Aggregate, CycleError>,
}

struct InFlight {
    id: u64,
    cancel: CancellationToken,
}

/// Cheap handle for triggering cycles and reading the published state.
#[derive(Clone)]
pub struct SchedulerHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<Arc<BoardState>>,
}

impl SchedulerHandle {
    /// Start a new cycle, superseding any in flight. Returns the new cycle id.
    pub async fn trigger(&self) -> Result<u64, SchedulerError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Trigger(Some(tx))).await?;
        rx.await.map_err(|_| SchedulerError::Closed)
    }

    pub async fn set_auto_refresh(&self, enabled: bool) -> Result<(), SchedulerError> {
        self.send(Command::SetAutoRefresh(enabled)).await
    }

    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        self.send(Command::Shutdown).await
    }

    pub fn state(&self) -> Arc<BoardState> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<BoardState>> {
        self.state.clone()
    }

    /// Wait until cycle `id` (or a later one) has finished.
    pub async fn wait_settled(&self, id: u64) -> Result<Arc<BoardState>, SchedulerError> {
        let mut rx = self.state.clone();
        let state = rx
            .wait_for(|s| s.cycle >= id && !s.in_flight())
            .await
            .map_err(|_| SchedulerError::Closed)?;
        Ok(state.clone())
    }

    async fn send(&self, cmd: Command) -> Result<(), SchedulerError> {
        self.commands.send(cmd).await.map_err(|_| SchedulerError::Closed)
    }
}

pub struct RefreshScheduler {
    aggregator: Arc<Aggregator>,
    period: Duration,
    auto_refresh: bool,
    root: CancellationToken,
}

impl RefreshScheduler {
    pub fn new(aggregator: Aggregator, refresh: &RefreshSettings) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
            period: refresh.interval(),
            auto_refresh: refresh.auto_refresh,
            root: CancellationToken::new(),
        }
    }

    /// Run the scheduler on its own task. With auto-refresh on, the first cycle starts immediately.
    pub fn spawn(self) -> (SchedulerHandle, JoinHandle<()>) {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);
        let (state_tx, state_rx) = watch::channel(Arc::new(BoardState::initial(self.auto_refresh)));
        let task = tokio::spawn(self.run(cmd_rx, state_tx));
        (SchedulerHandle { commands: cmd_tx, state: state_rx }, task)
    }

    fn timer(&self, first: Instant) -> Interval {
        let mut timer = interval_at(first, self.period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>, state: watch::Sender<Arc<BoardState>>) {
        let (done_tx, mut done_rx) = mpsc::channel::<CycleOutcome>(8);
        let mut timer = self.timer(Instant::now());
        let mut current: Option<InFlight> = None;
        let mut next_id = 0u64;

        info!(period_secs = self.period.as_secs(), auto_refresh = self.auto_refresh, "refresh scheduler started");

        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(Command::Trigger(reply)) => {
                        let id = self.start_cycle(&mut next_id, &mut current, &done_tx, &state);
                        if let Some(reply) = reply {
                            let _ = reply.send(id);
                        }
                    }
                    Some(Command::SetAutoRefresh(enabled)) => {
                        let was = self.auto_refresh;
                        self.auto_refresh = enabled;
                        publish(&state, |s| s.auto_refresh = enabled);
                        if enabled && !was {
                            info!("auto-refresh enabled");
                            timer = self.timer(Instant::now() + self.period);
                            self.start_cycle(&mut next_id, &mut current, &done_tx, &state);
                        } else if !enabled && was {
                            info!("auto-refresh disabled");
                        }
                    }
                    Some(Command::Shutdown) | None => {
                        if let Some(cycle) = current.take() {
                            cycle.cancel.cancel();
                        }
                        self.root.cancel();
                        info!("refresh scheduler stopped");
                        break;
                    }
                },
                _ = timer.tick(), if self.auto_refresh => {
                    debug!("auto-refresh tick");
                    self.start_cycle(&mut next_id, &mut current, &done_tx, &state);
                }
                Some(outcome) = done_rx.recv() => {
                    match current.as_ref() {
                        Some(cycle) if cycle.id == outcome.id => {
                            current = None;
                            self.finish_cycle(outcome, &state);
                        }
                        _ => debug!(cycle = outcome.id, "discarding superseded cycle"),
                    }
                }
            }
        }
    }

    fn start_cycle(
        &self,
        next_id: &mut u64,
        current: &mut Option<InFlight>,
        done: &mpsc::Sender<CycleOutcome>,
        state: &watch::Sender<Arc<BoardState>>,
    ) -> u64 {
        if let Some(prev) = current.take() {
            info!(cycle = prev.id, "cancelling in-flight cycle");
            prev.cancel.cancel();
        }

        *next_id += 1;
        let id = *next_id;
        let cancel = self.root.child_token();
        *current = Some(InFlight { id, cancel: cancel.clone() });
        publish(state, |s| {
            s.status = CycleStatus::Fetching;
            s.cycle = id;
        });

        let aggregator = Arc::clone(&self.aggregator);
        let done = done.clone();
        tokio::spawn(async move {
            let started = StdInstant::now();
            let result = aggregator.collect(&cancel).await;
            // Receiver only goes away on shutdown.
            let _ = done.send(CycleOutcome { id, started, result }).await;
        });
        debug!(cycle = id, "cycle started");
        id
    }

    fn finish_cycle(&self, outcome: CycleOutcome, state: &watch::Sender<Arc<BoardState>>) {
        let elapsed = outcome.started.elapsed();
        metrics::histogram!("funding_board_cycle_seconds").record(elapsed.as_secs_f64());

        match outcome.result {
            Ok(aggregate) => {
                metrics::counter!("funding_board_cycles_total", "outcome" => "ok").increment(1);
                metrics::gauge!("funding_board_rates").set(aggregate.rates.len() as f64);
                info!(
                    cycle = outcome.id,
                    records = aggregate.rates.len(),
                    failed = ?aggregate.failed_sources,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "cycle complete"
                );
                let snapshot = RateSnapshot {
                    rates: aggregate.rates,
                    fetched_at: SystemTime::now(),
                    failed_sources: aggregate.failed_sources,
                };
                publish(state, |s| {
                    s.status = CycleStatus::Ready;
                    s.snapshot = Some(Arc::new(snapshot));
                    s.last_error = None;
                });
            }
            Err(CycleError::Cancelled) => {
                debug!(cycle = outcome.id, "cycle cancelled");
                publish(state, |s| {
                    s.status = if s.snapshot.is_some() { CycleStatus::Ready } else { CycleStatus::Idle };
                });
            }
            Err(e) => {
                metrics::counter!("funding_board_cycles_total", "outcome" => "error").increment(1);
                warn!(cycle = outcome.id, error = %e, "cycle failed, keeping previous snapshot");
                publish(state, |s| {
                    s.status = CycleStatus::Failed;
                    s.last_error = Some(e.to_string());
                });
            }
        }
    }
}

// Replace the published state in one step; readers never see a half-updated board.
fn publish(tx: &watch::Sender<Arc<BoardState>>, update: impl FnOnce(&mut BoardState)) {
    let mut next = BoardState::clone(&tx.borrow());
    update(&mut next);
    tx.send_replace(Arc::new(next));
}
