// Draft monitor: connects to a draft, owns the poll task and serves the
// latest snapshot to callers.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use draftline_core::config::{Config, StrategyConfig};
use draftline_core::draft::pick::Position;
use draftline_core::draft::state::DraftState;
use draftline_core::engine::{self, EngineSnapshot};
use draftline_core::projections::ProjectionTable;
use draftline_core::valuation::market::MarketSignal;
use draftline_core::valuation::recommend::Recommendation;

use crate::host::{self as host_api, DraftHost, HostError};
use crate::poller::{self, ConnectionStatus, Health, PollContext};

/// Snapshots buffered per `on_update` subscriber before it starts lagging.
const UPDATE_BUFFER: usize = 16;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures that stop a connection before any poll loop starts.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("draft {0} not found")]
    DraftNotFound(String),

    #[error("unsupported draft: {0}")]
    Unsupported(String),

    #[error("draft host error: {0}")]
    Host(#[from] HostError),
}

fn connect_error(err: HostError) -> MonitorError {
    match err {
        HostError::NotFound(id) => MonitorError::DraftNotFound(id),
        other => MonitorError::Host(other),
    }
}

// ---------------------------------------------------------------------------
// DraftMonitor
// ---------------------------------------------------------------------------

struct PollTask {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<DraftState>,
}

/// Live view of one draft.
///
/// All mutation of the draft state happens inside the poll task; the
/// monitor only ever reads published snapshots.
pub struct DraftMonitor {
    ctx: PollContext,
    snapshot_rx: watch::Receiver<Arc<EngineSnapshot>>,
    health_rx: watch::Receiver<Health>,
    task: Option<PollTask>,
    /// State recovered from a stopped loop, waiting for a restart.
    parked: Option<DraftState>,
}

impl DraftMonitor {
    /// Connect to `draft_id`, load the picks made so far and start polling.
    ///
    /// A missing draft or an auction draft is an error here and no loop is
    /// started. A draft that is already complete is loaded but not polled.
    pub async fn connect(
        host: Arc<dyn DraftHost>,
        draft_id: &str,
        projections: Arc<ProjectionTable>,
        config: &Config,
    ) -> Result<Self, MonitorError> {
        let metadata = host.fetch_draft(draft_id).await.map_err(connect_error)?;
        if metadata.is_auction() {
            return Err(MonitorError::Unsupported(format!(
                "draft {draft_id} is an auction draft"
            )));
        }

        let settings = metadata.league_settings(&config.league.settings());
        let mut state = DraftState::new(draft_id, settings, projections);

        let remote = host.fetch_picks(draft_id).await.map_err(connect_error)?;
        let picks = host_api::to_picks(&remote, state.settings(), Utc::now());
        let applied = state.apply_batch(picks);
        if metadata.is_complete() {
            state.mark_complete();
        }
        let complete = state.is_complete();
        info!(
            "connected to draft {} ({} teams, {} rounds): {} picks made, status '{}'",
            draft_id,
            state.settings().num_teams,
            state.settings().rounds,
            applied,
            metadata.status
        );

        let focus_slot = config.league.my_slot;
        let focus_team = focus_slot.map(|slot| state.settings().team_for_slot(slot));
        let strategy = Arc::new(config.strategy.clone());
        let snapshot = Arc::new(engine::recompute(&state, &strategy, focus_team));

        let (snapshot_tx, snapshot_rx) = watch::channel(snapshot);
        let (health_tx, health_rx) = watch::channel(Health::connected(state.pick_count(), complete));
        let (updates_tx, _) = broadcast::channel(UPDATE_BUFFER);

        let ctx = PollContext {
            host,
            strategy,
            polling: config.polling.clone(),
            focus_slot,
            snapshot_tx,
            updates_tx,
            health_tx,
        };
        let mut monitor = DraftMonitor {
            ctx,
            snapshot_rx,
            health_rx,
            task: None,
            parked: None,
        };

        if complete {
            info!("draft {} already complete; not polling", draft_id);
            monitor.parked = Some(state);
        } else {
            monitor.spawn(state);
        }
        Ok(monitor)
    }

    fn spawn(&mut self, state: DraftState) {
        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(poller::run(state, self.ctx.clone(), shutdown_rx));
        self.task = Some(PollTask { shutdown, handle });
    }

    // -- Queries --

    /// The latest published snapshot.
    pub fn snapshot(&self) -> Arc<EngineSnapshot> {
        self.snapshot_rx.borrow().clone()
    }

    /// Ranked recommendations for `team_id` against the latest snapshot.
    pub fn recommendations(&self, team_id: u32) -> Vec<Recommendation> {
        let snapshot = self.snapshot();
        if snapshot.focus_team == Some(team_id) {
            return snapshot.recommendations.clone();
        }
        engine::recommendations_for(&snapshot.state, team_id, &self.ctx.strategy)
    }

    /// Position → replacement-level projection.
    pub fn replacement_levels(&self) -> BTreeMap<Position, f64> {
        self.snapshot().replacement_levels.as_map()
    }

    pub fn market_signals(&self) -> BTreeMap<Position, MarketSignal> {
        self.snapshot().market.signals.clone()
    }

    pub fn connection_status(&self) -> Health {
        self.health_rx.borrow().clone()
    }

    /// Team behind the configured draft slot, as of the latest snapshot.
    pub fn focus_team(&self) -> Option<u32> {
        self.snapshot().focus_team
    }

    pub fn strategy(&self) -> &StrategyConfig {
        &self.ctx.strategy
    }

    pub fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .map(|t| !t.handle.is_finished())
            .unwrap_or(false)
    }

    // -- Subscriptions --

    /// Raw receiver of every snapshot published after new picks.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<EngineSnapshot>> {
        self.ctx.updates_tx.subscribe()
    }

    pub fn watch_snapshot(&self) -> watch::Receiver<Arc<EngineSnapshot>> {
        self.snapshot_rx.clone()
    }

    pub fn watch_health(&self) -> watch::Receiver<Health> {
        self.health_rx.clone()
    }

    /// Run `callback` on its own task for every snapshot published after
    /// new picks. A callback that falls behind skips to newer snapshots;
    /// it never holds up the poll loop.
    pub fn on_update<F>(&self, mut callback: F) -> JoinHandle<()>
    where
        F: FnMut(Arc<EngineSnapshot>) + Send + 'static,
    {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(snapshot) => callback(snapshot),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("update callback lagged, skipped {} snapshot(s)", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    // -- Lifecycle --

    /// Stop the poll loop, keeping the accumulated draft state. Safe to call
    /// at any time, including when nothing is running.
    pub async fn stop_monitoring(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        // The loop may already have exited on completion.
        let _ = task.shutdown.send(());
        let state = match task.handle.await {
            Ok(state) => state,
            Err(e) => {
                warn!("poll task ended abnormally ({}); recovering last snapshot", e);
                self.snapshot().state.clone()
            }
        };
        info!("monitoring stopped at pick {}", state.current_pick());
        self.parked = Some(state);
        self.ctx
            .health_tx
            .send_modify(|h| h.status = ConnectionStatus::Disconnected);
    }

    /// Replace the poll loop with a fresh one over the same draft history.
    pub async fn restart_monitoring(&mut self) {
        self.stop_monitoring().await;
        let state = match self.parked.take() {
            Some(state) => state,
            None => self.snapshot().state.clone(),
        };
        info!("monitoring restarted at pick {}", state.current_pick());
        self.spawn(state);
    }
}

impl Drop for DraftMonitor {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.shutdown.send(());
        }
    }
}
