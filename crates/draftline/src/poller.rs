// Background poll loop.
//
// The loop owns the `DraftState` for as long as it runs. Each cycle fetches
// the draft metadata and the remote pick list, applies every new pick as one
// batch, recomputes and publishes a snapshot. Failures never leave the loop: they only move the
// health record.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, oneshot, watch};
use tracing::{debug, info, warn};

use draftline_core::config::{PollingConfig, StrategyConfig};
use draftline_core::draft::state::DraftState;
use draftline_core::engine::{self, EngineSnapshot};

use crate::host::{self, DraftHost, DraftMetadata, HostError};

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    /// Last poll succeeded.
    Live,
    /// `degraded_after` or more consecutive polls failed; data may be stale.
    Degraded,
    /// No poll loop is running.
    Disconnected,
}

/// Connection health as seen by callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Health {
    pub status: ConnectionStatus,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    /// Highest pick count observed. Never decreases.
    pub picks_observed: usize,
    pub draft_complete: bool,
}

impl Health {
    /// Health right after a successful connection.
    pub fn connected(picks_observed: usize, draft_complete: bool) -> Self {
        Health {
            status: ConnectionStatus::Live,
            last_success: Some(Utc::now()),
            last_error: None,
            consecutive_failures: 0,
            picks_observed,
            draft_complete,
        }
    }

    pub fn record_success(&mut self, picks_observed: usize, draft_complete: bool) {
        self.status = ConnectionStatus::Live;
        self.last_success = Some(Utc::now());
        self.last_error = None;
        self.consecutive_failures = 0;
        self.picks_observed = self.picks_observed.max(picks_observed);
        self.draft_complete = self.draft_complete || draft_complete;
    }

    pub fn record_failure(&mut self, err: &HostError, degraded_after: u32) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_error = Some(err.to_string());
        if self.consecutive_failures >= degraded_after.max(1) {
            self.status = ConnectionStatus::Degraded;
        }
    }
}

/// Delay before the next poll: `interval × 2^failures`, capped at
/// `max_backoff_secs` (never below the base interval).
pub fn backoff(polling: &PollingConfig, failures: u32) -> Duration {
    let factor = 1u64.checked_shl(failures.min(32)).unwrap_or(u64::MAX);
    let cap = polling.max_backoff_secs.max(polling.interval_secs);
    Duration::from_secs(polling.interval_secs.saturating_mul(factor).min(cap))
}

// ---------------------------------------------------------------------------
// Poll context
// ---------------------------------------------------------------------------

/// Everything a poll loop needs besides the state it owns.
#[derive(Clone)]
pub struct PollContext {
    pub host: Arc<dyn DraftHost>,
    pub strategy: Arc<StrategyConfig>,
    pub polling: PollingConfig,
    /// Draft slot whose team is ranked each cycle. The team behind it can
    /// change while the host is still assigning slots.
    pub focus_slot: Option<u32>,
    pub snapshot_tx: watch::Sender<Arc<EngineSnapshot>>,
    pub updates_tx: broadcast::Sender<Arc<EngineSnapshot>>,
    pub health_tx: watch::Sender<Health>,
}

impl PollContext {
    pub fn focus_team(&self, state: &DraftState) -> Option<u32> {
        self.focus_slot
            .map(|slot| state.settings().team_for_slot(slot))
    }

    fn publish(&self, snapshot: Arc<EngineSnapshot>) {
        self.snapshot_tx.send_replace(snapshot.clone());
        // No subscribers is fine.
        let _ = self.updates_tx.send(snapshot);
    }
}

// ---------------------------------------------------------------------------
// Poll cycle
// ---------------------------------------------------------------------------

/// Outcome of one successful poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleOutcome {
    pub applied: usize,
    pub complete: bool,
}

/// Apply fetched metadata and pick list and, when anything changed,
/// recompute and publish. Synchronous so no reader ever sees a half-applied
/// batch.
pub fn apply_cycle(
    state: &mut DraftState,
    metadata: &DraftMetadata,
    remote: &[host::RemotePick],
    ctx: &PollContext,
) -> CycleOutcome {
    let remote_settings = metadata.league_settings(state.settings());
    let remapped = state.set_slot_map(remote_settings.slot_to_team);
    if remapped {
        info!("draft {}: slot assignments updated", state.draft_id);
    }

    let picks = host::to_picks(remote, state.settings(), Utc::now());
    let fresh = state.new_picks(picks);
    for pick in &fresh {
        info!(
            "pick {} (round {}, team {}): {}",
            pick.pick_number,
            pick.round,
            pick.team_id,
            pick.player_name
                .as_deref()
                .or(pick.player_id.as_deref())
                .unwrap_or("<empty>")
        );
    }
    let applied = state.apply_batch(fresh);

    let closed = metadata.is_complete() && state.mark_complete();
    if closed {
        info!(
            "draft {} closed by host at {} picks",
            state.draft_id,
            state.pick_count()
        );
    }

    if applied > 0 || remapped || closed {
        let snapshot = engine::recompute(state, &ctx.strategy, ctx.focus_team(state));
        ctx.publish(Arc::new(snapshot));
    }
    CycleOutcome {
        applied,
        complete: state.is_complete(),
    }
}

/// Metadata first, then picks. Either failing fails the cycle.
async fn fetch_cycle(
    host: &dyn DraftHost,
    draft_id: &str,
) -> Result<(DraftMetadata, Vec<host::RemotePick>), HostError> {
    let metadata = host.fetch_draft(draft_id).await?;
    let picks = host.fetch_picks(draft_id).await?;
    Ok((metadata, picks))
}

/// Run the poll loop until `shutdown` fires (or its sender is dropped) or
/// the draft completes. Returns the state so it can be handed to a new loop.
pub async fn run(
    mut state: DraftState,
    ctx: PollContext,
    mut shutdown: oneshot::Receiver<()>,
) -> DraftState {
    info!(
        "poll loop started for draft {} at pick {} (every {}s)",
        state.draft_id,
        state.current_pick(),
        ctx.polling.interval_secs
    );
    let mut failures: u32 = 0;

    loop {
        let delay = backoff(&ctx.polling, failures);
        tokio::select! {
            _ = &mut shutdown => {
                info!("poll loop stopping");
                break;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        let result = tokio::select! {
            _ = &mut shutdown => {
                info!("poll loop stopping mid-request");
                break;
            }
            result = fetch_cycle(ctx.host.as_ref(), &state.draft_id) => result,
        };

        match result {
            Ok((metadata, remote)) => {
                let outcome = apply_cycle(&mut state, &metadata, &remote, &ctx);
                if failures > 0 {
                    info!("poll recovered after {} failure(s)", failures);
                }
                failures = 0;
                let picks = state.pick_count();
                ctx.health_tx
                    .send_modify(|h| h.record_success(picks, outcome.complete));
                debug!("poll ok: {} new pick(s), {} total", outcome.applied, picks);
                if outcome.complete {
                    info!("draft {} complete after {} picks", state.draft_id, picks);
                    break;
                }
            }
            Err(err) => {
                failures = failures.saturating_add(1);
                warn!(
                    "poll failed ({} in a row, transient={}): {}",
                    failures,
                    err.is_transient(),
                    err
                );
                let degraded_after = ctx.polling.degraded_after;
                ctx.health_tx
                    .send_modify(|h| h.record_failure(&err, degraded_after));
            }
        }
    }

    state
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
