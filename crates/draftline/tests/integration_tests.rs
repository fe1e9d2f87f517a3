// Integration tests for draftline.
//
// These drive `DraftMonitor` end to end against a scripted in-memory draft
// host: connection, polling, failure handling, update delivery and the
// stop/restart lifecycle. Time is paused so poll intervals and backoff run
// instantly and deterministically.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use draftline::host::{DraftHost, DraftMetadata, HostError, RemotePick};
use draftline::monitor::{DraftMonitor, MonitorError};
use draftline::poller::{ConnectionStatus, Health};
use draftline_core::config::Config;
use draftline_core::draft::pick::Position;
use draftline_core::engine::Alert;
use draftline_core::projections::{load_projections, ProjectionTable};

// ===========================================================================
// Test helpers
// ===========================================================================

const FIXTURES: &str = "tests/fixtures";

fn fixture(name: &str) -> String {
    std::fs::read_to_string(Path::new(FIXTURES).join(name)).unwrap()
}

fn projections() -> Arc<ProjectionTable> {
    Arc::new(load_projections(&Path::new(FIXTURES).join("projections.csv")).unwrap())
}

fn config() -> Config {
    let mut config = Config::default();
    config.league.my_slot = Some(1);
    config
}

/// One scripted response to `fetch_picks`.
enum Step {
    /// Make the first `n` fixture picks visible and return them.
    Reveal(usize),
    Timeout,
    Malformed,
}

/// Draft host that replays the fixture draft a few picks at a time.
///
/// Once the script runs out it keeps returning the currently visible picks.
/// Metadata can be edited between polls.
struct ScriptedHost {
    draft: Mutex<Option<DraftMetadata>>,
    picks: Vec<RemotePick>,
    visible: Mutex<usize>,
    script: Mutex<VecDeque<Step>>,
    pick_fetches: AtomicUsize,
    draft_fetches: AtomicUsize,
}

impl ScriptedHost {
    fn new(visible: usize, script: Vec<Step>) -> Self {
        ScriptedHost {
            draft: Mutex::new(Some(serde_json::from_str(&fixture("draft.json")).unwrap())),
            picks: serde_json::from_str(&fixture("picks.json")).unwrap(),
            visible: Mutex::new(visible),
            script: Mutex::new(script.into()),
            pick_fetches: AtomicUsize::new(0),
            draft_fetches: AtomicUsize::new(0),
        }
    }

    fn missing() -> Self {
        let host = ScriptedHost::new(0, Vec::new());
        host.edit_draft(|draft| *draft = None);
        host
    }

    fn edit_draft(&self, f: impl FnOnce(&mut Option<DraftMetadata>)) {
        let mut draft = self.draft.lock().unwrap();
        f(&mut *draft);
    }

    fn push(&self, step: Step) {
        self.script.lock().unwrap().push_back(step);
    }

    fn fetches(&self) -> usize {
        self.pick_fetches.load(Ordering::SeqCst)
    }

    fn metadata_fetches(&self) -> usize {
        self.draft_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DraftHost for ScriptedHost {
    async fn fetch_draft(&self, draft_id: &str) -> Result<DraftMetadata, HostError> {
        self.draft_fetches.fetch_add(1, Ordering::SeqCst);
        self.draft
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| HostError::NotFound(draft_id.to_string()))
    }

    async fn fetch_picks(&self, _draft_id: &str) -> Result<Vec<RemotePick>, HostError> {
        self.pick_fetches.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().unwrap().pop_front();
        let mut visible = self.visible.lock().unwrap();
        match step {
            Some(Step::Timeout) => return Err(HostError::Timeout),
            Some(Step::Malformed) => {
                return Err(HostError::Malformed("expected an array".into()))
            }
            Some(Step::Reveal(n)) => *visible = n.min(self.picks.len()),
            None => {}
        }
        Ok(self.picks[..*visible].to_vec())
    }
}

async fn connect(host: Arc<ScriptedHost>) -> DraftMonitor {
    DraftMonitor::connect(host, "1001", projections(), &config())
        .await
        .unwrap()
}

/// Wait (in paused time) until the health record satisfies `pred`.
async fn wait_for_health(rx: &mut watch::Receiver<Health>, pred: impl Fn(&Health) -> bool) -> Health {
    tokio::time::timeout(Duration::from_secs(3600), async {
        loop {
            {
                let health = rx.borrow_and_update();
                if pred(&*health) {
                    return health.clone();
                }
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .expect("health condition never reached")
}

// ===========================================================================
// Connection
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn connect_loads_existing_picks() {
    let host = Arc::new(ScriptedHost::new(5, Vec::new()));
    let monitor = connect(host.clone()).await;

    let snapshot = monitor.snapshot();
    assert_eq!(snapshot.draft_id, "1001");
    assert_eq!(snapshot.pick_count, 5);
    assert_eq!(snapshot.current_pick, 6);
    // Pick 6 is round 2, slot 3 in a 4-team snake.
    assert_eq!(snapshot.on_the_clock, Some(3));
    assert_eq!(snapshot.focus_team, Some(1));
    assert_eq!(snapshot.state.settings().num_teams, 4);
    assert_eq!(snapshot.state.settings().rounds, 3);

    let health = monitor.connection_status();
    assert_eq!(health.status, ConnectionStatus::Live);
    assert_eq!(health.picks_observed, 5);
    assert!(health.last_success.is_some());
    assert!(monitor.is_running());

    // 30 players, 5 drafted.
    let recs = monitor.recommendations(1);
    assert_eq!(recs.len(), 25);
    for drafted in ["1001", "1002", "1003", "1004", "1005"] {
        assert!(recs.iter().all(|r| r.player_id != drafted));
    }
    assert_eq!(recs[0].rank, 1);
    assert!(recs[0].rationale.is_some());

    assert_eq!(monitor.replacement_levels().len(), Position::ALL.len());
    assert_eq!(monitor.market_signals().len(), Position::ALL.len());
    assert_eq!(host.fetches(), 1);
}

#[tokio::test(start_paused = true)]
async fn draft_not_found_is_fatal_at_connect() {
    let host = Arc::new(ScriptedHost::missing());
    let result = DraftMonitor::connect(host.clone(), "nope", projections(), &config()).await;
    assert!(matches!(result, Err(MonitorError::DraftNotFound(id)) if id == "nope"));
    // No loop was started, so nobody ever asked for picks.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(host.fetches(), 0);
}

#[tokio::test(start_paused = true)]
async fn auction_draft_is_rejected() {
    let host = ScriptedHost::new(0, Vec::new());
    host.edit_draft(|draft| {
        if let Some(draft) = draft.as_mut() {
            draft.draft_type = "auction".into();
        }
    });
    let result = DraftMonitor::connect(Arc::new(host), "1001", projections(), &config()).await;
    assert!(matches!(result, Err(MonitorError::Unsupported(_))));
}

#[tokio::test(start_paused = true)]
async fn completed_draft_is_loaded_but_not_polled() {
    let host = Arc::new(ScriptedHost::new(12, Vec::new()));
    let monitor = connect(host.clone()).await;
    assert!(!monitor.is_running());
    assert!(monitor.connection_status().draft_complete);
    assert!(monitor.snapshot().draft_complete);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(host.fetches(), 1);
}

// ===========================================================================
// Polling
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn new_picks_publish_one_snapshot_per_batch() {
    let host = Arc::new(ScriptedHost::new(2, vec![Step::Reveal(5), Step::Reveal(8)]));
    let monitor = connect(host.clone()).await;
    let mut updates = monitor.subscribe();

    let first = updates.recv().await.unwrap();
    assert_eq!(first.pick_count, 5);
    let second = updates.recv().await.unwrap();
    assert_eq!(second.pick_count, 8);
    assert_eq!(second.current_pick, 9);
    assert_eq!(monitor.snapshot().pick_count, 8);

    // Snapshot internals all describe the same pick.
    assert_eq!(second.market.current_pick, second.current_pick);
    assert_eq!(second.state.pick_count(), second.pick_count);
}

#[tokio::test(start_paused = true)]
async fn polls_without_new_picks_publish_nothing() {
    let host = Arc::new(ScriptedHost::new(3, Vec::new()));
    let monitor = connect(host.clone()).await;
    let mut updates = monitor.subscribe();

    tokio::time::sleep(Duration::from_secs(26)).await;
    assert!(host.fetches() >= 5);
    assert!(updates.try_recv().is_err());
    assert_eq!(monitor.snapshot().pick_count, 3);
}

#[tokio::test(start_paused = true)]
async fn three_timeouts_degrade_without_touching_state() {
    let host = Arc::new(ScriptedHost::new(
        5,
        vec![Step::Timeout, Step::Timeout, Step::Timeout],
    ));
    let monitor = connect(host.clone()).await;
    let mut updates = monitor.subscribe();
    let mut health = monitor.watch_health();

    let after_two = wait_for_health(&mut health, |h| h.consecutive_failures == 2).await;
    assert_eq!(after_two.status, ConnectionStatus::Live);

    let degraded = wait_for_health(&mut health, |h| h.status == ConnectionStatus::Degraded).await;
    assert_eq!(degraded.consecutive_failures, 3);
    assert_eq!(degraded.picks_observed, 5);
    assert_eq!(degraded.last_error.as_deref(), Some("request timed out"));
    assert_eq!(monitor.snapshot().pick_count, 5);
    assert!(updates.try_recv().is_err());

    // Next poll succeeds (script exhausted) and the connection recovers.
    host.push(Step::Reveal(7));
    let live = wait_for_health(&mut health, |h| h.status == ConnectionStatus::Live).await;
    assert_eq!(live.consecutive_failures, 0);
    assert_eq!(live.picks_observed, 7);
    assert_eq!(updates.recv().await.unwrap().pick_count, 7);
}

#[tokio::test(start_paused = true)]
async fn failures_back_off_exponentially() {
    let host = Arc::new(ScriptedHost::new(
        1,
        vec![Step::Timeout, Step::Timeout, Step::Timeout],
    ));
    let monitor = connect(host.clone()).await;
    let start = tokio::time::Instant::now();
    let mut health = monitor.watch_health();

    wait_for_health(&mut health, |h| h.consecutive_failures == 3).await;
    // Polls at 5s, then 5+10, then 5+10+20.
    assert_eq!(start.elapsed(), Duration::from_secs(35));
    assert_eq!(host.fetches(), 4);
}

#[tokio::test(start_paused = true)]
async fn malformed_response_is_transient() {
    let host = Arc::new(ScriptedHost::new(4, vec![Step::Malformed, Step::Reveal(6)]));
    let monitor = connect(host.clone()).await;
    let mut health = monitor.watch_health();

    let failed = wait_for_health(&mut health, |h| h.consecutive_failures == 1).await;
    assert_eq!(failed.status, ConnectionStatus::Live);
    assert!(failed.last_error.unwrap().contains("malformed"));
    assert_eq!(monitor.snapshot().pick_count, 4);

    let recovered = wait_for_health(&mut health, |h| h.picks_observed == 6).await;
    assert_eq!(recovered.consecutive_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn observed_pick_count_is_monotonic() {
    // The host briefly serves a shorter list; known picks are never dropped.
    let host = Arc::new(ScriptedHost::new(
        4,
        vec![Step::Reveal(8), Step::Reveal(6), Step::Reveal(10)],
    ));
    let monitor = connect(host.clone()).await;
    let mut health = monitor.watch_health();

    let mut seen = vec![monitor.connection_status().picks_observed];
    let mut snapshot_counts = vec![monitor.snapshot().pick_count];
    while *seen.last().unwrap() < 10 {
        let h = wait_for_health(&mut health, |_| true).await;
        seen.push(h.picks_observed);
        snapshot_counts.push(monitor.snapshot().pick_count);
        health.changed().await.unwrap();
    }
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
    assert!(snapshot_counts.windows(2).all(|w| w[0] <= w[1]), "{snapshot_counts:?}");
    assert_eq!(monitor.snapshot().pick_count, 10);
}

#[tokio::test(start_paused = true)]
async fn loop_stops_when_draft_completes() {
    let host = Arc::new(ScriptedHost::new(10, vec![Step::Reveal(12)]));
    let monitor = connect(host.clone()).await;
    let mut health = monitor.watch_health();

    let done = wait_for_health(&mut health, |h| h.draft_complete).await;
    assert_eq!(done.picks_observed, 12);
    let fetches = host.fetches();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(host.fetches(), fetches);
    assert!(!monitor.is_running());
    assert!(monitor.snapshot().draft_complete);
}

#[tokio::test(start_paused = true)]
async fn host_closing_the_draft_ends_the_loop() {
    let host = Arc::new(ScriptedHost::new(5, Vec::new()));
    let monitor = connect(host.clone()).await;
    let mut updates = monitor.subscribe();
    let mut health = monitor.watch_health();
    assert_eq!(host.metadata_fetches(), 1);

    host.edit_draft(|draft| {
        if let Some(draft) = draft.as_mut() {
            draft.status = "complete".into();
        }
    });

    let done = wait_for_health(&mut health, |h| h.draft_complete).await;
    assert_eq!(done.status, ConnectionStatus::Live);
    assert_eq!(done.picks_observed, 5);

    // One snapshot announces the close even though no pick arrived.
    let closed = updates.recv().await.unwrap();
    assert!(closed.draft_complete);
    assert_eq!(closed.pick_count, 5);
    assert_eq!(closed.on_the_clock, None);

    let fetches = (host.metadata_fetches(), host.fetches());
    assert_eq!(fetches, (2, 2));
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!((host.metadata_fetches(), host.fetches()), fetches);
    assert!(!monitor.is_running());
}

#[tokio::test(start_paused = true)]
async fn slot_assignments_are_refreshed_while_polling() {
    // Slots not assigned yet: team id defaults to the slot number.
    let host = Arc::new(ScriptedHost::new(0, Vec::new()));
    host.edit_draft(|draft| {
        if let Some(draft) = draft.as_mut() {
            draft.status = "pre_draft".into();
            draft.slot_to_roster_id = None;
        }
    });
    let monitor = connect(host.clone()).await;
    let mut updates = monitor.subscribe();
    assert_eq!(monitor.focus_team(), Some(1));

    host.edit_draft(|draft| {
        if let Some(draft) = draft.as_mut() {
            draft.status = "drafting".into();
            draft.slot_to_roster_id = Some(
                [("1", 3), ("2", 4), ("3", 1), ("4", 2)]
                    .into_iter()
                    .map(|(slot, roster)| (slot.to_string(), Some(roster)))
                    .collect(),
            );
        }
    });

    let remapped = updates.recv().await.unwrap();
    assert_eq!(remapped.pick_count, 0);
    assert_eq!(remapped.focus_team, Some(3));
    assert_eq!(remapped.on_the_clock, Some(3));
    assert!(!remapped.recommendations.is_empty());
    assert_eq!(monitor.focus_team(), Some(3));

    // The first pick (slot 1) now lands on team 3.
    host.push(Step::Reveal(1));
    let first = updates.recv().await.unwrap();
    assert_eq!(first.pick_count, 1);
    assert_eq!(first.state.current_roster(3).map(|r| r.len()), Some(1));
    assert!(first.state.current_roster(1).is_none());
}

// ===========================================================================
// Data quality
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn unmapped_pick_is_counted_and_flagged() {
    let host = Arc::new(ScriptedHost::new(8, Vec::new()));
    let monitor = connect(host).await;
    let snapshot = monitor.snapshot();

    // Pick 6 (team 3) is a player missing from the projection table.
    assert_eq!(snapshot.pick_count, 8);
    assert_eq!(snapshot.warnings.len(), 1);
    assert!(snapshot.warnings[0].contains("Rookie Unknown"));
    assert_eq!(snapshot.state.drafted_count(Position::WideReceiver), 3);
    assert_eq!(snapshot.state.remaining_players().len(), 30 - 7);

    // Focus team 1 owns none of the unmapped picks; team 3 does.
    assert!(!snapshot
        .alerts
        .iter()
        .any(|a| matches!(a, Alert::DataQuality { .. })));
    let for_three = monitor.recommendations(3);
    assert_eq!(for_three.len(), 23);
}

// ===========================================================================
// Callbacks and lifecycle
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn on_update_runs_off_the_poll_loop() {
    let host = Arc::new(ScriptedHost::new(0, vec![Step::Reveal(3), Step::Reveal(6)]));
    let monitor = connect(host.clone()).await;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _callback = monitor.on_update(move |snapshot| {
        let _ = tx.send(snapshot.pick_count);
    });

    assert_eq!(rx.recv().await, Some(3));
    assert_eq!(rx.recv().await, Some(6));
}

#[tokio::test(start_paused = true)]
async fn stop_and_restart_keep_history() {
    let host = Arc::new(ScriptedHost::new(2, vec![Step::Reveal(6)]));
    let mut monitor = connect(host.clone()).await;
    let mut health = monitor.watch_health();
    wait_for_health(&mut health, |h| h.picks_observed == 6).await;

    monitor.stop_monitoring().await;
    assert!(!monitor.is_running());
    assert_eq!(monitor.connection_status().status, ConnectionStatus::Disconnected);
    let fetches = host.fetches();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(host.fetches(), fetches);

    // Stopping twice is harmless.
    monitor.stop_monitoring().await;

    host.push(Step::Reveal(9));
    monitor.restart_monitoring().await;
    assert!(monitor.is_running());
    let resumed = wait_for_health(&mut health, |h| h.picks_observed == 9).await;
    assert_eq!(resumed.status, ConnectionStatus::Live);

    let snapshot = monitor.snapshot();
    assert_eq!(snapshot.pick_count, 9);
    // Picks from before the restart are still on the books.
    assert_eq!(snapshot.state.picks().next().map(|p| p.pick_number), Some(1));
    assert_eq!(snapshot.state.current_roster(1).map(|r| r.len()), Some(3));
}

#[tokio::test(start_paused = true)]
async fn restart_while_running_replaces_the_loop() {
    let host = Arc::new(ScriptedHost::new(4, Vec::new()));
    let mut monitor = connect(host.clone()).await;
    tokio::time::sleep(Duration::from_secs(7)).await;
    assert_eq!(host.fetches(), 2);

    monitor.restart_monitoring().await;
    assert!(monitor.is_running());
    assert_eq!(monitor.snapshot().pick_count, 4);

    // The replacement loop starts a fresh interval.
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(host.fetches(), 3);
}
