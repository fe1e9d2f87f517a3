// draftline entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file; stdout carries the JSON feed)
// 2. Load config
// 3. Load projections
// 4. Connect to the draft and print the first snapshot
// 5. Print one JSON line per update until the draft completes or Ctrl+C
// 6. Stop the poll loop and flush pending output

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};

use draftline::host::sleeper::SleeperClient;
use draftline::monitor::DraftMonitor;
use draftline::poller::ConnectionStatus;
use draftline_core::config;
use draftline_core::engine::EngineSnapshot;
use draftline_core::projections;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Tracing
    init_tracing()?;
    info!("draftline starting up");

    // 2. Config
    let config = config::load_config().context("failed to load configuration")?;
    let draft_id = std::env::args()
        .nth(1)
        .or_else(|| config.league.draft_id.clone())
        .context("no draft id: pass one as the first argument or set league.draft_id")?;
    info!(
        "Config loaded: league={}, {} teams, {} rounds, polling every {}s",
        config.league.name,
        config.league.num_teams,
        config.league.rounds,
        config.polling.interval_secs
    );

    // 3. Projections
    let projections_path = Path::new(&config.data_paths.projections);
    let table = projections::load_projections(projections_path).with_context(|| {
        format!("failed to load projections from {}", projections_path.display())
    })?;
    info!("Loaded {} player projections", table.len());

    // 4. Connect
    let client = SleeperClient::from_config(&config).context("failed to build draft host client")?;
    let mut monitor = DraftMonitor::connect(Arc::new(client), &draft_id, Arc::new(table), &config)
        .await
        .with_context(|| format!("failed to connect to draft {draft_id}"))?;
    print_snapshot(&monitor.snapshot());

    // 5. Feed
    let printer = monitor.on_update(|snapshot| print_snapshot(&snapshot));
    let mut health = monitor.watch_health();
    if !monitor.connection_status().draft_complete {
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl+C received, shutting down");
                    break;
                }
                changed = health.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let h = health.borrow_and_update().clone();
                    match h.status {
                        ConnectionStatus::Degraded => warn!(
                            "connection degraded after {} failures: {}",
                            h.consecutive_failures,
                            h.last_error.as_deref().unwrap_or("unknown error")
                        ),
                        ConnectionStatus::Live => info!("{} picks observed", h.picks_observed),
                        ConnectionStatus::Disconnected => {}
                    }
                    if h.draft_complete {
                        info!("draft complete");
                        break;
                    }
                }
            }
        }
    }

    // 6. Cleanup: stop polling, then let the printer drain what is buffered
    monitor.stop_monitoring().await;
    drop(monitor);
    let _ = tokio::time::timeout(Duration::from_secs(2), printer).await;

    info!("draftline shut down cleanly");
    Ok(())
}

/// Write one snapshot as a single JSON line on stdout.
fn print_snapshot(snapshot: &EngineSnapshot) {
    match serde_json::to_string(snapshot) {
        Ok(line) => {
            let mut out = std::io::stdout().lock();
            if let Err(e) = writeln!(out, "{line}").and_then(|_| out.flush()) {
                error!("failed to write snapshot: {}", e);
            }
        }
        Err(e) => error!("failed to serialize snapshot: {}", e),
    }
}

/// Initialize tracing to log to a file (stdout is reserved for the feed).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("draftline.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("draftline=info,draftline_core=info,warn")),
        )
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
