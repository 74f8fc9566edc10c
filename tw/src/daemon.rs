//! Daemon wiring: builds every component from the config and runs until
//! a signal, an IPC `Shutdown`, or a fatal store error

use std::sync::Arc;
use std::time::Duration;

use eyre::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::events::StatusFeed;
use crate::ipc::{cleanup_socket, create_listener_at, serve};
use crate::notify::{NoopNotifier, Notifier, TelegramNotifier};
use crate::qbit::{DownloadClient, HttpQbitApi, QbitSession};
use crate::reconcile::Reconciler;
use crate::service::WatchService;
use crate::state::StateManager;
use crate::store::Store;
use crate::tracker::{KinozalTracker, RuTrackerTracker, TrackerRegistry, TrackerSettings};
use crate::watch::{Supervisor, SupervisorConfig, WatchRegistry};

/// Version reported over IPC
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build the tracker registry with every supported tracker
pub fn build_trackers(config: &Config) -> Result<TrackerRegistry> {
    let settings = TrackerSettings {
        user_agent: config.trackers.user_agent.clone(),
        timeout: config.trackers.timeout(),
        max_identity_attempts: config.trackers.max_identity_attempts,
    };
    let kinozal = &config.trackers.kinozal;
    let rutracker = &config.trackers.rutracker;
    Ok(TrackerRegistry::new()
        .with(Arc::new(
            KinozalTracker::new(&settings, &kinozal.username, &kinozal.password)
                .context("Failed to create kinozal client")?,
        ))
        .with(Arc::new(
            RuTrackerTracker::new(&settings, &rutracker.username, &rutracker.password)
                .context("Failed to create rutracker client")?,
        )))
}

fn build_notifier(config: &Config) -> Result<Arc<dyn Notifier>> {
    if !config.telegram.enabled() {
        info!("Telegram not configured, notifications disabled");
        return Ok(Arc::new(NoopNotifier));
    }
    let telegram = &config.telegram;
    let notifier = TelegramNotifier::new(&telegram.api_base, &telegram.token, &telegram.chat_id, Duration::from_secs(30))
        .context("Failed to create Telegram notifier")?;
    Ok(Arc::new(notifier))
}

/// Cancel `token` on SIGINT or SIGTERM
fn spawn_signal_handler(token: CancellationToken) -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => warn!("SIGINT received"),
            _ = sigterm.recv() => warn!("SIGTERM received"),
            _ = token.cancelled() => return,
        }
        token.cancel();
    });
    Ok(())
}

/// Run the daemon in the foreground
pub async fn run_daemon(config: &Config) -> Result<()> {
    config.validate()?;
    info!(version = VERSION, "Daemon starting");

    // ============================================================
    // INITIALIZATION
    // ============================================================

    let state = StateManager::spawn(&config.storage.db_path).context("Failed to open item store")?;
    info!(db_path = %config.storage.db_path.display(), "StateManager initialized");
    let store: Arc<dyn Store> = Arc::new(state.clone());

    let trackers = Arc::new(build_trackers(config)?);
    trackers.authenticate_all().await.context("Tracker login failed")?;
    info!(trackers = trackers.len(), "Trackers initialized");

    let api = HttpQbitApi::new(
        &config.qbittorrent.url,
        &config.qbittorrent.username,
        &config.qbittorrent.password,
        config.qbittorrent.timeout(),
    )
    .context("Failed to create qBittorrent client")?;
    let client: Arc<dyn DownloadClient> = Arc::new(QbitSession::new(api));
    info!(url = %config.qbittorrent.url, "Download client initialized");

    let feed = Arc::new(StatusFeed::default());
    let reconciler = Arc::new(Reconciler::new(
        trackers,
        client.clone(),
        store.clone(),
        build_notifier(config)?,
        feed,
        config.downloads.default_save_path.clone(),
    ));
    let service = Arc::new(WatchService::new(
        reconciler.clone(),
        store.clone(),
        client,
        config.downloads.remove_deletes_files,
    ));

    let shutdown = CancellationToken::new();
    let registry = WatchRegistry::new(reconciler, shutdown.child_token());
    let supervisor_config = SupervisorConfig {
        poll_interval: Duration::from_millis(config.supervisor.poll_interval_ms),
    };
    let mut supervisor = Supervisor::new(supervisor_config, store, registry);

    let (listener, socket_path) = create_listener_at(&config.ipc.socket_path)?;
    let server = tokio::spawn(serve(listener, service, shutdown.clone()));
    info!(socket = %socket_path.display(), "IPC server started");

    spawn_signal_handler(shutdown.clone())?;
    info!("Daemon running. Press Ctrl+C to stop.");

    // ============================================================
    // RUN
    // ============================================================

    let result = supervisor.run(shutdown.clone()).await;

    info!("Daemon shutting down...");
    shutdown.cancel();
    if let Err(e) = server.await {
        warn!(error = %e, "IPC server task failed");
    }
    cleanup_socket(&socket_path);
    state.shutdown().await;

    result.context("Item store became unreadable")
}
