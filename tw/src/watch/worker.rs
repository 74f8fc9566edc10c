//! One watcher task

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::ItemId;
use crate::reconcile::{ItemReconciler, ReconcileOutcome};

/// Spawn a watcher for `id`
///
/// If `predecessor` is given (a cancelled watcher for the same id) it is
/// awaited first, so an in-flight tick finishes before this one starts. The
/// first tick runs immediately. Cancellation is checked before every tick;
/// a tick already running is never interrupted.
pub fn spawn_worker(
    id: ItemId,
    interval: Duration,
    reconciler: Arc<dyn ItemReconciler>,
    token: CancellationToken,
    predecessor: Option<JoinHandle<()>>,
) -> JoinHandle<()> {
    debug!(id, ?interval, "spawn_worker: called");
    tokio::spawn(async move {
        if let Some(handle) = predecessor {
            if let Err(e) = handle.await {
                warn!(id, error = %e, "watcher: predecessor task failed");
            }
        }

        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match reconciler.reconcile(id).await {
                Ok(ReconcileOutcome::Unchanged) => debug!(id, "watcher: unchanged"),
                Ok(ReconcileOutcome::Gone) => debug!(id, "watcher: item gone, waiting for supervisor"),
                Ok(outcome) => info!(id, ?outcome, "watcher: tick finished"),
                Err(e) => warn!(id, class = e.class().as_str(), error = %e, "watcher: tick failed"),
            }
        }
        debug!(id, "watcher: stopped");
    })
}
