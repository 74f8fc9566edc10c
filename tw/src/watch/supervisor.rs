//! Supervisor - polls the store and keeps one watcher per watched item

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::WatchRegistry;
use crate::state::StateError;
use crate::store::Store;

/// Configuration for the Supervisor
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// How often the store is polled
    pub poll_interval: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// What one sync pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub started: usize,
    pub replaced: usize,
    pub cancelled: usize,
}

impl SyncReport {
    pub fn is_empty(&self) -> bool {
        self.started == 0 && self.replaced == 0 && self.cancelled == 0
    }
}

pub struct Supervisor {
    config: SupervisorConfig,
    store: Arc<dyn Store>,
    registry: WatchRegistry,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig, store: Arc<dyn Store>, registry: WatchRegistry) -> Self {
        debug!(?config.poll_interval, "Supervisor::new: called");
        Self {
            config,
            store,
            registry,
        }
    }

    pub fn registry(&self) -> &WatchRegistry {
        &self.registry
    }

    /// Bring the watcher set in line with the store once
    pub async fn sync_once(&mut self) -> Result<SyncReport, StateError> {
        let items = self.store.list_items().await?;
        let wanted: HashMap<_, _> = items
            .iter()
            .filter(|item| item.is_watched())
            .map(|item| (item.id, item.watch_interval_minutes))
            .collect();

        let mut report = SyncReport::default();
        for id in self.registry.ids() {
            if !wanted.contains_key(&id) && self.registry.cancel(id) {
                report.cancelled += 1;
            }
        }
        for (&id, &minutes) in &wanted {
            let existing = self.registry.interval_of(id);
            if self.registry.start(id, minutes) {
                match existing {
                    Some(_) => report.replaced += 1,
                    None => report.started += 1,
                }
            }
        }

        if !report.is_empty() {
            info!(?report, watchers = self.registry.len(), "sync_once: watchers changed");
        }
        Ok(report)
    }

    /// Poll until `shutdown` fires or the store can no longer be read
    ///
    /// Every watcher is stopped before this returns.
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<(), StateError> {
        info!(poll_interval = ?self.config.poll_interval, "Supervisor starting");
        let mut ticker = time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let result = loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break Ok(()),
                _ = ticker.tick() => {}
            }
            if let Err(e) = self.sync_once().await {
                error!(error = %e, "Supervisor: store unreadable, stopping");
                break Err(e);
            }
        };

        self.registry.shutdown().await;
        info!("Supervisor stopped");
        result
    }
}
