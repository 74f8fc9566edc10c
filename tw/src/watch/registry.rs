//! WatchRegistry - at most one live watcher per item id

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::worker::spawn_worker;
use crate::domain::ItemId;
use crate::reconcile::ItemReconciler;

struct Watcher {
    interval_minutes: u32,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct WatchRegistry {
    watchers: HashMap<ItemId, Watcher>,
    /// Cancelled watchers whose last tick may still be running
    draining: HashMap<ItemId, JoinHandle<()>>,
    reconciler: Arc<dyn ItemReconciler>,
    /// Parent of every watcher token
    root: CancellationToken,
}

impl WatchRegistry {
    pub fn new(reconciler: Arc<dyn ItemReconciler>, root: CancellationToken) -> Self {
        debug!("WatchRegistry::new: called");
        Self {
            watchers: HashMap::new(),
            draining: HashMap::new(),
            reconciler,
            root,
        }
    }

    /// Create a watcher for `id`, or replace one with a different interval
    ///
    /// Returns false when a watcher with this interval already exists. A
    /// replaced watcher is cancelled and the new one waits for it to stop, as
    /// it does for a watcher of the same id that was cancelled earlier.
    pub fn start(&mut self, id: ItemId, interval_minutes: u32) -> bool {
        debug!(id, interval_minutes, "start: called");
        if interval_minutes == 0 {
            return self.cancel(id);
        }
        self.prune_draining();

        let predecessor = match self.watchers.remove(&id) {
            Some(old) if old.interval_minutes == interval_minutes => {
                self.watchers.insert(id, old);
                return false;
            }
            Some(old) => {
                info!(id, from = old.interval_minutes, to = interval_minutes, "start: replacing watcher");
                old.token.cancel();
                Some(old.handle)
            }
            None => {
                info!(id, interval_minutes, "start: new watcher");
                self.draining.remove(&id)
            }
        };

        let token = self.root.child_token();
        let handle = spawn_worker(
            id,
            Duration::from_secs(60 * u64::from(interval_minutes)),
            self.reconciler.clone(),
            token.clone(),
            predecessor,
        );
        self.watchers.insert(
            id,
            Watcher {
                interval_minutes,
                token,
                handle,
            },
        );
        true
    }

    /// Cancel the watcher for `id`; its in-flight tick, if any, finishes
    pub fn cancel(&mut self, id: ItemId) -> bool {
        self.prune_draining();
        match self.watchers.remove(&id) {
            Some(watcher) => {
                info!(id, "cancel: stopping watcher");
                watcher.token.cancel();
                self.draining.insert(id, watcher.handle);
                true
            }
            None => false,
        }
    }

    fn prune_draining(&mut self) {
        self.draining.retain(|_, handle| !handle.is_finished());
    }

    pub fn interval_of(&self, id: ItemId) -> Option<u32> {
        self.watchers.get(&id).map(|w| w.interval_minutes)
    }

    pub fn ids(&self) -> Vec<ItemId> {
        self.watchers.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.watchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watchers.is_empty()
    }

    /// Cancel every watcher and wait for all of them, cancelled ones included, to stop
    pub async fn shutdown(&mut self) {
        debug!(count = self.watchers.len(), draining = self.draining.len(), "shutdown: called");
        for watcher in self.watchers.values() {
            watcher.token.cancel();
        }
        let (ids, handles): (Vec<_>, Vec<_>) = self
            .watchers
            .drain()
            .map(|(id, w)| (id, w.handle))
            .chain(self.draining.drain())
            .unzip();
        for (id, result) in ids.into_iter().zip(join_all(handles).await) {
            if let Err(e) = result {
                warn!(id, error = %e, "shutdown: watcher task failed");
            }
        }
    }
}
