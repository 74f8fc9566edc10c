//! Reconciler - brings the download client in line with one tracked item
//!
//! One call to [`ItemReconciler::reconcile`] is one watcher tick:
//!
//! ```text
//!   list entries ──auth error──▶ recover session, Skipped
//!        │
//!   identity present? ──no──▶ Add path ──▶ notify "added"
//!        │ yes
//!   fetch tracker identity ──equal──▶ Unchanged
//!        │ different
//!   Replace path: capture save path, remove old (keep files),
//!                 persist new identity, Add path, notify "updated"
//! ```
//!
//! Store writes use `update_item` (by id, never inserts), so a tick that
//! races a user removal cannot bring the item back.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{DownloadClientEntry, ItemId, RemoteIdentity, TrackedItem};
use crate::error::ErrorClass;
use crate::events::{StatusFeed, WatchEvent};
use crate::notify::{Notifier, NotifyKind};
use crate::qbit::{DownloadClient, DownloadClientError};
use crate::state::StateError;
use crate::store::Store;
use crate::tracker::{TrackerError, TrackerRegistry};

mod ingest;

pub use ingest::{IngestReport, IngestStatus, spawn_ingest};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("Download client error: {0}")]
    Client(#[from] DownloadClientError),

    #[error("Store error: {0}")]
    Store(#[from] StateError),

    #[error("Item {0} not found")]
    ItemNotFound(ItemId),

    #[error("Ingest worker stopped before answering")]
    WorkerLost,
}

impl ReconcileError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Tracker(e) => e.class(),
            Self::Client(e) => e.class(),
            Self::Store(e) => e.class(),
            Self::ItemNotFound(_) | Self::WorkerLost => ErrorClass::Permanent,
        }
    }
}

/// What one tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The item's torrent was missing and has been added
    Added { item: TrackedItem },
    /// The tracker published a new torrent; the old one was swapped out
    Replaced {
        item: TrackedItem,
        previous: RemoteIdentity,
    },
    Unchanged,
    /// The download client session was recovered; nothing else happened
    Skipped,
    /// The item was removed from the store
    Gone,
}

/// One reconciliation tick for one item
#[async_trait]
pub trait ItemReconciler: Send + Sync {
    async fn reconcile(&self, id: ItemId) -> Result<ReconcileOutcome, ReconcileError>;
}

pub struct Reconciler {
    trackers: Arc<TrackerRegistry>,
    client: Arc<dyn DownloadClient>,
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    feed: Arc<StatusFeed>,
    default_save_path: String,
}

impl Reconciler {
    pub fn new(
        trackers: Arc<TrackerRegistry>,
        client: Arc<dyn DownloadClient>,
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        feed: Arc<StatusFeed>,
        default_save_path: impl Into<String>,
    ) -> Self {
        Self {
            trackers,
            client,
            store,
            notifier,
            feed,
            default_save_path: default_save_path.into(),
        }
    }

    pub fn feed(&self) -> &Arc<StatusFeed> {
        &self.feed
    }

    pub fn default_save_path(&self) -> &str {
        &self.default_save_path
    }

    async fn reconcile_item(&self, item: &TrackedItem) -> Result<ReconcileOutcome, ReconcileError> {
        let entries = match self.client.list_entries().await {
            Ok(entries) => entries,
            Err(e) if e.is_auth() => {
                warn!(id = item.id, error = %e, "reconcile: download client session lost, recovering");
                if let Err(e) = self.client.recover().await {
                    warn!(error = %e, "reconcile: session recovery failed");
                }
                return Ok(ReconcileOutcome::Skipped);
            }
            Err(e) => return Err(e.into()),
        };

        if !contains(&entries, &item.remote_identity) {
            return self.add_path(item.clone(), &entries).await;
        }

        let page = self.trackers.fetch_identity(&item.source_url).await?;
        if page.identity == item.remote_identity {
            debug!(id = item.id, "reconcile: identity unchanged");
            return Ok(ReconcileOutcome::Unchanged);
        }

        self.replace_path(item, page.identity, page.display_name).await
    }

    async fn add_path(
        &self,
        mut item: TrackedItem,
        entries: &[DownloadClientEntry],
    ) -> Result<ReconcileOutcome, ReconcileError> {
        info!(id = item.id, identity = %item.remote_identity, "add_path: torrent missing from client");
        let page = self.trackers.fetch_identity(&item.source_url).await?;
        item.remote_identity = page.identity;
        item.display_name = page.display_name;
        if let Some(title) = self.fetch_title(&item.source_url).await {
            item.display_title = title;
        }
        if item.save_path.is_empty() {
            item.save_path = self.default_save_path.clone();
        }

        if contains(entries, &item.remote_identity) {
            debug!(id = item.id, "add_path: fresh identity already in client");
        } else {
            self.install(&item.source_url, &item.remote_identity, &item.save_path)
                .await?;
        }

        if !self.store.update_item(&item).await? {
            return Ok(ReconcileOutcome::Gone);
        }
        self.announce(NotifyKind::Added, &item).await;
        self.feed.emit(WatchEvent::ItemAdded { item: item.clone() });
        Ok(ReconcileOutcome::Added { item })
    }

    async fn replace_path(
        &self,
        old: &TrackedItem,
        identity: RemoteIdentity,
        display_name: String,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        info!(id = old.id, from = %old.remote_identity, to = %identity, "replace_path: identity drifted");
        let save_path = match self.client.save_path_of(&old.remote_identity).await {
            Ok(path) if !path.is_empty() => path,
            Ok(_) => self.fallback_save_path(old),
            Err(e) => {
                warn!(id = old.id, error = %e, "replace_path: save path lookup failed, using fallback");
                self.fallback_save_path(old)
            }
        };

        self.client.remove(&old.remote_identity, false).await?;

        let mut item = old.clone();
        item.remote_identity = identity;
        item.display_name = display_name;
        item.save_path = save_path;
        if let Some(title) = self.fetch_title(&item.source_url).await {
            item.display_title = title;
        }
        if !self.store.update_item(&item).await? {
            return Ok(ReconcileOutcome::Gone);
        }

        self.install(&item.source_url, &item.remote_identity, &item.save_path)
            .await?;
        self.announce(NotifyKind::Updated, &item).await;
        self.feed.emit(WatchEvent::ItemUpdated {
            item: item.clone(),
            previous_identity: old.remote_identity.clone(),
        });
        Ok(ReconcileOutcome::Replaced {
            item,
            previous: old.remote_identity.clone(),
        })
    }

    fn fallback_save_path(&self, item: &TrackedItem) -> String {
        if item.save_path.is_empty() {
            self.default_save_path.clone()
        } else {
            item.save_path.clone()
        }
    }

    /// Add by torrent bytes, or by magnet link if the bytes are unavailable
    pub(crate) async fn install(
        &self,
        url: &str,
        identity: &RemoteIdentity,
        save_path: &str,
    ) -> Result<(), ReconcileError> {
        match self.trackers.fetch_payload(url).await {
            Ok(payload) => self.client.add_payload(identity, save_path, &payload).await?,
            Err(e) if e.class().is_permanent() => return Err(e.into()),
            Err(e) => {
                warn!(%identity, error = %e, "install: payload unavailable, adding by magnet");
                self.client.add_by_identity_only(identity, save_path).await?;
            }
        }
        Ok(())
    }

    pub(crate) async fn fetch_title(&self, url: &str) -> Option<String> {
        match self.trackers.fetch_display_name(url).await {
            Ok(title) if !title.is_empty() => Some(title),
            Ok(_) => None,
            Err(e) => {
                warn!(url, error = %e, "fetch_title: keeping previous title");
                None
            }
        }
    }

    async fn announce(&self, kind: NotifyKind, item: &TrackedItem) {
        if let Err(e) = self.notifier.notify(kind, item).await {
            warn!(id = item.id, ?kind, error = %e, "announce: notification failed");
        }
    }
}

fn contains(entries: &[DownloadClientEntry], identity: &RemoteIdentity) -> bool {
    entries.iter().any(|e| &e.remote_identity == identity)
}

#[async_trait]
impl ItemReconciler for Reconciler {
    async fn reconcile(&self, id: ItemId) -> Result<ReconcileOutcome, ReconcileError> {
        debug!(id, "reconcile: called");
        let Some(item) = self.store.get_item(id).await? else {
            return Ok(ReconcileOutcome::Gone);
        };

        let result = self.reconcile_item(&item).await;
        let success = matches!(
            result,
            Ok(ReconcileOutcome::Added { .. } | ReconcileOutcome::Replaced { .. } | ReconcileOutcome::Unchanged)
        );
        if !matches!(result, Ok(ReconcileOutcome::Gone)) {
            self.feed.record_check(&item, success);
        }
        result
    }
}

#[cfg(test)]
mod tests;
