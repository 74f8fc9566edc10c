//! WatchService - the operations the IPC server exposes

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::domain::{ItemId, ItemStatus, TrackedItem};
use crate::events::WatchEvent;
use crate::qbit::{DownloadClient, DownloadClientError};
use crate::reconcile::{IngestReport, ReconcileError, Reconciler, spawn_ingest};
use crate::store::Store;

pub struct WatchService {
    reconciler: Arc<Reconciler>,
    store: Arc<dyn Store>,
    client: Arc<dyn DownloadClient>,
    /// Whether removing an item also deletes its downloaded files
    delete_files: bool,
}

impl WatchService {
    pub fn new(
        reconciler: Arc<Reconciler>,
        store: Arc<dyn Store>,
        client: Arc<dyn DownloadClient>,
        delete_files: bool,
    ) -> Self {
        Self {
            reconciler,
            store,
            client,
            delete_files,
        }
    }

    /// Ingest a tracker URL; resolves once the item is stored or has failed
    pub async fn submit_url(&self, url: &str, save_path: Option<String>) -> Result<IngestReport, ReconcileError> {
        debug!(url, ?save_path, "submit_url: called");
        spawn_ingest(self.reconciler.clone(), url.to_string(), save_path)
            .await
            .map_err(|_| ReconcileError::WorkerLost)?
    }

    pub async fn list_tracked_items(&self) -> Result<Vec<TrackedItem>, ReconcileError> {
        Ok(self.store.list_items().await?)
    }

    /// Remove the torrent from the download client, then forget the item
    pub async fn remove_item(&self, id: ItemId) -> Result<(), ReconcileError> {
        debug!(id, "remove_item: called");
        let item = self.store.get_item(id).await?.ok_or(ReconcileError::ItemNotFound(id))?;

        match self.client.remove(&item.remote_identity, self.delete_files).await {
            Ok(()) => {}
            Err(DownloadClientError::NotFound(hash)) => {
                warn!(id, %hash, "remove_item: torrent already gone from client");
            }
            Err(e) => return Err(e.into()),
        }

        self.store.delete_item(id).await?;
        self.reconciler.feed().emit(WatchEvent::ItemRemoved { item_id: id });
        info!(id, url = %item.source_url, "remove_item: removed");
        Ok(())
    }

    pub async fn set_watch(&self, id: ItemId, minutes: u32) -> Result<(), ReconcileError> {
        debug!(id, minutes, "set_watch: called");
        if self.store.set_watch_interval(id, minutes).await? {
            Ok(())
        } else {
            Err(ReconcileError::ItemNotFound(id))
        }
    }

    pub async fn download_paths(&self) -> Result<Vec<String>, ReconcileError> {
        Ok(self.client.download_paths().await?)
    }

    /// Current status of every item, plus every event after it
    pub async fn subscribe(&self) -> Result<(Vec<ItemStatus>, broadcast::Receiver<WatchEvent>), ReconcileError> {
        let feed = self.reconciler.feed();
        let rx = feed.subscribe();
        let items = self.store.list_items().await?;
        Ok((feed.snapshot(&items), rx))
    }
}
