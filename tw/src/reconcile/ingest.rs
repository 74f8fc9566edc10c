//! Manual ingest of a tracker URL

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, info};

use super::{ReconcileError, Reconciler, contains};
use crate::domain::{NewTrackedItem, TrackedItem};
use crate::events::WatchEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestStatus {
    Added,
    /// The torrent was already in the download client
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub status: IngestStatus,
    pub item: TrackedItem,
}

impl Reconciler {
    /// Add `url` to the download client and start tracking it
    ///
    /// Nothing is written before the tracker has been resolved and the page
    /// read. A torrent already present in the client is reported as
    /// `Duplicate` and adopted into the store unless its URL is tracked.
    pub async fn ingest(&self, url: &str, save_path: Option<&str>) -> Result<IngestReport, ReconcileError> {
        debug!(url, ?save_path, "ingest: called");
        self.trackers.resolve(url)?;
        let page = self.trackers.fetch_identity(url).await?;
        let display_title = self.fetch_title(url).await.unwrap_or_default();
        let save_path = match save_path {
            Some(path) if !path.trim().is_empty() => path.trim().to_string(),
            _ => self.default_save_path.clone(),
        };
        let new_item = NewTrackedItem {
            source_url: url.to_string(),
            display_title,
            display_name: page.display_name,
            remote_identity: page.identity,
            save_path,
            watch_interval_minutes: 0,
        };

        let entries = self.client.list_entries().await?;
        if contains(&entries, &new_item.remote_identity) {
            info!(url, identity = %new_item.remote_identity, "ingest: already in download client");
            let item = match self.store.find_by_url(url).await? {
                Some(item) => item,
                None => self.store.upsert_item(new_item).await?,
            };
            return Ok(IngestReport {
                status: IngestStatus::Duplicate,
                item,
            });
        }

        self.install(url, &new_item.remote_identity, &new_item.save_path)
            .await?;
        let item = self.store.upsert_item(new_item).await?;
        info!(id = item.id, identity = %item.remote_identity, "ingest: added");
        self.feed.emit(WatchEvent::ItemAdded { item: item.clone() });
        Ok(IngestReport {
            status: IngestStatus::Added,
            item,
        })
    }
}

/// Run [`Reconciler::ingest`] on its own task and answer over a oneshot
pub fn spawn_ingest(
    reconciler: Arc<Reconciler>,
    url: String,
    save_path: Option<String>,
) -> oneshot::Receiver<Result<IngestReport, ReconcileError>> {
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        let result = reconciler.ingest(&url, save_path.as_deref()).await;
        // The caller may have gone away; the item is stored either way
        let _ = tx.send(result);
    });
    rx
}
