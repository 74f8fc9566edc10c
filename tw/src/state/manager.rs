//! StateManager - actor that owns the ItemStore
//!
//! Processes commands via channels for thread-safe access to persistent state.

use std::path::Path;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use watchstore::{ItemRecord, ItemStore, NewItem};

use super::messages::{StateCommand, StateError, StateResponse};
use crate::domain::{ItemId, NewTrackedItem, RemoteIdentity, TrackedItem};
use crate::store::Store;

/// Handle to send commands to the StateManager
#[derive(Clone)]
pub struct StateManager {
    tx: mpsc::Sender<StateCommand>,
}

impl StateManager {
    /// Open the database and spawn the actor
    pub fn spawn(db_path: impl AsRef<Path>) -> eyre::Result<Self> {
        debug!(db_path = %db_path.as_ref().display(), "spawn: called");
        let store = ItemStore::open(db_path.as_ref())?;
        Ok(Self::spawn_with(store))
    }

    /// Spawn the actor around an already opened store
    pub fn spawn_with(store: ItemStore) -> Self {
        let (tx, rx) = mpsc::channel(256);
        tokio::task::spawn_blocking(move || actor_loop(store, rx));
        info!("StateManager spawned");
        Self { tx }
    }

    /// Stop the actor; later requests fail with `ChannelError`
    pub async fn shutdown(&self) {
        debug!("shutdown: called");
        let _ = self.tx.send(StateCommand::Shutdown).await;
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<StateResponse<T>>) -> StateCommand,
    ) -> StateResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }
}

#[async_trait]
impl Store for StateManager {
    async fn list_items(&self) -> StateResponse<Vec<TrackedItem>> {
        debug!("list_items: called");
        self.request(|reply| StateCommand::ListItems { reply }).await
    }

    async fn get_item(&self, id: ItemId) -> StateResponse<Option<TrackedItem>> {
        debug!(id, "get_item: called");
        self.request(|reply| StateCommand::GetItem { id, reply }).await
    }

    async fn find_by_url(&self, url: &str) -> StateResponse<Option<TrackedItem>> {
        debug!(%url, "find_by_url: called");
        let url = url.to_string();
        self.request(|reply| StateCommand::FindByUrl { url, reply }).await
    }

    async fn upsert_item(&self, item: NewTrackedItem) -> StateResponse<TrackedItem> {
        debug!(url = %item.source_url, identity = %item.remote_identity, "upsert_item: called");
        self.request(|reply| StateCommand::UpsertItem { item, reply }).await
    }

    async fn update_item(&self, item: &TrackedItem) -> StateResponse<bool> {
        debug!(id = item.id, identity = %item.remote_identity, "update_item: called");
        let item = item.clone();
        self.request(|reply| StateCommand::UpdateItem { item, reply }).await
    }

    async fn delete_item(&self, id: ItemId) -> StateResponse<bool> {
        debug!(id, "delete_item: called");
        self.request(|reply| StateCommand::DeleteItem { id, reply }).await
    }

    async fn set_watch_interval(&self, id: ItemId, minutes: u32) -> StateResponse<bool> {
        debug!(id, minutes, "set_watch_interval: called");
        self.request(|reply| StateCommand::SetWatchInterval { id, minutes, reply })
            .await
    }
}

/// Actor loop; runs on a blocking thread and owns the connection
fn actor_loop(store: ItemStore, mut rx: mpsc::Receiver<StateCommand>) {
    debug!("actor_loop: started");
    while let Some(cmd) = rx.blocking_recv() {
        match cmd {
            StateCommand::ListItems { reply } => {
                let _ = reply.send(list_items(&store));
            }
            StateCommand::GetItem { id, reply } => {
                let result = store.get(id).map_err(StateError::from).and_then(|r| r.map(to_item).transpose());
                let _ = reply.send(result);
            }
            StateCommand::FindByUrl { url, reply } => {
                let result = store
                    .get_by_url(&url)
                    .map_err(StateError::from)
                    .and_then(|r| r.map(to_item).transpose());
                let _ = reply.send(result);
            }
            StateCommand::UpsertItem { item, reply } => {
                let result = store.upsert(&to_new_record(item)).map_err(StateError::from).and_then(to_item);
                let _ = reply.send(result);
            }
            StateCommand::UpdateItem { item, reply } => {
                let _ = reply.send(store.update(&to_record(&item)).map_err(StateError::from));
            }
            StateCommand::DeleteItem { id, reply } => {
                let _ = reply.send(store.delete(id).map_err(StateError::from));
            }
            StateCommand::SetWatchInterval { id, minutes, reply } => {
                let _ = reply.send(store.set_watch_every(id, minutes).map_err(StateError::from));
            }
            StateCommand::Shutdown => {
                info!("StateManager shutting down");
                break;
            }
        }
    }
    debug!("actor_loop: exited");
}

fn list_items(store: &ItemStore) -> StateResponse<Vec<TrackedItem>> {
    let items = store
        .list()?
        .into_iter()
        .filter_map(|record| match to_item(record) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable item");
                None
            }
        })
        .collect();
    Ok(items)
}

fn to_item(record: ItemRecord) -> StateResponse<TrackedItem> {
    let remote_identity = RemoteIdentity::parse(&record.hash).map_err(|e| StateError::Corrupt {
        id: record.id,
        reason: e.to_string(),
    })?;
    Ok(TrackedItem {
        id: record.id,
        source_url: record.url,
        display_title: record.title,
        display_name: record.name,
        remote_identity,
        save_path: record.save_path,
        watch_interval_minutes: record.watch_every,
    })
}

fn to_record(item: &TrackedItem) -> ItemRecord {
    ItemRecord {
        id: item.id,
        url: item.source_url.clone(),
        title: item.display_title.clone(),
        name: item.display_name.clone(),
        hash: item.remote_identity.to_string(),
        save_path: item.save_path.clone(),
        watch_every: item.watch_interval_minutes,
        created_at: 0,
        updated_at: 0,
    }
}

fn to_new_record(item: NewTrackedItem) -> NewItem {
    NewItem {
        url: item.source_url,
        title: item.display_title,
        name: item.display_name,
        hash: item.remote_identity.to_string(),
        save_path: item.save_path,
        watch_every: item.watch_interval_minutes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn new_item(url: &str, c: char) -> NewTrackedItem {
        NewTrackedItem {
            source_url: url.to_string(),
            display_title: "Title".to_string(),
            display_name: "Name".to_string(),
            remote_identity: RemoteIdentity::parse(&c.to_string().repeat(40)).unwrap(),
            save_path: "/downloads".to_string(),
            watch_interval_minutes: 0,
        }
    }

    #[tokio::test]
    async fn test_crud_through_actor() {
        let temp = TempDir::new().unwrap();
        let state = StateManager::spawn(temp.path().join("items.db")).unwrap();

        let item = state.upsert_item(new_item("https://kinozal.tv/details.php?id=1", 'a')).await.unwrap();
        assert_eq!(state.list_items().await.unwrap().len(), 1);

        assert!(state.set_watch_interval(item.id, 30).await.unwrap());
        let stored = state.get_item(item.id).await.unwrap().unwrap();
        assert_eq!(stored.watch_interval_minutes, 30);

        let found = state.find_by_url("https://kinozal.tv/details.php?id=1").await.unwrap();
        assert_eq!(found.map(|i| i.id), Some(item.id));

        assert!(state.delete_item(item.id).await.unwrap());
        assert!(state.get_item(item.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_missing_item_returns_false() {
        let state = StateManager::spawn_with(ItemStore::open_in_memory().unwrap());
        let mut item = state.upsert_item(new_item("https://kinozal.tv/details.php?id=2", 'a')).await.unwrap();
        state.delete_item(item.id).await.unwrap();

        item.remote_identity = RemoteIdentity::parse(&"b".repeat(40)).unwrap();
        assert!(!state.update_item(&item).await.unwrap());
        assert!(state.list_items().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_requests_after_shutdown_fail() {
        let state = StateManager::spawn_with(ItemStore::open_in_memory().unwrap());
        state.shutdown().await;
        let err = state.list_items().await.unwrap_err();
        assert!(matches!(err, StateError::ChannelError));
    }

    #[test]
    fn test_to_item_rejects_bad_hash() {
        let record = ItemRecord {
            id: 7,
            url: "u".into(),
            title: String::new(),
            name: String::new(),
            hash: String::new(),
            save_path: String::new(),
            watch_every: 0,
            created_at: 0,
            updated_at: 0,
        };
        assert!(matches!(to_item(record), Err(StateError::Corrupt { id: 7, .. })));
    }
}
