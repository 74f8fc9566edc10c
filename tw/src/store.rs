//! Store - persistence seam for tracked items
//!
//! The daemon uses [`crate::state::StateManager`] (SQLite behind an actor);
//! [`MemoryStore`] keeps everything in a map for tests and embedding.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::debug;

use crate::domain::{ItemId, NewTrackedItem, TrackedItem};
use crate::state::{StateError, StateResponse};

#[async_trait]
pub trait Store: Send + Sync {
    async fn list_items(&self) -> StateResponse<Vec<TrackedItem>>;

    async fn get_item(&self, id: ItemId) -> StateResponse<Option<TrackedItem>>;

    async fn find_by_url(&self, url: &str) -> StateResponse<Option<TrackedItem>>;

    /// Insert, or refresh the row with the same URL. Never changes the
    /// watch interval of an existing row.
    async fn upsert_item(&self, item: NewTrackedItem) -> StateResponse<TrackedItem>;

    /// Overwrite an existing row by id, leaving its watch interval alone.
    /// Returns false if the row is gone.
    async fn update_item(&self, item: &TrackedItem) -> StateResponse<bool>;

    async fn delete_item(&self, id: ItemId) -> StateResponse<bool>;

    async fn set_watch_interval(&self, id: ItemId, minutes: u32) -> StateResponse<bool>;
}

#[derive(Default)]
struct MemoryState {
    items: BTreeMap<ItemId, TrackedItem>,
    next_id: ItemId,
}

/// In-memory [`Store`]
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_reads: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `list_items` fail, simulating a broken backing store
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> StateResponse<std::sync::MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StateError::StoreError("memory store poisoned".to_string()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_items(&self) -> StateResponse<Vec<TrackedItem>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StateError::StoreError("reads disabled".to_string()));
        }
        Ok(self.lock()?.items.values().cloned().collect())
    }

    async fn get_item(&self, id: ItemId) -> StateResponse<Option<TrackedItem>> {
        Ok(self.lock()?.items.get(&id).cloned())
    }

    async fn find_by_url(&self, url: &str) -> StateResponse<Option<TrackedItem>> {
        Ok(self.lock()?.items.values().find(|i| i.source_url == url).cloned())
    }

    async fn upsert_item(&self, item: NewTrackedItem) -> StateResponse<TrackedItem> {
        debug!(url = %item.source_url, "MemoryStore::upsert_item: called");
        let mut state = self.lock()?;
        if let Some(existing) = state.items.values_mut().find(|i| i.source_url == item.source_url) {
            existing.display_title = item.display_title;
            existing.display_name = item.display_name;
            existing.remote_identity = item.remote_identity;
            existing.save_path = item.save_path;
            return Ok(existing.clone());
        }
        state.next_id += 1;
        let stored = TrackedItem {
            id: state.next_id,
            source_url: item.source_url,
            display_title: item.display_title,
            display_name: item.display_name,
            remote_identity: item.remote_identity,
            save_path: item.save_path,
            watch_interval_minutes: item.watch_interval_minutes,
        };
        state.items.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_item(&self, item: &TrackedItem) -> StateResponse<bool> {
        let mut state = self.lock()?;
        match state.items.get_mut(&item.id) {
            Some(existing) => {
                let watch = existing.watch_interval_minutes;
                *existing = item.clone();
                existing.watch_interval_minutes = watch;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_item(&self, id: ItemId) -> StateResponse<bool> {
        Ok(self.lock()?.items.remove(&id).is_some())
    }

    async fn set_watch_interval(&self, id: ItemId, minutes: u32) -> StateResponse<bool> {
        let mut state = self.lock()?;
        match state.items.get_mut(&id) {
            Some(existing) => {
                existing.watch_interval_minutes = minutes;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
