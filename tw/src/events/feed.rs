//! StatusFeed - last check result per item plus the event stream

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::debug;

use super::{EventBus, WatchEvent};
use crate::domain::{ItemId, ItemStatus, TrackedItem};

#[derive(Default)]
pub struct StatusFeed {
    bus: EventBus,
    statuses: Mutex<HashMap<ItemId, ItemStatus>>,
}

impl StatusFeed {
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            statuses: Mutex::new(HashMap::new()),
        }
    }

    pub fn emit(&self, event: WatchEvent) {
        if let WatchEvent::ItemRemoved { item_id } = &event {
            self.statuses
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(item_id);
        }
        self.bus.emit(event);
    }

    /// Store the result of a check and publish it
    pub fn record_check(&self, item: &TrackedItem, success: bool) {
        debug!(id = item.id, success, "record_check: called");
        let status = ItemStatus {
            item_id: item.id,
            source_url: item.source_url.clone(),
            last_check_time: Utc::now(),
            last_check_success: success,
        };
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(item.id, status.clone());
        self.bus.emit(WatchEvent::CheckCompleted { status });
    }

    /// Status for each of `items`; unchecked items report now and success
    pub fn snapshot(&self, items: &[TrackedItem]) -> Vec<ItemStatus> {
        let statuses = self.statuses.lock().unwrap_or_else(PoisonError::into_inner);
        items
            .iter()
            .map(|item| {
                statuses
                    .get(&item.id)
                    .cloned()
                    .unwrap_or_else(|| ItemStatus::unchecked(item))
            })
            .collect()
    }

    /// Receiver for events after this call. Take it before building the
    /// snapshot so nothing falls between the two.
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.bus.subscribe()
    }
}
