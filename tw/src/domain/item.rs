//! Tracked items and their live projections

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RemoteIdentity;

/// Store-assigned item id
pub type ItemId = i64;

/// A tracker page the user asked us to follow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedItem {
    pub id: ItemId,
    pub source_url: String,
    /// Page title
    pub display_title: String,
    /// Torrent name from the tracker
    pub display_name: String,
    pub remote_identity: RemoteIdentity,
    pub save_path: String,
    /// 0 disables watching
    pub watch_interval_minutes: u32,
}

impl TrackedItem {
    pub fn is_watched(&self) -> bool {
        self.watch_interval_minutes > 0
    }
}

/// Fields for inserting or refreshing an item keyed by its URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTrackedItem {
    pub source_url: String,
    pub display_title: String,
    pub display_name: String,
    pub remote_identity: RemoteIdentity,
    pub save_path: String,
    pub watch_interval_minutes: u32,
}

/// One torrent as the download client reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadClientEntry {
    pub remote_identity: RemoteIdentity,
    pub display_name: String,
    pub save_path: String,
}

/// Outcome of the most recent check of one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStatus {
    pub item_id: ItemId,
    pub source_url: String,
    pub last_check_time: DateTime<Utc>,
    pub last_check_success: bool,
}

impl ItemStatus {
    /// Status reported for items that have not been checked yet
    pub fn unchecked(item: &TrackedItem) -> Self {
        Self {
            item_id: item.id,
            source_url: item.source_url.clone(),
            last_check_time: Utc::now(),
            last_check_success: true,
        }
    }
}
