//! Row types

use serde::{Deserialize, Serialize};

/// A persisted tracked item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: i64,
    /// Tracker page URL, unique per row
    pub url: String,
    /// Page title as shown on the tracker
    pub title: String,
    /// Torrent name as reported by the tracker
    pub name: String,
    /// Lowercase hex info-hash
    pub hash: String,
    pub save_path: String,
    /// Minutes between checks, 0 means not watched
    pub watch_every: u32,
    /// Unix seconds
    pub created_at: i64,
    /// Unix seconds
    pub updated_at: i64,
}

/// Fields supplied when inserting or refreshing an item by URL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewItem {
    pub url: String,
    pub title: String,
    pub name: String,
    pub hash: String,
    pub save_path: String,
    /// Only applied when the URL is not yet stored
    pub watch_every: u32,
}
