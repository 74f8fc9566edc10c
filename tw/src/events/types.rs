//! Event types published on the feed

use serde::{Deserialize, Serialize};

use crate::domain::{ItemId, ItemStatus, RemoteIdentity, TrackedItem};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WatchEvent {
    /// An item was added to the download client
    ItemAdded { item: TrackedItem },
    /// An item's identity drifted and was replaced
    ItemUpdated {
        item: TrackedItem,
        previous_identity: RemoteIdentity,
    },
    /// The user removed an item
    ItemRemoved { item_id: ItemId },
    /// A watcher finished a check
    CheckCompleted { status: ItemStatus },
}

impl WatchEvent {
    /// Event type as a string (for logging)
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ItemAdded { .. } => "ItemAdded",
            Self::ItemUpdated { .. } => "ItemUpdated",
            Self::ItemRemoved { .. } => "ItemRemoved",
            Self::CheckCompleted { .. } => "CheckCompleted",
        }
    }

    pub fn item_id(&self) -> ItemId {
        match self {
            Self::ItemAdded { item } | Self::ItemUpdated { item, .. } => item.id,
            Self::ItemRemoved { item_id } => *item_id,
            Self::CheckCompleted { status } => status.item_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removed_serializes_with_tag() {
        let json = serde_json::to_string(&WatchEvent::ItemRemoved { item_id: 3 }).unwrap();
        assert_eq!(json, r#"{"type":"ItemRemoved","item_id":3}"#);
    }

    #[test]
    fn test_item_id() {
        assert_eq!(WatchEvent::ItemRemoved { item_id: 9 }.item_id(), 9);
        assert_eq!(WatchEvent::ItemRemoved { item_id: 9 }.event_type(), "ItemRemoved");
    }
}
