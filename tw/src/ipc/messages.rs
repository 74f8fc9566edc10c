//! IPC message types for daemon communication
//!
//! Simple JSON-over-newline protocol. Each message is a single line of JSON followed by `\n`.
//! Every request gets one response, except `Subscribe`, which gets a
//! `Snapshot` followed by one `Event` line per watch event.

use serde::{Deserialize, Serialize};

use crate::domain::{ItemId, ItemStatus, TrackedItem};
use crate::events::WatchEvent;
use crate::reconcile::IngestStatus;

/// Messages from the CLI to the daemon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum DaemonMessage {
    /// Start tracking a tracker page and add its torrent
    SubmitUrl {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        save_path: Option<String>,
    },

    ListItems,

    /// Stop tracking an item and remove its torrent
    RemoveItem { id: ItemId },

    /// Set the watch interval in minutes; 0 stops watching
    SetWatch { id: ItemId, minutes: u32 },

    /// Save paths in use by the download client
    DownloadPaths,

    /// Stream item statuses and events until the connection closes
    Subscribe,

    /// Ping to check if daemon is alive
    Ping,

    /// Request daemon to stop gracefully
    Shutdown,
}

/// Responses from the daemon to the CLI
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum DaemonResponse {
    /// Acknowledgment
    Ok,

    Submitted { status: IngestStatus, item: TrackedItem },

    Items { items: Vec<TrackedItem> },

    Paths { paths: Vec<String> },

    /// First line of a subscription
    Snapshot { statuses: Vec<ItemStatus> },

    /// Every following line of a subscription
    Event { event: WatchEvent },

    /// Pong response to ping
    Pong { version: String },

    /// Error response; `kind` is the error class
    Error { kind: String, message: String },
}

impl DaemonResponse {
    pub fn error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_url_serialize() {
        let msg = DaemonMessage::SubmitUrl {
            url: "https://kinozal.tv/details.php?id=1".to_string(),
            save_path: None,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"SubmitUrl","url":"https://kinozal.tv/details.php?id=1"}"#);
    }

    #[test]
    fn test_submit_url_deserialize_with_save_path() {
        let json = r#"{"type":"SubmitUrl","url":"u","save_path":"/data/x"}"#;
        let msg: DaemonMessage = serde_json::from_str(json).unwrap();
        assert_eq!(
            msg,
            DaemonMessage::SubmitUrl {
                url: "u".to_string(),
                save_path: Some("/data/x".to_string()),
            }
        );
    }

    #[test]
    fn test_set_watch_serialize() {
        let msg = DaemonMessage::SetWatch { id: 4, minutes: 30 };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"SetWatch","id":4,"minutes":30}"#);
    }

    #[test]
    fn test_ping_serialize() {
        let json = serde_json::to_string(&DaemonMessage::Ping).unwrap();
        assert_eq!(json, r#"{"type":"Ping"}"#);
    }

    #[test]
    fn test_ok_response_serialize() {
        let json = serde_json::to_string(&DaemonResponse::Ok).unwrap();
        assert_eq!(json, r#"{"type":"Ok"}"#);
    }

    #[test]
    fn test_error_response_serialize() {
        let resp = DaemonResponse::error("permanent", "Item 3 not found");
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, r#"{"type":"Error","kind":"permanent","message":"Item 3 not found"}"#);
    }

    #[test]
    fn test_event_response_nests_tagged_event() {
        let resp = DaemonResponse::Event {
            event: WatchEvent::ItemRemoved { item_id: 2 },
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, r#"{"type":"Event","event":{"type":"ItemRemoved","item_id":2}}"#);
    }

    #[test]
    fn test_unknown_message_rejected() {
        assert!(serde_json::from_str::<DaemonMessage>(r#"{"type":"ExecutionPending","id":"x"}"#).is_err());
    }
}
