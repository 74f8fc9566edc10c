//! Outbound notifications for added and updated torrents

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::TrackedItem;

mod telegram;

pub use telegram::TelegramNotifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyKind {
    Added,
    Updated,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Notification rejected with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Best-effort delivery; callers log failures and carry on
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, kind: NotifyKind, item: &TrackedItem) -> Result<(), NotifyError>;
}

/// Drops every notification
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _kind: NotifyKind, _item: &TrackedItem) -> Result<(), NotifyError> {
        Ok(())
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Records notifications; can be told to fail
    #[derive(Default)]
    pub struct RecordingNotifier {
        sent: Mutex<Vec<(NotifyKind, String)>>,
        fail: Mutex<bool>,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing() -> Self {
            let notifier = Self::default();
            *notifier.fail.lock().unwrap() = true;
            notifier
        }

        /// (kind, identity) pairs in send order
        pub fn sent(&self) -> Vec<(NotifyKind, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, kind: NotifyKind, item: &TrackedItem) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push((kind, item.remote_identity.to_string()));
            if *self.fail.lock().unwrap() {
                return Err(NotifyError::Rejected {
                    status: 500,
                    body: "mock failure".to_string(),
                });
            }
            Ok(())
        }
    }
}
