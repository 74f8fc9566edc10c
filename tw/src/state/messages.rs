//! State manager messages
//!
//! Commands and responses for the actor pattern.

use thiserror::Error;
use tokio::sync::oneshot;

use crate::domain::{ItemId, NewTrackedItem, TrackedItem};
use crate::error::ErrorClass;

/// Errors from state operations
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Corrupt record {id}: {reason}")]
    Corrupt { id: ItemId, reason: String },

    #[error("Channel error")]
    ChannelError,
}

impl StateError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NotFound(_) | Self::Corrupt { .. } | Self::ChannelError => ErrorClass::Permanent,
            Self::StoreError(_) => ErrorClass::Tick,
        }
    }
}

impl From<watchstore::StoreError> for StateError {
    fn from(err: watchstore::StoreError) -> Self {
        Self::StoreError(err.to_string())
    }
}

/// Response from state operations
pub type StateResponse<T> = Result<T, StateError>;

/// Commands sent to the StateManager actor
#[derive(Debug)]
pub enum StateCommand {
    ListItems {
        reply: oneshot::Sender<StateResponse<Vec<TrackedItem>>>,
    },
    GetItem {
        id: ItemId,
        reply: oneshot::Sender<StateResponse<Option<TrackedItem>>>,
    },
    FindByUrl {
        url: String,
        reply: oneshot::Sender<StateResponse<Option<TrackedItem>>>,
    },
    UpsertItem {
        item: NewTrackedItem,
        reply: oneshot::Sender<StateResponse<TrackedItem>>,
    },
    UpdateItem {
        item: TrackedItem,
        reply: oneshot::Sender<StateResponse<bool>>,
    },
    DeleteItem {
        id: ItemId,
        reply: oneshot::Sender<StateResponse<bool>>,
    },
    SetWatchInterval {
        id: ItemId,
        minutes: u32,
        reply: oneshot::Sender<StateResponse<bool>>,
    },

    // Shutdown
    Shutdown,
}
