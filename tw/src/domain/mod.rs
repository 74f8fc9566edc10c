//! Domain types for TrackerWatch
//!
//! TrackedItem is the persisted unit of work; DownloadClientEntry is the live
//! view from the download client. The two are joined on RemoteIdentity.

mod identity;
mod item;

pub use identity::{IdentityError, RemoteIdentity};
pub use item::{DownloadClientEntry, ItemId, ItemStatus, NewTrackedItem, TrackedItem};
