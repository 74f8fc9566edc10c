//! Download client (qBittorrent) access
//!
//! [`DownloadClient`] is what the reconciler talks to. [`QbitSession`]
//! implements it on top of the raw [`QbitApi`], adding lazy session checks
//! and the single re-authentication retry.

use async_trait::async_trait;

use crate::domain::{DownloadClientEntry, RemoteIdentity};

mod api;
mod error;
mod session;

pub use api::{HttpQbitApi, QbitApi, TorrentInfo};
pub use error::DownloadClientError;
pub use session::QbitSession;

/// Operations the reconciler needs from a download client
#[async_trait]
pub trait DownloadClient: Send + Sync {
    async fn list_entries(&self) -> Result<Vec<DownloadClientEntry>, DownloadClientError>;

    /// Add from torrent bytes; re-adding an existing torrent is harmless
    async fn add_payload(
        &self,
        identity: &RemoteIdentity,
        save_path: &str,
        payload: &[u8],
    ) -> Result<(), DownloadClientError>;

    /// Add by magnet link when the torrent file is unavailable
    async fn add_by_identity_only(&self, identity: &RemoteIdentity, save_path: &str) -> Result<(), DownloadClientError>;

    async fn remove(&self, identity: &RemoteIdentity, also_delete_files: bool) -> Result<(), DownloadClientError>;

    /// `NotFound` when the torrent is not present
    async fn save_path_of(&self, identity: &RemoteIdentity) -> Result<String, DownloadClientError>;

    /// Distinct save paths in use, most frequent first
    async fn download_paths(&self) -> Result<Vec<String>, DownloadClientError>;

    /// Drop the current session and log in again
    async fn recover(&self) -> Result<(), DownloadClientError>;
}
