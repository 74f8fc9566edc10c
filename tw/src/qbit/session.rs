//! QbitSession - lazily validated, self-healing qBittorrent session

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::api::{QbitApi, TorrentInfo};
use super::{DownloadClient, DownloadClientError};
use crate::domain::{DownloadClientEntry, RemoteIdentity};

/// Wraps a [`QbitApi`] with the session discipline:
///
/// - every call first probes the session and logs in if the probe is refused;
/// - probing and logging in happen under one mutex, so a burst of callers
///   produces one login;
/// - a call refused mid-flight logs in once and retries once; a second
///   refusal is `AuthRejected`.
pub struct QbitSession<A> {
    api: A,
    auth: Mutex<()>,
    epoch: AtomicU64,
}

impl<A: QbitApi> QbitSession<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            auth: Mutex::new(()),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Probe the session, logging in when it is not valid
    pub async fn ensure_valid(&self) -> Result<(), DownloadClientError> {
        let _guard = self.auth.lock().await;
        match self.api.probe().await {
            Ok(()) => Ok(()),
            Err(e) if e.is_auth() => {
                debug!("ensure_valid: probe refused, logging in");
                self.login_locked().await
            }
            Err(e) => Err(e),
        }
    }

    /// Log in unless someone already did after `seen_epoch`
    async fn relogin(&self, seen_epoch: u64) -> Result<(), DownloadClientError> {
        let _guard = self.auth.lock().await;
        if self.epoch.load(Ordering::SeqCst) != seen_epoch {
            debug!("relogin: session already refreshed");
            return Ok(());
        }
        self.login_locked().await
    }

    async fn login_locked(&self) -> Result<(), DownloadClientError> {
        self.api.login().await?;
        self.epoch.fetch_add(1, Ordering::SeqCst);
        info!("Logged in to qBittorrent");
        Ok(())
    }

    async fn with_reauth<T, F, Fut>(&self, what: &'static str, mut op: F) -> Result<T, DownloadClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DownloadClientError>>,
    {
        self.ensure_valid().await?;
        let epoch = self.epoch.load(Ordering::SeqCst);
        match op().await {
            Err(DownloadClientError::AuthExpired) => {
                warn!(what, "qBittorrent refused the session, logging in again");
                self.relogin(epoch).await?;
                match op().await {
                    Err(DownloadClientError::AuthExpired) => Err(DownloadClientError::AuthRejected),
                    other => other,
                }
            }
            other => other,
        }
    }

    async fn torrents(&self) -> Result<Vec<TorrentInfo>, DownloadClientError> {
        self.with_reauth("torrents", || self.api.torrents()).await
    }
}

#[async_trait]
impl<A: QbitApi> DownloadClient for QbitSession<A> {
    async fn list_entries(&self) -> Result<Vec<DownloadClientEntry>, DownloadClientError> {
        debug!("list_entries: called");
        let entries: Vec<_> = self
            .torrents()
            .await?
            .into_iter()
            .filter_map(|row| match RemoteIdentity::parse(&row.hash) {
                Ok(remote_identity) => Some(DownloadClientEntry {
                    remote_identity,
                    display_name: row.name,
                    save_path: row.save_path,
                }),
                Err(e) => {
                    debug!(hash = %row.hash, error = %e, "list_entries: skipping row");
                    None
                }
            })
            .collect();
        debug!(count = entries.len(), "list_entries: loaded");
        Ok(entries)
    }

    async fn add_payload(
        &self,
        identity: &RemoteIdentity,
        save_path: &str,
        payload: &[u8],
    ) -> Result<(), DownloadClientError> {
        debug!(%identity, %save_path, "add_payload: called");
        self.with_reauth("add_payload", || self.api.add_file(identity, save_path, payload))
            .await
    }

    async fn add_by_identity_only(&self, identity: &RemoteIdentity, save_path: &str) -> Result<(), DownloadClientError> {
        debug!(%identity, %save_path, "add_by_identity_only: called");
        let magnet = identity.magnet();
        self.with_reauth("add_by_identity_only", || self.api.add_url(&magnet, save_path))
            .await
    }

    async fn remove(&self, identity: &RemoteIdentity, also_delete_files: bool) -> Result<(), DownloadClientError> {
        debug!(%identity, also_delete_files, "remove: called");
        self.with_reauth("remove", || self.api.delete(identity, also_delete_files))
            .await
    }

    async fn save_path_of(&self, identity: &RemoteIdentity) -> Result<String, DownloadClientError> {
        debug!(%identity, "save_path_of: called");
        self.list_entries()
            .await?
            .into_iter()
            .find(|entry| &entry.remote_identity == identity)
            .map(|entry| entry.save_path)
            .ok_or_else(|| DownloadClientError::NotFound(identity.to_string()))
    }

    async fn download_paths(&self) -> Result<Vec<String>, DownloadClientError> {
        debug!("download_paths: called");
        Ok(paths_by_frequency(self.torrents().await?))
    }

    async fn recover(&self) -> Result<(), DownloadClientError> {
        debug!("recover: called");
        self.relogin(self.epoch.load(Ordering::SeqCst)).await
    }
}

/// Distinct save paths, most used first, ties by name
fn paths_by_frequency(rows: Vec<TorrentInfo>) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for row in rows.into_iter().filter(|row| !row.save_path.is_empty()) {
        *counts.entry(row.save_path).or_default() += 1;
    }
    let mut paths: Vec<(String, usize)> = counts.into_iter().collect();
    paths.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    paths.into_iter().map(|(path, _)| path).collect()
}
