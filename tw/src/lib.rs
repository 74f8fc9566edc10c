//! trackerwatch - keeps a download client in sync with tracker pages
//!
//! Torrents on trackers like kinozal.tv and rutracker.org get replaced when
//! the uploader adds episodes or fixes files; the info-hash changes and the
//! old torrent in qBittorrent goes stale. trackerwatch follows a set of
//! tracker pages and swaps the torrent when that happens.
//!
//! # Modules
//!
//! - [`tracker`] - Tracker adapters and the host-matching registry
//! - [`qbit`] - qBittorrent Web API session
//! - [`reconcile`] - Add / replace / no-op decision for one item
//! - [`watch`] - Per-item watchers and the supervisor loop
//! - [`state`] - SQLite item store behind an actor
//! - [`events`] - Status feed and event bus
//! - [`service`] - Operations exposed to clients
//! - [`ipc`] - Unix socket protocol between `tw` and the daemon
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod daemon;
pub mod domain;
pub mod error;
pub mod events;
pub mod ipc;
pub mod notify;
pub mod qbit;
pub mod reconcile;
pub mod service;
pub mod state;
pub mod store;
pub mod tracker;
pub mod watch;

#[cfg(test)]
mod http_fixture;

// Re-export commonly used types
pub use config::Config;
pub use domain::{DownloadClientEntry, ItemId, ItemStatus, NewTrackedItem, RemoteIdentity, TrackedItem};
pub use error::ErrorClass;
pub use events::{EventBus, StatusFeed, WatchEvent};
pub use reconcile::{IngestReport, IngestStatus, ItemReconciler, ReconcileError, ReconcileOutcome, Reconciler};
pub use service::WatchService;
pub use state::{StateError, StateManager};
pub use store::{MemoryStore, Store};
pub use watch::{Supervisor, SupervisorConfig, WatchRegistry};
