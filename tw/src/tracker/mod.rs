//! Tracker adapters
//!
//! Each supported tracker implements [`TrackerClient`]. The
//! [`TrackerRegistry`] picks the adapter for a URL by host and forwards calls.
//! Session handling (cookie jar, login redirects, bounded relogin retries)
//! lives in the shared `http` and `retry` modules so the adapters only deal
//! with URLs and page parsing.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::RemoteIdentity;

mod error;
mod html;
mod http;
mod kinozal;
pub mod payload;
mod registry;
mod retry;
mod rutracker;

pub use error::TrackerError;
pub use kinozal::KinozalTracker;
pub use registry::TrackerRegistry;
pub use retry::{Relogin, with_relogin};
pub use rutracker::RuTrackerTracker;

/// Identity and torrent name read from a tracker page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageIdentity {
    pub identity: RemoteIdentity,
    pub display_name: String,
}

/// Settings shared by all tracker adapters
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub user_agent: String,
    pub timeout: Duration,
    /// Bound on fetch-then-relogin rounds per identity or payload fetch
    pub max_identity_attempts: u32,
}

/// Capabilities every tracker adapter provides
#[async_trait]
pub trait TrackerClient: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &'static str;

    /// Hosts served by this tracker; subdomains match too
    fn hosts(&self) -> &'static [&'static str];

    /// Whether a login is configured
    fn has_credentials(&self) -> bool;

    /// Log in with the configured credentials
    async fn authenticate(&self) -> Result<(), TrackerError>;

    /// Current info-hash and torrent name for a page
    async fn fetch_identity(&self, url: &str) -> Result<PageIdentity, TrackerError>;

    /// Human-readable page title
    async fn fetch_display_name(&self, url: &str) -> Result<String, TrackerError>;

    /// Raw `.torrent` bytes
    async fn fetch_payload(&self, url: &str) -> Result<Vec<u8>, TrackerError>;
}
