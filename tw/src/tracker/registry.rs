//! TrackerRegistry - host-based dispatch to tracker adapters

use std::sync::Arc;

use reqwest::Url;
use tracing::{debug, warn};

use super::{PageIdentity, TrackerClient, TrackerError};

/// Static table of tracker adapters, matched by URL host
#[derive(Default, Clone)]
pub struct TrackerRegistry {
    trackers: Vec<Arc<dyn TrackerClient>>,
}

impl TrackerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, tracker: Arc<dyn TrackerClient>) -> Self {
        self.register(tracker);
        self
    }

    pub fn register(&mut self, tracker: Arc<dyn TrackerClient>) {
        debug!(tracker = tracker.name(), hosts = ?tracker.hosts(), "register: called");
        self.trackers.push(tracker);
    }

    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }

    /// Adapter serving `url`. Unknown or unparsable hosts fail closed.
    pub fn resolve(&self, url: &str) -> Result<Arc<dyn TrackerClient>, TrackerError> {
        let parsed = Url::parse(url).map_err(|e| TrackerError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let host = parsed
            .host_str()
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| TrackerError::UnknownTracker(url.to_string()))?;

        self.trackers
            .iter()
            .find(|tracker| tracker.hosts().iter().any(|known| host_matches(&host, known)))
            .cloned()
            .ok_or_else(|| {
                debug!(%host, "resolve: no tracker for host");
                TrackerError::UnknownTracker(host)
            })
    }

    pub async fn fetch_identity(&self, url: &str) -> Result<PageIdentity, TrackerError> {
        self.resolve(url)?.fetch_identity(url).await
    }

    pub async fn fetch_display_name(&self, url: &str) -> Result<String, TrackerError> {
        self.resolve(url)?.fetch_display_name(url).await
    }

    pub async fn fetch_payload(&self, url: &str) -> Result<Vec<u8>, TrackerError> {
        self.resolve(url)?.fetch_payload(url).await
    }

    /// Log in to every tracker that has credentials.
    ///
    /// Rejected credentials are returned; other failures are logged and left
    /// to the lazy relogin on first use.
    pub async fn authenticate_all(&self) -> Result<(), TrackerError> {
        for tracker in &self.trackers {
            if !tracker.has_credentials() {
                debug!(tracker = tracker.name(), "authenticate_all: no credentials, skipping");
                continue;
            }
            match tracker.authenticate().await {
                Ok(()) => {}
                Err(e) if e.class().is_permanent() => return Err(e),
                Err(e) => warn!(tracker = tracker.name(), error = %e, "Initial tracker login failed"),
            }
        }
        Ok(())
    }
}

fn host_matches(host: &str, known: &str) -> bool {
    host == known || host.strip_suffix(known).is_some_and(|prefix| prefix.ends_with('.'))
}

#[cfg(test)]
mod tests {
    use super::super::mock::MockTracker;
    use super::*;

    fn registry() -> TrackerRegistry {
        TrackerRegistry::new()
            .with(Arc::new(MockTracker::new(&["kinozal.tv"])))
            .with(Arc::new(MockTracker::new(&["rutracker.org"])))
    }

    #[test]
    fn test_resolve_by_host() {
        let registry = registry();
        let tracker = registry.resolve("https://kinozal.tv/details.php?id=1").unwrap();
        assert_eq!(tracker.hosts(), &["kinozal.tv"]);
        let tracker = registry.resolve("https://RuTracker.org/forum/viewtopic.php?t=1").unwrap();
        assert_eq!(tracker.hosts(), &["rutracker.org"]);
    }

    #[test]
    fn test_resolve_subdomain() {
        assert!(registry().resolve("https://www.kinozal.tv/details.php?id=1").is_ok());
    }

    #[test]
    fn test_resolve_unknown_host_fails_closed() {
        let err = registry().resolve("https://example.com/?id=1").err().unwrap();
        assert!(matches!(err, TrackerError::UnknownTracker(ref host) if host == "example.com"));
        assert!(err.class().is_permanent());
    }

    #[test]
    fn test_resolve_lookalike_host_is_unknown() {
        assert!(matches!(
            registry().resolve("https://notkinozal.tv/details.php?id=1").err().unwrap(),
            TrackerError::UnknownTracker(_)
        ));
        assert!(matches!(
            registry().resolve("https://kinozal.tv.evil.com/details.php?id=1").err().unwrap(),
            TrackerError::UnknownTracker(_)
        ));
    }

    #[test]
    fn test_resolve_garbage_url() {
        assert!(matches!(
            registry().resolve("kinozal").err().unwrap(),
            TrackerError::InvalidUrl { .. }
        ));
    }

    #[test]
    fn test_host_matches() {
        assert!(host_matches("kinozal.tv", "kinozal.tv"));
        assert!(host_matches("dl.kinozal.tv", "kinozal.tv"));
        assert!(!host_matches("xkinozal.tv", "kinozal.tv"));
    }
}
