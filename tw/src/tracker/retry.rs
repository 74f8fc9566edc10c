//! Bounded fetch-then-relogin loop shared by all trackers

use std::future::Future;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::TrackerError;

/// Anything that can refresh a tracker session
#[async_trait]
pub trait Relogin: Send + Sync {
    /// Counter bumped by every completed login
    fn login_epoch(&self) -> u64;

    /// Drop the session and log in again, unless another caller already did
    /// so after `seen_epoch` was read.
    async fn relogin(&self, seen_epoch: u64) -> Result<(), TrackerError>;
}

/// Run `attempt` until it yields a value, logging in again after each miss.
///
/// - `Ok(None)` (an empty result) and transient errors re-login and consume an attempt.
/// - `AuthExpired` gets one re-login and retry per call; a second one is returned as is.
/// - Permanent errors, from the attempt or from the login, are returned at once.
///
/// When every attempt is spent, `exhausted(max_attempts)` is returned. The
/// re-logins already made are not undone.
pub async fn with_relogin<T, F, Fut>(
    session: &dyn Relogin,
    max_attempts: u32,
    what: &'static str,
    exhausted: impl FnOnce(u32) -> TrackerError,
    mut attempt: F,
) -> Result<T, TrackerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, TrackerError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut auth_retry_used = false;

    for n in 1..=max_attempts {
        let epoch = session.login_epoch();
        match attempt().await {
            Ok(Some(value)) => {
                debug!(what, attempt = n, "with_relogin: succeeded");
                return Ok(value);
            }
            Ok(None) => {
                debug!(what, attempt = n, "with_relogin: empty result");
            }
            Err(e) if e.is_auth_expired() => {
                if auth_retry_used {
                    warn!(what, error = %e, "Session rejected again after re-login");
                    return Err(e);
                }
                auth_retry_used = true;
                debug!(what, attempt = n, "with_relogin: session expired");
            }
            Err(e) if e.class().is_permanent() => return Err(e),
            Err(e) => {
                warn!(what, attempt = n, error = %e, "Tracker request failed");
            }
        }

        match session.relogin(epoch).await {
            Ok(()) => {}
            Err(e) if e.class().is_permanent() => return Err(e),
            Err(e) => warn!(what, attempt = n, error = %e, "Re-login failed"),
        }
    }

    Err(exhausted(max_attempts))
}
