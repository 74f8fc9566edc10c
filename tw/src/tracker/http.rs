//! Cookie-carrying HTTP session shared by the tracker adapters

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{LOCATION, ORIGIN, REFERER};
use reqwest::{Client, RequestBuilder, Response, Url, redirect};
use tracing::{debug, info, warn};

use super::TrackerError;
use super::retry::Relogin;

const MAX_REDIRECTS: usize = 10;

/// Credentials form posted to a tracker's login endpoint
#[derive(Clone)]
pub struct LoginForm {
    pub url: String,
    pub fields: Vec<(&'static str, String)>,
    /// Returns true when the response body reports rejected credentials
    pub rejected: fn(&str) -> bool,
}

/// HTTP session for one tracker
///
/// Redirects to the tracker's login page are not followed; they surface as
/// `AuthExpired`. Logging in rebuilds the client so stale cookies are dropped.
pub struct TrackerHttp {
    tracker: &'static str,
    user_agent: String,
    timeout: Duration,
    login_paths: &'static [&'static str],
    form: LoginForm,
    has_credentials: bool,
    client: RwLock<Client>,
    login_lock: tokio::sync::Mutex<()>,
    epoch: AtomicU64,
}

impl TrackerHttp {
    pub fn new(
        tracker: &'static str,
        user_agent: &str,
        timeout: Duration,
        login_paths: &'static [&'static str],
        form: LoginForm,
        has_credentials: bool,
    ) -> Result<Self, TrackerError> {
        debug!(tracker, "TrackerHttp::new: called");
        let client = build_client(user_agent, timeout, login_paths)?;
        Ok(Self {
            tracker,
            user_agent: user_agent.to_string(),
            timeout,
            login_paths,
            form,
            has_credentials,
            client: RwLock::new(client),
            login_lock: tokio::sync::Mutex::new(()),
            epoch: AtomicU64::new(0),
        })
    }

    pub fn tracker(&self) -> &'static str {
        self.tracker
    }

    pub fn has_credentials(&self) -> bool {
        self.has_credentials
    }

    fn client(&self) -> Client {
        self.client.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// GET a page and decode it as text
    pub async fn get_text(&self, url: &str, referer: Option<&str>) -> Result<String, TrackerError> {
        debug!(tracker = self.tracker, %url, "get_text: called");
        let response = self.send(self.with_referer(self.client().get(url), referer)).await?;
        Ok(response.text().await?)
    }

    /// GET a binary resource
    pub async fn get_bytes(&self, url: &str, referer: Option<&str>) -> Result<Vec<u8>, TrackerError> {
        debug!(tracker = self.tracker, %url, "get_bytes: called");
        let response = self.send(self.with_referer(self.client().get(url), referer)).await?;
        Ok(response.bytes().await?.to_vec())
    }

    fn with_referer(&self, request: RequestBuilder, referer: Option<&str>) -> RequestBuilder {
        match referer {
            Some(referer) => request.header(REFERER, referer),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, TrackerError> {
        let response = request.send().await?;
        if self.points_at_login(&response) {
            debug!(tracker = self.tracker, url = %response.url(), "send: redirected to login");
            return Err(TrackerError::AuthExpired { tracker: self.tracker });
        }
        let status = response.status();
        if !status.is_success() {
            return Err(TrackerError::Http {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }
        Ok(response)
    }

    fn points_at_login(&self, response: &Response) -> bool {
        if is_login_url(response.url(), self.login_paths) && !response.url().as_str().starts_with(&self.form.url) {
            return true;
        }
        if !response.status().is_redirection() {
            return false;
        }
        response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|location| response.url().join(location).ok())
            .is_some_and(|target| is_login_url(&target, self.login_paths))
    }

    async fn login(&self) -> Result<(), TrackerError> {
        if !self.has_credentials {
            return Err(TrackerError::InvalidCredentials { tracker: self.tracker });
        }

        let fresh = build_client(&self.user_agent, self.timeout, self.login_paths)?;
        *self.client.write().unwrap_or_else(PoisonError::into_inner) = fresh.clone();

        let origin = Url::parse(&self.form.url)
            .map(|url| url.origin().ascii_serialization())
            .unwrap_or_default();
        let response = fresh
            .post(&self.form.url)
            .header(REFERER, &self.form.url)
            .header(ORIGIN, origin)
            .form(&self.form.fields)
            .send()
            .await?;

        if response.status().is_redirection() && self.points_at_login(&response) {
            return Err(TrackerError::InvalidCredentials { tracker: self.tracker });
        }
        let status = response.status();
        if !status.is_success() && !status.is_redirection() {
            return Err(TrackerError::Http {
                status: status.as_u16(),
                url: self.form.url.clone(),
            });
        }
        let body = response.text().await?;
        if (self.form.rejected)(&body) {
            warn!(tracker = self.tracker, "Tracker rejected credentials");
            return Err(TrackerError::InvalidCredentials { tracker: self.tracker });
        }
        Ok(())
    }
}

#[async_trait]
impl Relogin for TrackerHttp {
    fn login_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    async fn relogin(&self, seen_epoch: u64) -> Result<(), TrackerError> {
        let _guard = self.login_lock.lock().await;
        if self.epoch.load(Ordering::SeqCst) != seen_epoch {
            debug!(tracker = self.tracker, "relogin: session already refreshed");
            return Ok(());
        }
        self.login().await?;
        self.epoch.fetch_add(1, Ordering::SeqCst);
        info!(tracker = self.tracker, "Logged in to tracker");
        Ok(())
    }
}

fn build_client(user_agent: &str, timeout: Duration, login_paths: &'static [&'static str]) -> Result<Client, TrackerError> {
    let policy = redirect::Policy::custom(move |attempt| {
        if is_login_url(attempt.url(), login_paths) {
            attempt.stop()
        } else if attempt.previous().len() >= MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else {
            attempt.follow()
        }
    });
    Ok(Client::builder()
        .cookie_store(true)
        .user_agent(user_agent)
        .timeout(timeout)
        .redirect(policy)
        .build()?)
}

fn is_login_url(url: &Url, login_paths: &[&str]) -> bool {
    login_paths.iter().any(|path| url.path().ends_with(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_login_url() {
        let paths: &[&str] = &["/takelogin.php", "/login.php"];
        assert!(is_login_url(&Url::parse("https://kinozal.tv/takelogin.php").unwrap(), paths));
        assert!(is_login_url(
            &Url::parse("https://rutracker.org/forum/login.php?redirect=x").unwrap(),
            paths
        ));
        assert!(!is_login_url(&Url::parse("https://kinozal.tv/details.php?id=1").unwrap(), paths));
    }

    #[tokio::test]
    async fn test_login_without_credentials_is_rejected() {
        let form = LoginForm {
            url: "https://kinozal.tv/takelogin.php".to_string(),
            fields: vec![],
            rejected: |_| false,
        };
        let http = TrackerHttp::new("kinozal", "test-agent", Duration::from_secs(5), &["/takelogin.php"], form, false)
            .unwrap();
        let err = http.relogin(http.login_epoch()).await.unwrap_err();
        assert!(matches!(err, TrackerError::InvalidCredentials { tracker: "kinozal" }));
        assert_eq!(http.login_epoch(), 0);
    }
}
