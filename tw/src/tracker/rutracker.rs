//! rutracker.org adapter

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Url;
use scraper::Html;
use tracing::debug;

use super::html::first_text;
use super::http::{LoginForm, TrackerHttp};
use super::payload::{info_hash, validate_payload};
use super::retry::{Relogin, with_relogin};
use super::{PageIdentity, TrackerClient, TrackerError, TrackerSettings};
use crate::domain::RemoteIdentity;

const NAME: &str = "rutracker";
const HOSTS: &[&str] = &["rutracker.org"];
const BASE_URL: &str = "https://rutracker.org";
const LOGIN_PATHS: &[&str] = &["/forum/login.php"];
const WRONG_PASSWORD: &str = "неверный пароль";
const UNKNOWN_TITLE: &str = "Unknown RuTracker Torrent";

static MAGNET_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"href="magnet:\?xt=urn:btih:([A-Fa-f0-9]+)[&"]"#).ok());

pub struct RuTrackerTracker {
    http: TrackerHttp,
    max_attempts: u32,
}

impl RuTrackerTracker {
    pub fn new(settings: &TrackerSettings, username: &str, password: &str) -> Result<Self, TrackerError> {
        debug!(%username, "RuTrackerTracker::new: called");
        let form = LoginForm {
            url: format!("{BASE_URL}/forum/login.php"),
            fields: vec![
                ("login_username", username.to_string()),
                ("login_password", password.to_string()),
                ("login", "Login".to_string()),
            ],
            rejected: login_rejected,
        };
        let http = TrackerHttp::new(
            NAME,
            &settings.user_agent,
            settings.timeout,
            LOGIN_PATHS,
            form,
            !username.is_empty(),
        )?;
        Ok(Self {
            http,
            max_attempts: settings.max_identity_attempts,
        })
    }

    /// One download attempt; `None` when the body is not a torrent
    async fn try_download(&self, page_url: &str, download: &str) -> Result<Option<Vec<u8>>, TrackerError> {
        let body = self.http.get_bytes(download, Some(page_url)).await?;
        match validate_payload(body) {
            Ok(payload) => Ok(Some(payload)),
            Err(TrackerError::NotAPayload(reason)) => {
                debug!(%reason, "RuTrackerTracker::try_download: rejected body");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl TrackerClient for RuTrackerTracker {
    fn name(&self) -> &'static str {
        NAME
    }

    fn hosts(&self) -> &'static [&'static str] {
        HOSTS
    }

    fn has_credentials(&self) -> bool {
        self.http.has_credentials()
    }

    async fn authenticate(&self) -> Result<(), TrackerError> {
        debug!("RuTrackerTracker::authenticate: called");
        self.http.relogin(self.http.login_epoch()).await
    }

    async fn fetch_identity(&self, url: &str) -> Result<PageIdentity, TrackerError> {
        debug!(%url, "RuTrackerTracker::fetch_identity: called");
        let (origin, topic) = topic_id(url)?;
        let download = download_url(&origin, &topic);
        with_relogin(
            &self.http,
            self.max_attempts,
            "rutracker identity",
            |attempts| TrackerError::IdentityNotFound { attempts },
            || async {
                let html = self.http.get_text(url, None).await?;
                let display_name = parse_title(&html, &topic);
                if let Some(identity) = parse_magnet(&html) {
                    return Ok(Some(PageIdentity { identity, display_name }));
                }
                // No magnet link on the page: hash the torrent itself
                debug!(%url, "RuTrackerTracker::fetch_identity: no magnet, hashing payload");
                match self.try_download(url, &download).await? {
                    Some(payload) => Ok(Some(PageIdentity {
                        identity: info_hash(&payload)?,
                        display_name,
                    })),
                    None => Ok(None),
                }
            },
        )
        .await
    }

    async fn fetch_display_name(&self, url: &str) -> Result<String, TrackerError> {
        debug!(%url, "RuTrackerTracker::fetch_display_name: called");
        let (_, topic) = topic_id(url)?;
        let html = self.http.get_text(url, None).await?;
        Ok(parse_title(&html, &topic))
    }

    async fn fetch_payload(&self, url: &str) -> Result<Vec<u8>, TrackerError> {
        debug!(%url, "RuTrackerTracker::fetch_payload: called");
        let (origin, topic) = topic_id(url)?;
        let download = download_url(&origin, &topic);
        with_relogin(
            &self.http,
            self.max_attempts,
            "rutracker payload",
            |_| TrackerError::NotAPayload(format!("no torrent at {download}")),
            || self.try_download(url, &download),
        )
        .await
    }
}

/// Origin and topic id (`t` parameter) of a topic URL
fn topic_id(page_url: &str) -> Result<(String, String), TrackerError> {
    let url = Url::parse(page_url).map_err(|e| TrackerError::InvalidUrl {
        url: page_url.to_string(),
        reason: e.to_string(),
    })?;
    let topic = url
        .query_pairs()
        .find(|(key, _)| key == "t")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| TrackerError::InvalidUrl {
            url: page_url.to_string(),
            reason: "missing numeric t parameter".to_string(),
        })?;
    Ok((url.origin().ascii_serialization(), topic))
}

pub(crate) fn download_url(origin: &str, topic: &str) -> String {
    format!("{origin}/forum/dl.php?t={topic}")
}

pub(crate) fn parse_magnet(html: &str) -> Option<RemoteIdentity> {
    let re = MAGNET_RE.as_ref()?;
    let captures = re.captures(html)?;
    RemoteIdentity::parse(captures.get(1)?.as_str()).ok()
}

/// Topic title, falling back to the heading, then a synthetic name
pub(crate) fn parse_title(html: &str, topic: &str) -> String {
    let document = Html::parse_document(html);
    first_text(&document, "h1.maintitle a#topic-title")
        .or_else(|| first_text(&document, "h1.maintitle"))
        .unwrap_or_else(|| {
            if topic.is_empty() {
                UNKNOWN_TITLE.to_string()
            } else {
                format!("RuTracker Topic #{topic}")
            }
        })
}

fn login_rejected(body: &str) -> bool {
    body.to_lowercase().contains(WRONG_PASSWORD)
}
