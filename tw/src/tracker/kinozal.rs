//! kinozal.tv adapter

use async_trait::async_trait;
use reqwest::Url;
use scraper::Html;
use tracing::debug;

use super::html::{all_texts, first_text, page_title};
use super::http::{LoginForm, TrackerHttp};
use super::payload::validate_payload;
use super::retry::{Relogin, with_relogin};
use super::{PageIdentity, TrackerClient, TrackerError, TrackerSettings};
use crate::domain::RemoteIdentity;

const NAME: &str = "kinozal";
const HOSTS: &[&str] = &["kinozal.tv"];
const BASE_URL: &str = "https://kinozal.tv";
const LOGIN_PATHS: &[&str] = &["/takelogin.php", "/login.php"];
const HASH_MARKER: &str = "Инфо хеш:";
const WRONG_PASSWORD: &str = "Неверно указан пароль для имени";

pub struct KinozalTracker {
    http: TrackerHttp,
    max_attempts: u32,
}

impl KinozalTracker {
    pub fn new(settings: &TrackerSettings, username: &str, password: &str) -> Result<Self, TrackerError> {
        Self::with_base_url(settings, BASE_URL, username, password)
    }

    /// Adapter whose login form posts to `base_url` instead of kinozal.tv
    pub fn with_base_url(
        settings: &TrackerSettings,
        base_url: &str,
        username: &str,
        password: &str,
    ) -> Result<Self, TrackerError> {
        debug!(%base_url, %username, "KinozalTracker::with_base_url: called");
        let form = LoginForm {
            url: format!("{base_url}/takelogin.php"),
            fields: vec![
                ("username", username.to_string()),
                ("password", password.to_string()),
                ("returnto", String::new()),
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
}

#[async_trait]
impl TrackerClient for KinozalTracker {
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
        debug!("KinozalTracker::authenticate: called");
        self.http.relogin(self.http.login_epoch()).await
    }

    async fn fetch_identity(&self, url: &str) -> Result<PageIdentity, TrackerError> {
        debug!(%url, "KinozalTracker::fetch_identity: called");
        let details = details_url(url)?;
        with_relogin(
            &self.http,
            self.max_attempts,
            "kinozal identity",
            |attempts| TrackerError::IdentityNotFound { attempts },
            || async {
                let html = self.http.get_text(&details, Some(url)).await?;
                Ok::<_, TrackerError>(parse_details(&html))
            },
        )
        .await
    }

    async fn fetch_display_name(&self, url: &str) -> Result<String, TrackerError> {
        debug!(%url, "KinozalTracker::fetch_display_name: called");
        let html = self.http.get_text(url, None).await?;
        parse_title(&html).ok_or_else(|| TrackerError::Parse(format!("no title on {url}")))
    }

    async fn fetch_payload(&self, url: &str) -> Result<Vec<u8>, TrackerError> {
        debug!(%url, "KinozalTracker::fetch_payload: called");
        let download = download_url(url)?;
        with_relogin(
            &self.http,
            self.max_attempts,
            "kinozal payload",
            |_| TrackerError::NotAPayload(format!("no torrent at {download}")),
            || async {
                let body = self.http.get_bytes(&download, Some(url)).await?;
                match validate_payload(body) {
                    Ok(payload) => Ok::<_, TrackerError>(Some(payload)),
                    Err(TrackerError::NotAPayload(reason)) => {
                        debug!(%reason, "KinozalTracker::fetch_payload: rejected body");
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            },
        )
        .await
    }
}

fn release_id(page_url: &str) -> Result<(Url, String), TrackerError> {
    let url = Url::parse(page_url).map_err(|e| TrackerError::InvalidUrl {
        url: page_url.to_string(),
        reason: e.to_string(),
    })?;
    let id = url
        .query_pairs()
        .find(|(key, _)| key == "id")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| TrackerError::InvalidUrl {
            url: page_url.to_string(),
            reason: "missing numeric id parameter".to_string(),
        })?;
    Ok((url, id))
}

/// Page listing the info-hash for a release
pub(crate) fn details_url(page_url: &str) -> Result<String, TrackerError> {
    let (url, id) = release_id(page_url)?;
    Ok(format!(
        "{}/get_srv_details.php?id={id}&action=2",
        url.origin().ascii_serialization()
    ))
}

/// The torrent file lives on the `dl.` subdomain
pub(crate) fn download_url(page_url: &str) -> Result<String, TrackerError> {
    let (url, id) = release_id(page_url)?;
    let host = url.host_str().unwrap_or("kinozal.tv");
    let host = host.strip_prefix("www.").unwrap_or(host);
    Ok(format!("{}://dl.{host}/download.php?id={id}", url.scheme()))
}

/// Info-hash and torrent name from the details fragment; `None` when the
/// hash is missing, which usually means the session is anonymous.
pub(crate) fn parse_details(html: &str) -> Option<PageIdentity> {
    let document = Html::parse_document(html);
    let identity = all_texts(&document, "li").into_iter().find_map(|text| {
        let (_, rest) = text.split_once(HASH_MARKER)?;
        RemoteIdentity::parse(rest.split_whitespace().next()?).ok()
    })?;
    let display_name = first_text(&document, "div.b").unwrap_or_default();
    Some(PageIdentity { identity, display_name })
}

pub(crate) fn parse_title(html: &str) -> Option<String> {
    page_title(&Html::parse_document(html))
}

fn login_rejected(body: &str) -> bool {
    let document = Html::parse_document(body);
    all_texts(&document, "div.red")
        .iter()
        .any(|text| text.contains(WRONG_PASSWORD))
}
