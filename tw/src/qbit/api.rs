//! qBittorrent Web API v2 transport

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::REFERER;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use super::DownloadClientError;
use crate::domain::RemoteIdentity;

/// Torrent row from `/api/v2/torrents/info`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TorrentInfo {
    pub hash: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub save_path: String,
}

/// Raw API calls. Authorization failures come back as `AuthExpired`; retry
/// policy belongs to [`super::QbitSession`].
#[async_trait]
pub trait QbitApi: Send + Sync {
    async fn login(&self) -> Result<(), DownloadClientError>;

    /// Cheap authenticated call used to check the session
    async fn probe(&self) -> Result<(), DownloadClientError>;

    async fn torrents(&self) -> Result<Vec<TorrentInfo>, DownloadClientError>;

    async fn add_file(
        &self,
        identity: &RemoteIdentity,
        save_path: &str,
        payload: &[u8],
    ) -> Result<(), DownloadClientError>;

    async fn add_url(&self, url: &str, save_path: &str) -> Result<(), DownloadClientError>;

    async fn delete(&self, identity: &RemoteIdentity, delete_files: bool) -> Result<(), DownloadClientError>;
}

/// [`QbitApi`] over HTTP with a cookie-held SID
pub struct HttpQbitApi {
    base: Url,
    username: String,
    password: String,
    client: Client,
}

impl HttpQbitApi {
    pub fn new(base_url: &str, username: &str, password: &str, timeout: Duration) -> Result<Self, DownloadClientError> {
        debug!(%base_url, "HttpQbitApi::new: called");
        let mut base =
            Url::parse(base_url).map_err(|e| DownloadClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = Client::builder().cookie_store(true).timeout(timeout).build()?;
        Ok(Self {
            base,
            username: username.to_string(),
            password: password.to_string(),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, DownloadClientError> {
        self.base
            .join(path)
            .map_err(|e| DownloadClientError::InvalidUrl(format!("{path}: {e}")))
    }

    /// qBittorrent checks Referer against its own origin
    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(REFERER, self.base.as_str())
    }

    async fn send(&self, path: &str, builder: RequestBuilder) -> Result<Response, DownloadClientError> {
        let response = self.request(builder).send().await?;
        match response.status() {
            StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => Err(DownloadClientError::AuthExpired),
            status if status.is_success() => Ok(response),
            status => Err(DownloadClientError::Http {
                status: status.as_u16(),
                endpoint: path.to_string(),
            }),
        }
    }

    /// qBittorrent answers 200 with `Fails.` for rejected adds
    async fn expect_ok_body(path: &str, response: Response) -> Result<(), DownloadClientError> {
        let body = response.text().await?;
        if body.trim() == "Fails." {
            return Err(DownloadClientError::Rejected(format!("{path}: {}", body.trim())));
        }
        Ok(())
    }
}

#[async_trait]
impl QbitApi for HttpQbitApi {
    async fn login(&self) -> Result<(), DownloadClientError> {
        debug!(username = %self.username, "HttpQbitApi::login: called");
        let path = "api/v2/auth/login";
        let response = self
            .request(self.client.post(self.endpoint(path)?))
            .form(&[("username", self.username.as_str()), ("password", self.password.as_str())])
            .send()
            .await?;
        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            // Too many failed attempts; qBittorrent bans the client IP
            return Err(DownloadClientError::InvalidCredentials);
        }
        if !status.is_success() {
            return Err(DownloadClientError::Http {
                status: status.as_u16(),
                endpoint: path.to_string(),
            });
        }
        let body = response.text().await?;
        if body.trim() == "Fails." {
            return Err(DownloadClientError::InvalidCredentials);
        }
        Ok(())
    }

    async fn probe(&self) -> Result<(), DownloadClientError> {
        let path = "api/v2/app/version";
        self.send(path, self.client.get(self.endpoint(path)?)).await?;
        Ok(())
    }

    async fn torrents(&self) -> Result<Vec<TorrentInfo>, DownloadClientError> {
        let path = "api/v2/torrents/info";
        let url = self.endpoint(path)?;
        let response = self.send(path, self.client.get(url).query(&[("filter", "all")])).await?;
        Ok(response.json().await?)
    }

    async fn add_file(
        &self,
        identity: &RemoteIdentity,
        save_path: &str,
        payload: &[u8],
    ) -> Result<(), DownloadClientError> {
        debug!(%identity, %save_path, bytes = payload.len(), "HttpQbitApi::add_file: called");
        let path = "api/v2/torrents/add";
        let part = Part::bytes(payload.to_vec())
            .file_name(format!("{identity}.torrent"))
            .mime_str("application/x-bittorrent")?;
        let form = Form::new()
            .part("torrents", part)
            .text("savepath", save_path.to_string())
            .text("autoTMM", "false");
        let response = self.send(path, self.client.post(self.endpoint(path)?).multipart(form)).await?;
        Self::expect_ok_body(path, response).await
    }

    async fn add_url(&self, url: &str, save_path: &str) -> Result<(), DownloadClientError> {
        debug!(%url, %save_path, "HttpQbitApi::add_url: called");
        let path = "api/v2/torrents/add";
        let form = Form::new()
            .text("urls", url.to_string())
            .text("savepath", save_path.to_string())
            .text("autoTMM", "false");
        let response = self.send(path, self.client.post(self.endpoint(path)?).multipart(form)).await?;
        Self::expect_ok_body(path, response).await
    }

    async fn delete(&self, identity: &RemoteIdentity, delete_files: bool) -> Result<(), DownloadClientError> {
        debug!(%identity, delete_files, "HttpQbitApi::delete: called");
        let path = "api/v2/torrents/delete";
        let builder = self.client.post(self.endpoint(path)?).form(&[
            ("hashes", identity.as_str()),
            ("deleteFiles", if delete_files { "true" } else { "false" }),
        ]);
        self.send(path, builder).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_base() {
        let api = HttpQbitApi::new("http://localhost:8080/", "admin", "secret", Duration::from_secs(5)).unwrap();
        assert_eq!(
            api.endpoint("api/v2/torrents/info").unwrap().as_str(),
            "http://localhost:8080/api/v2/torrents/info"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let api = HttpQbitApi::new("https://box.lan/qbt", "admin", "secret", Duration::from_secs(5)).unwrap();
        assert_eq!(
            api.endpoint("api/v2/app/version").unwrap().as_str(),
            "https://box.lan/qbt/api/v2/app/version"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpQbitApi::new("not a url", "a", "b", Duration::from_secs(5)),
            Err(DownloadClientError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_torrent_info_deserializes_subset() {
        let json = r#"[{"hash":"ABC","name":"x","save_path":"/data/x","size":10,"state":"uploading"}]"#;
        let rows: Vec<TorrentInfo> = serde_json::from_str(json).unwrap();
        assert_eq!(rows[0].save_path, "/data/x");
    }

    mod over_http {
        use super::*;
        use crate::http_fixture::{CannedServer, response};
        use crate::qbit::{DownloadClient, QbitSession};

        const HASH: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

        fn api(server: &CannedServer) -> HttpQbitApi {
            HttpQbitApi::new(server.base(), "admin", "secret", Duration::from_secs(5)).unwrap()
        }

        fn torrents_json() -> String {
            format!(r#"[{{"hash":"{HASH}","name":"Show","save_path":"/data/x"}}]"#)
        }

        #[tokio::test]
        async fn test_unauthorized_and_forbidden_are_auth_expired() {
            let server = CannedServer::start(vec![
                response("401 Unauthorized", &[], ""),
                response("403 Forbidden", &[], "Forbidden"),
            ])
            .await;
            let api = api(&server);

            assert!(matches!(api.probe().await, Err(DownloadClientError::AuthExpired)));
            assert!(matches!(api.torrents().await, Err(DownloadClientError::AuthExpired)));
        }

        #[tokio::test]
        async fn test_login_fails_body_is_invalid_credentials() {
            let server = CannedServer::start(vec![response("200 OK", &[], "Fails.")]).await;

            let err = api(&server).login().await.unwrap_err();

            assert!(matches!(err, DownloadClientError::InvalidCredentials));
            assert_eq!(server.requests(), vec!["POST /api/v2/auth/login"]);
        }

        #[tokio::test]
        async fn test_session_relogs_once_after_forbidden() {
            let server = CannedServer::start(vec![
                response("200 OK", &[], "v4.6.0"),
                response("403 Forbidden", &[], "Forbidden"),
                response("200 OK", &[("Set-Cookie", "SID=abc; path=/")], "Ok."),
                response("200 OK", &[("Content-Type", "application/json")], &torrents_json()),
            ])
            .await;
            let session = QbitSession::new(api(&server));

            let entries = session.list_entries().await.unwrap();

            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].remote_identity.as_str(), HASH);
            assert_eq!(entries[0].save_path, "/data/x");
            assert_eq!(
                server.requests(),
                vec![
                    "GET /api/v2/app/version",
                    "GET /api/v2/torrents/info?filter=all",
                    "POST /api/v2/auth/login",
                    "GET /api/v2/torrents/info?filter=all",
                ]
            );
        }

        #[tokio::test]
        async fn test_session_forbidden_after_relogin_is_rejected() {
            let server = CannedServer::start(vec![
                response("200 OK", &[], "v4.6.0"),
                response("403 Forbidden", &[], ""),
                response("200 OK", &[], "Ok."),
                response("403 Forbidden", &[], ""),
            ])
            .await;
            let session = QbitSession::new(api(&server));

            let err = session.list_entries().await.unwrap_err();

            assert!(matches!(err, DownloadClientError::AuthRejected));
            assert_eq!(server.requests().len(), 4);
        }

        #[tokio::test]
        async fn test_session_bad_password_is_invalid_credentials() {
            let server = CannedServer::start(vec![
                response("403 Forbidden", &[], ""),
                response("200 OK", &[], "Fails."),
            ])
            .await;
            let session = QbitSession::new(api(&server));

            let err = session.list_entries().await.unwrap_err();

            assert!(matches!(err, DownloadClientError::InvalidCredentials));
            assert_eq!(
                server.requests(),
                vec!["GET /api/v2/app/version", "POST /api/v2/auth/login"]
            );
        }
    }
}
