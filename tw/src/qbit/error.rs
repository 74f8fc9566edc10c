//! Download-client error types

use thiserror::Error;

use crate::error::ErrorClass;

#[derive(Debug, Error)]
pub enum DownloadClientError {
    #[error("qBittorrent session expired")]
    AuthExpired,

    #[error("qBittorrent rejected the session again after re-login")]
    AuthRejected,

    #[error("qBittorrent rejected the credentials")]
    InvalidCredentials,

    #[error("Torrent {0} not found in qBittorrent")]
    NotFound(String),

    #[error("qBittorrent refused the request: {0}")]
    Rejected(String),

    #[error("HTTP {status} from qBittorrent {endpoint}")]
    Http { status: u16, endpoint: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid qBittorrent URL: {0}")]
    InvalidUrl(String),
}

impl DownloadClientError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::AuthExpired => ErrorClass::AuthExpired,
            Self::AuthRejected | Self::InvalidCredentials | Self::InvalidUrl(_) => ErrorClass::Permanent,
            Self::NotFound(_) | Self::Rejected(_) => ErrorClass::Tick,
            Self::Http { .. } | Self::Network(_) => ErrorClass::TransientNetwork,
        }
    }

    /// Authorization failures, first or repeated
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AuthExpired | Self::AuthRejected | Self::InvalidCredentials)
    }
}
