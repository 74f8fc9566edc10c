//! Tracker error types

use thiserror::Error;

use crate::error::ErrorClass;

/// Errors from tracker adapters and the registry
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("No tracker registered for '{0}'")]
    UnknownTracker(String),

    #[error("Invalid tracker URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("{tracker}: invalid credentials")]
    InvalidCredentials { tracker: &'static str },

    #[error("{tracker}: session expired")]
    AuthExpired { tracker: &'static str },

    #[error("hash is empty after {attempts} attempts")]
    IdentityNotFound { attempts: u32 },

    #[error("Response is not a torrent file: {0}")]
    NotAPayload(String),

    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl TrackerError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::UnknownTracker(_) | Self::InvalidUrl { .. } | Self::InvalidCredentials { .. } => {
                ErrorClass::Permanent
            }
            Self::AuthExpired { .. } => ErrorClass::AuthExpired,
            Self::IdentityNotFound { .. } | Self::NotAPayload(_) | Self::Parse(_) => ErrorClass::Tick,
            Self::Http { .. } | Self::Network(_) => ErrorClass::TransientNetwork,
        }
    }

    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthExpired { .. })
    }
}
