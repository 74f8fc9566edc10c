//! RemoteIdentity - normalized torrent info-hash

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Hex length of a BitTorrent v1 info-hash (SHA-1)
const V1_LEN: usize = 40;
/// Hex length of a BitTorrent v2 info-hash (SHA-256)
const V2_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("identity is empty")]
    Empty,

    #[error("identity '{0}' is not a 40 or 64 character hex digest")]
    Malformed(String),
}

/// Content hash identifying one revision of a payload
///
/// Always lowercase hex. Comparisons between tracker pages and the download
/// client go through this type, so case differences never cause false drift.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemoteIdentity(String);

impl RemoteIdentity {
    pub fn parse(raw: &str) -> Result<Self, IdentityError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(IdentityError::Empty);
        }
        let valid_len = trimmed.len() == V1_LEN || trimmed.len() == V2_LEN;
        if !valid_len || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(IdentityError::Malformed(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Magnet URI carrying only the hash
    pub fn magnet(&self) -> String {
        format!("magnet:?xt=urn:btih:{}", self.0)
    }
}

impl fmt::Display for RemoteIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RemoteIdentity {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RemoteIdentity> for String {
    fn from(value: RemoteIdentity) -> Self {
        value.0
    }
}
