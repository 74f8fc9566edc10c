//! Error classification shared by the tracker, download-client and store layers

use serde::{Deserialize, Serialize};

/// How a failure should be handled by whoever catches it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Network hiccup; try again on the next attempt or tick
    TransientNetwork,
    /// Session went stale; one re-authentication and retry is allowed
    AuthExpired,
    /// Will not succeed without operator action
    Permanent,
    /// Failed for this tick; the next natural tick retries
    Tick,
}

impl ErrorClass {
    pub fn is_permanent(self) -> bool {
        matches!(self, Self::Permanent)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TransientNetwork => "transient-network",
            Self::AuthExpired => "auth-expired",
            Self::Permanent => "permanent",
            Self::Tick => "tick",
        }
    }
}
