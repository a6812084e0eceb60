use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Time-boxed credentials handed back to the caller. Field names follow the
/// provider's own wire names so the JSON can be fed to AWS tooling directly.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialBundle {
    #[serde(rename = "AccessKeyId")]
    pub access_key_id: String,

    #[serde(rename = "SecretAccessKey")]
    pub secret_access_key: String,

    #[serde(rename = "SessionToken")]
    pub session_token: String,

    #[serde(rename = "Expiration")]
    pub expiration: DateTime<Utc>,
}

impl CredentialBundle {
    /// Seconds left before expiry, zero once expired.
    pub fn expires_in(&self, now: u64) -> u64 {
        (self.expiration.timestamp().max(0) as u64).saturating_sub(now)
    }
}

// Secrets never reach the logs.
impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Query string of `GET /credentials`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialQuery {
    pub service: String,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,

    /// Requested lifetime in seconds.
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}
