pub mod config;
pub mod factory;
pub mod local;
pub mod sts;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::credential::CredentialBundle;

/// Shortest lifetime the provider accepts for temporary credentials.
pub const MIN_DURATION_SECS: u64 = 900;

/// Longest session name the provider accepts.
const MAX_SESSION_NAME_LEN: usize = 64;

/// Input of one token exchange.
#[derive(Debug, Clone)]
pub struct IssueRequest {
    /// Role the credentials are issued against.
    pub role: String,

    /// JSON policy document narrowing the role's permissions.
    pub policy: String,

    pub session_name: String,

    pub duration_secs: u64,
}

/// Thin adapter over the provider's temporary-credential primitive.
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    async fn issue(&self, req: &IssueRequest) -> Result<CredentialBundle>;
}

/// Lifetime bounds applied to every request before it reaches the issuer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifetime {
    pub default_secs: u64,
    pub max_secs: u64,
}

impl Lifetime {
    /// The requested lifetime, or the default, clamped into
    /// `[MIN_DURATION_SECS, max_secs]`.
    pub fn bound(&self, requested: Option<u64>) -> u64 {
        let secs = requested.unwrap_or(self.default_secs);
        secs.clamp(MIN_DURATION_SECS, self.max_secs.max(MIN_DURATION_SECS))
    }
}

/// Session name in the form `{prefix}{service}-session-{unix}`, cut to the
/// provider's length limit.
pub fn session_name(prefix: &str, service: &str, now: u64) -> String {
    let mut name = format!("{prefix}{service}-session-{now}");
    if name.len() > MAX_SESSION_NAME_LEN {
        // Names are ASCII, enforced by config and registry validation.
        name.truncate(MAX_SESSION_NAME_LEN);
    }
    name
}
