use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as B64Engine;
use base64::Engine;
use chrono::DateTime;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng, RngCore};

use crate::time::current_timestamp;
use crate::types::credential::CredentialBundle;

use super::{CredentialIssuer, IssueRequest};

/// Mints random credentials for development and tests. They look like the
/// real thing but no provider will accept them.
pub struct LocalIssuer;

impl LocalIssuer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CredentialIssuer for LocalIssuer {
    async fn issue(&self, req: &IssueRequest) -> Result<CredentialBundle> {
        let mut rng = thread_rng();

        let key_id: String = (0..16)
            .map(|_| rng.sample(Alphanumeric) as char)
            .map(|c| c.to_ascii_uppercase())
            .collect();
        let secret: String = (0..40).map(|_| rng.sample(Alphanumeric) as char).collect();
        let mut token = [0u8; 96];
        rng.fill_bytes(&mut token);

        let expire_at = current_timestamp() + req.duration_secs;
        let expiration = DateTime::from_timestamp(expire_at as i64, 0)
            .ok_or_else(|| anyhow!("invalid expiration timestamp {expire_at}"))?;

        Ok(CredentialBundle {
            access_key_id: format!("ASIA{key_id}"),
            secret_access_key: secret,
            session_token: B64Engine.encode(token),
            expiration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_issue() {
        let issuer = LocalIssuer::new();
        let req = IssueRequest {
            role: String::from("arn:aws:iam::000000000000:role/service-role/a-s3-access-role"),
            policy: String::from("{}"),
            session_name: String::from("a-session-0"),
            duration_secs: 900,
        };

        let now = current_timestamp();
        let first = issuer.issue(&req).await.unwrap();
        let second = issuer.issue(&req).await.unwrap();

        assert!(first.access_key_id.starts_with("ASIA"));
        assert_eq!(first.access_key_id.len(), 20);
        assert_eq!(first.secret_access_key.len(), 40);
        assert!(!first.session_token.is_empty());
        assert_ne!(first.access_key_id, second.access_key_id);

        let left = first.expires_in(now);
        assert!((899..=901).contains(&left), "{left}");
    }
}
