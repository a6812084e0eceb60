use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sts::config::Region;
use aws_sdk_sts::error::DisplayErrorContext;
use aws_sdk_sts::Client;
use chrono::DateTime;
use log::debug;

use crate::types::credential::CredentialBundle;

use super::config::IssuerConfig;
use super::{CredentialIssuer, IssueRequest};

/// Issues credentials through STS `AssumeRole`, passing the policy document
/// as the inline session policy.
pub struct StsIssuer {
    client: Client,
}

impl StsIssuer {
    pub async fn new(cfg: &IssuerConfig) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if !cfg.region.is_empty() {
            loader = loader.region(Region::new(cfg.region.clone()));
        }
        if !cfg.endpoint_url.is_empty() {
            loader = loader.endpoint_url(&cfg.endpoint_url);
        }
        let sdk_config = loader.load().await;
        Ok(Self {
            client: Client::new(&sdk_config),
        })
    }
}

#[async_trait]
impl CredentialIssuer for StsIssuer {
    async fn issue(&self, req: &IssueRequest) -> Result<CredentialBundle> {
        let duration = i32::try_from(req.duration_secs).context("duration out of range")?;
        debug!(
            "STS assume role {} as {} for {duration}s",
            req.role, req.session_name
        );

        let output = self
            .client
            .assume_role()
            .role_arn(&req.role)
            .role_session_name(&req.session_name)
            .policy(&req.policy)
            .duration_seconds(duration)
            .send()
            .await
            .map_err(|err| anyhow!("assume role '{}': {}", req.role, DisplayErrorContext(&err)))?;

        let credentials = output
            .credentials()
            .ok_or_else(|| anyhow!("assume role '{}': no credentials in response", req.role))?;
        let expiration = credentials.expiration();
        let expiration = DateTime::from_timestamp(expiration.secs(), expiration.subsec_nanos())
            .ok_or_else(|| anyhow!("invalid expiration {expiration:?} in response"))?;

        Ok(CredentialBundle {
            access_key_id: credentials.access_key_id().to_string(),
            secret_access_key: credentials.secret_access_key().to_string(),
            session_token: credentials.session_token().to_string(),
            expiration,
        })
    }
}
