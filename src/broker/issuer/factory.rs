use std::sync::Arc;

use anyhow::Result;
use log::{info, warn};

use super::config::{IssuerConfig, IssuerType};
use super::local::LocalIssuer;
use super::sts::StsIssuer;
use super::CredentialIssuer;

pub struct IssuerFactory;

impl IssuerFactory {
    pub fn new() -> Self {
        Self
    }

    pub async fn build_issuer(&self, cfg: &IssuerConfig) -> Result<Arc<dyn CredentialIssuer>> {
        match cfg.name {
            IssuerType::Sts => {
                info!("Using STS credential issuer");
                let issuer = StsIssuer::new(cfg).await?;
                Ok(Arc::new(issuer))
            }
            IssuerType::Local => {
                warn!("Using local credential issuer, issued credentials are NOT valid against any provider");
                Ok(Arc::new(LocalIssuer::new()))
            }
        }
    }
}
