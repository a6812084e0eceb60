use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::config::{expandenv, CommonConfig, PathSet};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IdentityConfig {
    #[serde(default = "IdentityConfig::default_cookie_name")]
    pub cookie_name: String,

    /// HS256 secret of the session cookie. Empty disables cookie identities.
    #[serde(default = "String::new")]
    pub jwt_secret: String,

    #[serde(default = "IdentityConfig::default_username_claim")]
    pub username_claim: String,

    /// Header set by an authorizing gateway. Empty disables it.
    #[serde(default = "String::new")]
    pub trusted_header: String,
}

impl CommonConfig for IdentityConfig {
    fn default() -> Self {
        Self {
            cookie_name: Self::default_cookie_name(),
            jwt_secret: String::new(),
            username_claim: Self::default_username_claim(),
            trusted_header: String::new(),
        }
    }

    fn complete(&mut self, _ps: &PathSet) -> Result<()> {
        self.jwt_secret = expandenv("jwt_secret", &self.jwt_secret)?;
        self.trusted_header = self.trusted_header.trim().to_string();

        if !self.jwt_secret.is_empty() {
            if self.cookie_name.is_empty() {
                bail!("cookie_name is required when jwt_secret is set");
            }
            if self.username_claim.is_empty() {
                bail!("username_claim is required when jwt_secret is set");
            }
        }

        Ok(())
    }
}

impl IdentityConfig {
    fn default_cookie_name() -> String {
        String::from("s3bridge_session")
    }

    fn default_username_claim() -> String {
        String::from("logged_in_username")
    }
}
