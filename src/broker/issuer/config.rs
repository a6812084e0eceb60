use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::config::{expandenv, CommonConfig, PathSet};

use super::{Lifetime, MIN_DURATION_SECS};

/// Hard upper bound of the provider for role sessions.
const MAX_DURATION_SECS: u64 = 43200;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IssuerConfig {
    #[serde(default = "IssuerConfig::default_name")]
    pub name: IssuerType,

    /// Empty means the provider's default region chain.
    #[serde(default = "String::new")]
    pub region: String,

    #[serde(default = "String::new")]
    pub endpoint_url: String,

    #[serde(default = "IssuerConfig::default_duration_secs")]
    pub default_duration_secs: u64,

    #[serde(default = "IssuerConfig::default_duration_secs")]
    pub max_duration_secs: u64,

    #[serde(default = "IssuerConfig::default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "String::new")]
    pub session_prefix: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum IssuerType {
    #[serde(rename = "sts")]
    Sts,
    #[serde(rename = "local")]
    Local,
}

impl CommonConfig for IssuerConfig {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            region: String::new(),
            endpoint_url: String::new(),
            default_duration_secs: Self::default_duration_secs(),
            max_duration_secs: Self::default_duration_secs(),
            timeout_secs: Self::default_timeout_secs(),
            session_prefix: String::new(),
        }
    }

    fn complete(&mut self, _ps: &PathSet) -> Result<()> {
        self.region = expandenv("region", &self.region)?;
        self.endpoint_url = expandenv("endpoint_url", &self.endpoint_url)?;
        self.session_prefix = expandenv("session_prefix", &self.session_prefix)?;

        if self.default_duration_secs < MIN_DURATION_SECS {
            bail!("default_duration_secs must be at least {MIN_DURATION_SECS}");
        }
        if self.max_duration_secs < self.default_duration_secs {
            bail!("max_duration_secs must not be less than default_duration_secs");
        }
        if self.max_duration_secs > MAX_DURATION_SECS {
            bail!("max_duration_secs must not exceed {MAX_DURATION_SECS}");
        }
        if self.timeout_secs == 0 {
            bail!("timeout_secs must be greater than 0");
        }

        let invalid = self
            .session_prefix
            .chars()
            .any(|c| !(c.is_ascii_alphanumeric() || "+=,.@_-".contains(c)));
        if invalid {
            bail!("session_prefix '{}' contains invalid characters", self.session_prefix);
        }

        Ok(())
    }
}

impl IssuerConfig {
    fn default_name() -> IssuerType {
        IssuerType::Sts
    }

    fn default_duration_secs() -> u64 {
        3600
    }

    fn default_timeout_secs() -> u64 {
        10
    }

    pub fn lifetime(&self) -> Lifetime {
        Lifetime {
            default_secs: self.default_duration_secs,
            max_secs: self.max_duration_secs,
        }
    }
}
