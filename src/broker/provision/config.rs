use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::config::{expandenv, CommonConfig, PathSet};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvisionConfig {
    #[serde(default = "ProvisionConfig::default_name")]
    pub name: ProvisionType,

    /// Account the roles live in.
    #[serde(default = "ProvisionConfig::default_account_id")]
    pub account_id: String,

    #[serde(default = "ProvisionConfig::default_role_path")]
    pub role_path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionType {
    #[serde(rename = "local")]
    Local,
}

impl CommonConfig for ProvisionConfig {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            account_id: Self::default_account_id(),
            role_path: Self::default_role_path(),
        }
    }

    fn complete(&mut self, _ps: &PathSet) -> Result<()> {
        self.account_id = expandenv("account_id", &self.account_id)?;
        if self.account_id.len() != 12 || !self.account_id.chars().all(|c| c.is_ascii_digit()) {
            bail!(
                "account_id must be 12 digits, found '{}'",
                self.account_id
            );
        }

        self.role_path = expandenv("role_path", &self.role_path)?;
        self.role_path = self.role_path.trim_matches('/').to_string();

        Ok(())
    }
}

impl ProvisionConfig {
    fn default_name() -> ProvisionType {
        ProvisionType::Local
    }

    fn default_account_id() -> String {
        String::from("000000000000")
    }

    fn default_role_path() -> String {
        String::from("service-role")
    }
}

#[cfg(test)]
mod tests {
    use crate::config::tests::temp_path_set;

    use super::*;

    #[test]
    fn test_complete() {
        let ps = temp_path_set("provision-config");

        let mut cfg = ProvisionConfig::default();
        cfg.role_path = String::from("/team/brokers/");
        cfg.complete(&ps).unwrap();
        assert_eq!(cfg.role_path, "team/brokers");

        for bad in ["", "12345", "12345678901a", "1234567890123"] {
            let mut cfg = ProvisionConfig::default();
            cfg.account_id = bad.to_string();
            assert!(cfg.complete(&ps).is_err(), "{bad:?}");
        }
    }
}
