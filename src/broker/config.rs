use std::collections::BTreeSet;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::{expandenv, CommonConfig, PathSet};

use super::db::config::DbConfig;
use super::identity::config::IdentityConfig;
use super::issuer::config::IssuerConfig;
use super::provision::config::ProvisionConfig;
use super::registry::{normalize_users, validate_name, AdminService};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BrokerConfig {
    #[serde(default = "BrokerConfig::default_bind")]
    pub bind: String,

    #[serde(default = "BrokerConfig::default_ssl")]
    pub ssl: bool,

    #[serde(default = "BrokerConfig::default_cert_path")]
    pub cert_path: String,

    #[serde(default = "BrokerConfig::default_key_path")]
    pub key_path: String,

    #[serde(default = "BrokerConfig::default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    #[serde(default = "BrokerConfig::default_workers")]
    pub workers: u64,

    #[serde(default = "AdminConfig::default")]
    pub admin: AdminConfig,

    #[serde(default = "RegistryConfig::default")]
    pub registry: RegistryConfig,

    #[serde(default = "DbConfig::default")]
    pub db: DbConfig,

    #[serde(default = "IdentityConfig::default")]
    pub identity: IdentityConfig,

    #[serde(default = "IssuerConfig::default")]
    pub issuer: IssuerConfig,

    #[serde(default = "ProvisionConfig::default")]
    pub provision: ProvisionConfig,
}

impl CommonConfig for BrokerConfig {
    fn default() -> Self {
        Self {
            bind: Self::default_bind(),
            ssl: Self::default_ssl(),
            cert_path: Self::default_cert_path(),
            key_path: Self::default_key_path(),
            keep_alive_secs: Self::default_keep_alive_secs(),
            workers: Self::default_workers(),
            admin: AdminConfig::default(),
            registry: RegistryConfig::default(),
            db: DbConfig::default(),
            identity: IdentityConfig::default(),
            issuer: IssuerConfig::default(),
            provision: ProvisionConfig::default(),
        }
    }

    fn complete(&mut self, ps: &PathSet) -> Result<()> {
        self.bind = expandenv("bind", &self.bind)?;
        if self.bind.is_empty() {
            bail!("bind cannot be empty");
        }

        self.cert_path = expandenv("cert_path", &self.cert_path)?;
        if self.cert_path.is_empty() {
            let path = ps.pki_path.join("server.crt");
            self.cert_path = format!("{}", path.display());
        }

        self.key_path = expandenv("key_path", &self.key_path)?;
        if self.key_path.is_empty() {
            let path = ps.pki_path.join("server.key");
            self.key_path = format!("{}", path.display());
        }

        self.admin.complete(ps).context("admin")?;
        self.registry.complete(ps).context("registry")?;
        self.db.complete(ps).context("db")?;
        self.identity.complete(ps).context("identity")?;
        self.issuer.complete(ps).context("issuer")?;
        self.provision.complete(ps).context("provision")?;

        Ok(())
    }
}

impl BrokerConfig {
    pub fn default_bind() -> String {
        String::from("127.0.0.1:7880")
    }

    pub fn default_ssl() -> bool {
        false
    }

    pub fn default_cert_path() -> String {
        String::new()
    }

    pub fn default_key_path() -> String {
        String::new()
    }

    pub fn default_keep_alive_secs() -> u64 {
        0
    }

    pub fn default_workers() -> u64 {
        0
    }
}

/// The admin-catchall service and who may use it.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AdminConfig {
    #[serde(default = "AdminConfig::default_service")]
    pub service: String,

    #[serde(default = "AdminConfig::default_users")]
    pub users: BTreeSet<String>,
}

impl CommonConfig for AdminConfig {
    fn default() -> Self {
        Self {
            service: Self::default_service(),
            users: Self::default_users(),
        }
    }

    fn complete(&mut self, _ps: &PathSet) -> Result<()> {
        self.service = expandenv("service", &self.service)?;
        validate_name(&self.service).context("service")?;

        self.users = normalize_users(&self.users).context("users")?;
        if self.users.is_empty() {
            bail!("users cannot be empty");
        }

        Ok(())
    }
}

impl AdminConfig {
    pub fn default_service() -> String {
        String::from("universal")
    }

    pub fn default_users() -> BTreeSet<String> {
        [String::from("admin")].into()
    }

    pub fn admin_service(&self) -> AdminService {
        AdminService {
            name: self.service.clone(),
            users: self.users.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RegistryConfig {
    #[serde(default = "RegistryConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl CommonConfig for RegistryConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Self::default_timeout_secs(),
        }
    }

    fn complete(&mut self, _ps: &PathSet) -> Result<()> {
        if self.timeout_secs == 0 {
            bail!("timeout_secs must be greater than 0");
        }
        Ok(())
    }
}

impl RegistryConfig {
    pub fn default_timeout_secs() -> u64 {
        5
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
