use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::display::TerminalDisplay;
use crate::time::format_since;

/// Abstract privilege level of a service, resolved to concrete S3 actions by
/// [`crate::broker::tier::resolve_actions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionTier {
    ReadOnly,
    ReadWrite,
    Admin,
}

impl PermissionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadOnly => "read-only",
            Self::ReadWrite => "read-write",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for PermissionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionTier {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "read-only" => Ok(Self::ReadOnly),
            "read-write" => Ok(Self::ReadWrite),
            "admin" => Ok(Self::Admin),
            _ => bail!("unknown permission tier '{s}', expect one of read-only, read-write, admin"),
        }
    }
}

/// A registered service: which buckets it covers, at what tier, and who may
/// use it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub name: String,

    pub bucket_patterns: Vec<String>,

    pub permission: PermissionTier,

    /// Empty means any verified identity may use the service.
    #[serde(default)]
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub restricted_users: BTreeSet<String>,

    /// Reference of the role credentials are issued against.
    pub role: String,

    #[serde(default)]
    pub create_time: u64,

    #[serde(default)]
    pub update_time: u64,
}

impl ServiceDefinition {
    pub fn is_restricted(&self) -> bool {
        !self.restricted_users.is_empty()
    }

    /// Whether `user` passes the allow-list of this service.
    pub fn allows(&self, user: &str) -> bool {
        !self.is_restricted() || self.restricted_users.contains(user)
    }
}

/// Caller input for registering a service. The role reference is derived by
/// the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewService {
    pub name: String,

    pub bucket_patterns: Vec<String>,

    #[serde(default = "NewService::default_permission")]
    pub permission: PermissionTier,

    #[serde(default)]
    pub restricted_users: BTreeSet<String>,
}

impl NewService {
    pub fn default_permission() -> PermissionTier {
        PermissionTier::ReadWrite
    }
}

/// Field-level edit of a service. `None` leaves the field untouched; an empty
/// `restricted_users` set lifts the restriction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePatch {
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_patterns: Option<Vec<String>>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission: Option<PermissionTier>,

    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restricted_users: Option<BTreeSet<String>>,
}

impl ServicePatch {
    pub fn is_empty(&self) -> bool {
        self.bucket_patterns.is_none() && self.permission.is_none() && self.restricted_users.is_none()
    }
}

/// Health of a service computed by cross-checking the registry against the
/// provisioning layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceStatus {
    /// Both the registry entry and the role exist.
    Active,
    /// Registered, but the role is gone.
    MissingRole,
    /// A role exists with no registry entry.
    MissingConfig,
    /// Neither exists.
    Inactive,
}

impl ServiceStatus {
    pub fn from_presence(config: bool, role: bool) -> Self {
        match (config, role) {
            (true, true) => Self::Active,
            (true, false) => Self::MissingRole,
            (false, true) => Self::MissingConfig,
            (false, false) => Self::Inactive,
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::MissingRole => "missing-role",
            Self::MissingConfig => "missing-config",
            Self::Inactive => "inactive",
        };
        f.write_str(s)
    }
}

/// One row of a registry listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub name: String,

    pub status: ServiceStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<ServiceDefinition>,
}

impl TerminalDisplay for ServiceEntry {
    fn table_titles() -> Vec<&'static str> {
        vec!["Name", "Status", "Permission", "Buckets", "Restricted", "Update"]
    }

    fn table_row(self) -> Vec<String> {
        let status = self.status.to_string();
        match self.definition {
            Some(def) => {
                let restricted = if def.is_restricted() {
                    def.restricted_users.into_iter().collect::<Vec<_>>().join(",")
                } else {
                    String::from("<none>")
                };
                vec![
                    self.name,
                    status,
                    def.permission.to_string(),
                    def.bucket_patterns.join(","),
                    restricted,
                    format_since(def.update_time),
                ]
            }
            None => vec![
                self.name,
                status,
                String::from("-"),
                String::from("-"),
                String::from("-"),
                String::from("-"),
            ],
        }
    }
}
