use anyhow::Result;
use async_trait::async_trait;
use clap::Args;
use s3bridge::types::service::{NewService, PermissionTier};

use super::{parse_users, ConfigArgs, LogArgs, RunCommand};

/// Register a service. Its role is provisioned right after the registry
/// entry is written; a provisioning failure is reported but keeps the entry.
#[derive(Args)]
pub struct AddArgs {
    /// Unique service name: letters, digits, '-' and '_'.
    pub name: String,

    /// Bucket patterns, comma separated. '*' matches any run of characters.
    #[arg(value_delimiter = ',', required = true)]
    pub patterns: Vec<String>,

    /// Permission tier granted on the matching buckets.
    #[arg(short, long, value_enum, default_value = "read-write")]
    pub permissions: PermissionTier,

    /// Only these users (comma separated) may use the service. Everyone
    /// verified may use it when omitted.
    #[arg(short, long)]
    pub restricted_users: Option<String>,

    /// Replace an existing service with the same name.
    #[arg(short, long)]
    pub force: bool,

    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(flatten)]
    pub log: LogArgs,
}

#[async_trait]
impl RunCommand for AddArgs {
    async fn run(&self) -> Result<()> {
        self.log.init("warn")?;
        let registry = self.config.open_registry().await?;

        let new = NewService {
            name: self.name.clone(),
            bucket_patterns: self.patterns.clone(),
            permission: self.permissions,
            restricted_users: self
                .restricted_users
                .as_deref()
                .map(parse_users)
                .unwrap_or_default(),
        };
        let result = registry.create(new, self.force).await;
        registry.close().await?;

        let report = result?;
        println!(
            "Service '{}' registered with role {}",
            report.service.name, report.service.role
        );
        if let Some(err) = report.provisioning_error {
            eprintln!("Warning: provision role failed: {err}");
        }
        Ok(())
    }
}
