use anyhow::Result;
use async_trait::async_trait;
use clap::Args;
use s3bridge::types::service::{PermissionTier, ServicePatch};

use super::{parse_users, ConfigArgs, LogArgs, RunCommand};

/// Edit fields of a registered service. Fields not given stay unchanged.
#[derive(Args)]
pub struct EditArgs {
    pub name: String,

    /// New bucket patterns, comma separated.
    #[arg(short, long, value_delimiter = ',')]
    pub bucket_patterns: Option<Vec<String>>,

    #[arg(short, long, value_enum)]
    pub permissions: Option<PermissionTier>,

    /// New allow-list, comma separated. An empty string lifts the restriction.
    #[arg(short, long)]
    pub restricted_users: Option<String>,

    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(flatten)]
    pub log: LogArgs,
}

#[async_trait]
impl RunCommand for EditArgs {
    async fn run(&self) -> Result<()> {
        self.log.init("warn")?;
        let registry = self.config.open_registry().await?;

        let patch = ServicePatch {
            bucket_patterns: self.bucket_patterns.clone(),
            permission: self.permissions,
            restricted_users: self.restricted_users.as_deref().map(parse_users),
        };
        let result = registry.update(&self.name, patch).await;
        registry.close().await?;

        let report = result?;
        println!("Service '{}' updated", report.service.name);
        if let Some(err) = report.provisioning_error {
            eprintln!("Warning: refresh role failed: {err}");
        }
        Ok(())
    }
}
