use anyhow::Result;
use async_trait::async_trait;
use clap::Args;

use super::{ConfigArgs, LogArgs, RunCommand};

/// Remove a service and retire its role.
#[derive(Args)]
pub struct RemoveArgs {
    pub name: String,

    /// Remove the registry entry even if retiring the role fails, or clean up
    /// a role left behind by an entry that no longer exists.
    #[arg(short, long)]
    pub force: bool,

    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(flatten)]
    pub log: LogArgs,
}

#[async_trait]
impl RunCommand for RemoveArgs {
    async fn run(&self) -> Result<()> {
        self.log.init("warn")?;
        let registry = self.config.open_registry().await?;

        let result = registry.delete(&self.name, self.force).await;
        registry.close().await?;

        let report = result?;
        if report.removed {
            println!("Service '{}' removed", report.name);
        } else {
            println!("Service '{}' was not registered", report.name);
        }
        if let Some(err) = report.provisioning_error {
            eprintln!("Warning: retire role failed: {err}");
        }
        Ok(())
    }
}
