use anyhow::Result;
use async_trait::async_trait;
use clap::Args;

use super::{ConfigArgs, LogArgs, RunCommand};

/// Show whether a service and its role are both in place.
#[derive(Args)]
pub struct StatusArgs {
    pub name: String,

    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(flatten)]
    pub log: LogArgs,
}

#[async_trait]
impl RunCommand for StatusArgs {
    async fn run(&self) -> Result<()> {
        self.log.init("warn")?;
        let registry = self.config.open_registry().await?;

        let result = registry.status(&self.name).await;
        registry.close().await?;

        println!("{}: {}", self.name, result?);
        Ok(())
    }
}
