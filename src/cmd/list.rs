use anyhow::Result;
use async_trait::async_trait;
use clap::Args;
use s3bridge::display::display_list;

use super::{ConfigArgs, LogArgs, RunCommand};

/// List registered services together with orphaned roles.
#[derive(Args)]
pub struct ListArgs {
    /// Print JSON instead of a table.
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(flatten)]
    pub log: LogArgs,
}

#[async_trait]
impl RunCommand for ListArgs {
    async fn run(&self) -> Result<()> {
        self.log.init("warn")?;
        let registry = self.config.open_registry().await?;

        let result = registry.list().await;
        registry.close().await?;

        display_list(result?, self.json)
    }
}
