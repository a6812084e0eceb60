use anyhow::Result;
use async_trait::async_trait;
use clap::Args;
use s3bridge::display::display_json;

use super::{ConfigArgs, RunCommand};

/// Display the configuration the broker would run with, in JSON format.
#[derive(Args)]
pub struct ShowConfigArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

#[async_trait]
impl RunCommand for ShowConfigArgs {
    async fn run(&self) -> Result<()> {
        let mut cfg = self.config.load_broker_config()?;
        if !cfg.identity.jwt_secret.is_empty() {
            cfg.identity.jwt_secret = String::from("<redacted>");
        }
        display_json(cfg)
    }
}
