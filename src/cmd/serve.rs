use anyhow::Result;
use async_trait::async_trait;
use clap::Args;
use log::info;
use s3bridge::broker::factory::BrokerFactory;
use s3bridge::broker::restful::RestfulServer;

use super::{ConfigArgs, LogArgs, ServerCommand};

/// Start the broker. It serves `/credentials` to verified callers and the
/// registry API to administrators, over HTTP or HTTPS.
#[derive(Args)]
pub struct ServeArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(flatten)]
    pub log: LogArgs,
}

#[async_trait]
impl ServerCommand for ServeArgs {
    async fn build_server(&self) -> Result<RestfulServer> {
        self.log.init("info")?;
        let cfg = self.config.load_broker_config()?;
        info!(
            "Starting s3bridge {} ({})",
            env!("S3BRIDGE_VERSION"),
            env!("S3BRIDGE_TARGET")
        );

        let factory = BrokerFactory::new(cfg)?;
        factory.build_server().await
    }
}
