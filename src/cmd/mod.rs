mod add;
mod config;
mod credentials;
mod edit;
mod list;
mod object;
mod remove;
mod serve;
mod status;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use s3bridge::broker::config::BrokerConfig;
use s3bridge::broker::factory::BrokerFactory;
use s3bridge::broker::registry::ServiceRegistry;
use s3bridge::broker::restful::RestfulServer;
use s3bridge::config::{CommonConfig, PathSet};
use s3bridge::logs;

#[async_trait]
pub trait RunCommand {
    async fn run(&self) -> Result<()>;
}

/// Commands that build a long-running server. The caller runs it.
#[async_trait]
pub trait ServerCommand {
    async fn build_server(&self) -> Result<RestfulServer>;
}

#[derive(Parser)]
#[command(author, about, version = env!("S3BRIDGE_VERSION"))]
pub struct App {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    Add(add::AddArgs),
    Config(config::ShowConfigArgs),
    Credentials(credentials::CredentialsArgs),
    Edit(edit::EditArgs),
    List(list::ListArgs),
    Object(object::ObjectArgs),
    Remove(remove::RemoveArgs),
    Serve(serve::ServeArgs),
    Status(status::StatusArgs),
}

impl App {
    pub async fn run(&self) -> Result<()> {
        match &self.command {
            Commands::Add(args) => args.run().await,
            Commands::Config(args) => args.run().await,
            Commands::Credentials(args) => args.run().await,
            Commands::Edit(args) => args.run().await,
            Commands::List(args) => args.run().await,
            Commands::Object(args) => args.run().await,
            Commands::Remove(args) => args.run().await,
            Commands::Serve(args) => {
                let srv = args.build_server().await?;
                srv.run().await.context("run restful server")
            }
            Commands::Status(args) => args.run().await,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Directory holding `broker.toml`. Defaults to $S3BRIDGE_CONFIG, then
    /// `/etc/s3bridge` for root and `~/.config/s3bridge` for other users.
    #[arg(long)]
    pub config_path: Option<PathBuf>,

    /// Directory for the registry database. Defaults to $S3BRIDGE_DATA, then
    /// `/var/lib/s3bridge` for root and `~/.local/share/s3bridge` for other users.
    #[arg(long)]
    pub data_path: Option<PathBuf>,
}

impl ConfigArgs {
    pub fn build_path_set(&self) -> Result<PathSet> {
        PathSet::new(self.config_path.clone(), self.data_path.clone())
    }

    pub fn load_broker_config(&self) -> Result<BrokerConfig> {
        let ps = self.build_path_set()?;
        ps.load_config("broker", BrokerConfig::default)
    }

    /// Opens the registry configured for the broker, for commands that edit
    /// it without going through a running server.
    pub async fn open_registry(&self) -> Result<Arc<ServiceRegistry>> {
        let cfg = self.load_broker_config()?;
        let factory = BrokerFactory::new(cfg)?;
        factory.build_registry().await
    }
}

#[derive(Args, Debug, Clone)]
pub struct LogArgs {
    /// Log level, one of error, warn, info, debug, trace.
    #[arg(long)]
    pub log_level: Option<String>,
}

impl LogArgs {
    pub fn init(&self, default_level: &str) -> Result<()> {
        let level = self.log_level.as_deref().unwrap_or(default_level);
        logs::init(level).context("init logs")
    }
}

/// Parses a comma separated user list. An empty string yields an empty set.
pub fn parse_users(s: &str) -> BTreeSet<String> {
    s.split(',')
        .map(|user| user.trim())
        .filter(|user| !user.is_empty())
        .map(String::from)
        .collect()
}
