use anyhow::Result;
use async_trait::async_trait;
use clap::Args;
use s3bridge::client::cookie::CookieSource;
use s3bridge::client::CredentialClient;
use s3bridge::display::display_json;

use super::{LogArgs, RunCommand};

/// Fetch credentials for a service from a running broker. The session cookie
/// is read from $S3BRIDGE_COOKIES or `~/.s3bridge_cookies`.
#[derive(Args)]
pub struct CredentialsArgs {
    pub service: String,

    /// Bucket to narrow the credentials to.
    #[arg(short, long)]
    pub resource: Option<String>,

    /// Broker address.
    #[arg(short, long, default_value = "http://127.0.0.1:7880")]
    pub server: String,

    /// CA certificate to trust when the broker uses a private one.
    #[arg(long, default_value = "")]
    pub cert_path: String,

    /// Requested lifetime in seconds.
    #[arg(short, long)]
    pub duration: Option<u64>,

    /// Print shell `export` lines instead of JSON.
    #[arg(short, long)]
    pub env: bool,

    #[command(flatten)]
    pub log: LogArgs,
}

#[async_trait]
impl RunCommand for CredentialsArgs {
    async fn run(&self) -> Result<()> {
        self.log.init("warn")?;

        let cookie = CookieSource::new()?.load()?;
        let mut client = CredentialClient::new(&self.server, &self.cert_path, cookie)?;
        if let Some(duration) = self.duration {
            client.set_duration_secs(duration);
        }

        let bundle = client
            .credentials(&self.service, self.resource.as_deref())
            .await?;
        if self.env {
            println!("export AWS_ACCESS_KEY_ID={}", bundle.access_key_id);
            println!("export AWS_SECRET_ACCESS_KEY={}", bundle.secret_access_key);
            println!("export AWS_SESSION_TOKEN={}", bundle.session_token);
            return Ok(());
        }
        display_json(bundle)
    }
}
